//! Field decorators: constraint checking, typed conversion and observation.
//!
//! Each decorator owns the field it wraps and adds one concern. They stack in
//! any order; the value always belongs to the undecorated field at the bottom
//! of the chain.

use std::any::type_name;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::convert::{AnyConverter, Converter};
use crate::correlation::{Correlation, CorrelationId, Publish, Scope};
use crate::descriptor::{Descriptor, DescriptorKind};
use crate::entity::FieldEntity;
use crate::error::{ConfigError, ConstraintViolation, ConversionError, EncodeError, Result};

fn require_field(decorator: &'static str, inner: &Descriptor) -> Result<()> {
    if inner.is_field() {
        Ok(())
    } else {
        Err(ConfigError::NotAField {
            decorator,
            item: inner.name().to_string(),
        }
        .into())
    }
}

/// Run every constraint and converter check along a field's decorator chain.
/// A delimited value must not contain its own delimiter.
pub(crate) fn validate_value(descriptor: &Descriptor, value: &str) -> Result<()> {
    for layer in descriptor.layers() {
        match layer.kind() {
            DescriptorKind::Constrained(f) => f.check(layer.name(), value)?,
            DescriptorKind::Typed(f) => f.check(value)?,
            DescriptorKind::Delimited(f) if value.contains(f.delimiter()) => {
                return Err(EncodeError::DelimiterInValue {
                    item: f.name().to_string(),
                    delimiter: f.delimiter(),
                    value: value.to_string(),
                }
                .into());
            }
            _ => {}
        }
    }
    Ok(())
}

/// Tell every observer along a field's decorator chain about `field`.
pub(crate) fn notify_observers(descriptor: &Descriptor, field: &FieldEntity, scope: &mut Scope) {
    for layer in descriptor.layers() {
        if let DescriptorKind::Observable(f) = layer.kind() {
            for observer in &f.observers {
                observer.field_observed(field, scope);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Constraints
// ---------------------------------------------------------------------------

/// A named predicate over raw field values.
pub trait ValueConstraint: Send + Sync {
    fn name(&self) -> &str;

    /// `true` when `value` breaks the constraint.
    fn is_violated_by(&self, value: &str) -> bool;
}

/// Value must be one of a fixed set.
pub struct ChoiceConstraint {
    name: String,
    choices: Vec<String>,
}

impl ChoiceConstraint {
    pub fn new<I, S>(name: impl Into<String>, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            choices: choices.into_iter().map(Into::into).collect(),
        }
    }
}

impl ValueConstraint for ChoiceConstraint {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_violated_by(&self, value: &str) -> bool {
        !self.choices.iter().any(|c| c == value)
    }
}

/// Whole value must match a regular expression.
pub struct PatternConstraint {
    name: String,
    pattern: Regex,
}

impl PatternConstraint {
    pub fn new(name: impl Into<String>, pattern: &str) -> std::result::Result<Self, ConfigError> {
        let name = name.into();
        let pattern = Regex::new(&format!("^(?:{pattern})$"))
            .map_err(|source| ConfigError::InvalidPattern {
                name: name.clone(),
                source,
            })?;
        Ok(Self { name, pattern })
    }
}

impl ValueConstraint for PatternConstraint {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_violated_by(&self, value: &str) -> bool {
        !self.pattern.is_match(value)
    }
}

/// Value must not exceed a number of characters.
pub struct MaxLengthConstraint {
    name: String,
    max: usize,
}

impl MaxLengthConstraint {
    pub fn new(name: impl Into<String>, max: usize) -> Self {
        Self {
            name: name.into(),
            max,
        }
    }
}

impl ValueConstraint for MaxLengthConstraint {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_violated_by(&self, value: &str) -> bool {
        value.chars().count() > self.max
    }
}

/// A field whose every value must pass an ordered set of constraints.
pub struct ConstrainedField {
    inner: Descriptor,
    constraints: Vec<Arc<dyn ValueConstraint>>,
}

impl ConstrainedField {
    /// Wrap `inner`. Its default value is checked immediately.
    pub fn new(inner: Descriptor, constraints: Vec<Arc<dyn ValueConstraint>>) -> Result<Self> {
        require_field("constrained field", &inner)?;
        let mut seen = HashSet::new();
        for constraint in &constraints {
            if !seen.insert(constraint.name().to_string()) {
                return Err(ConfigError::DuplicateConstraint {
                    item: inner.name().to_string(),
                    name: constraint.name().to_string(),
                }
                .into());
            }
        }
        let field = Self { inner, constraints };
        let default = field.inner.default_value();
        field.check(field.inner.name(), &default)?;
        Ok(field)
    }

    pub fn inner(&self) -> &Descriptor {
        &self.inner
    }

    pub fn constraint_names(&self) -> impl Iterator<Item = &str> {
        self.constraints.iter().map(|c| c.name())
    }

    /// Evaluate every constraint, reporting all that fail.
    pub fn check(&self, field: &str, value: &str) -> std::result::Result<(), ConstraintViolation> {
        let violated: Vec<String> = self
            .constraints
            .iter()
            .filter(|c| c.is_violated_by(value))
            .map(|c| c.name().to_string())
            .collect();
        if violated.is_empty() {
            Ok(())
        } else {
            Err(ConstraintViolation {
                field: field.to_string(),
                value: value.to_string(),
                violated,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Typed
// ---------------------------------------------------------------------------

/// A field whose raw value converts to and from a typed value.
pub struct TypedField {
    inner: Descriptor,
    converter: Arc<dyn AnyConverter>,
}

impl TypedField {
    /// Wrap `inner`. Its default value must convert.
    pub fn new<C>(inner: Descriptor, converter: C) -> Result<Self>
    where
        C: Converter + 'static,
        C::Value: 'static,
    {
        require_field("typed field", &inner)?;
        let field = Self {
            inner,
            converter: Arc::new(converter),
        };
        field.check(&field.inner.default_value())?;
        Ok(field)
    }

    pub fn inner(&self) -> &Descriptor {
        &self.inner
    }

    pub fn target(&self) -> &'static str {
        self.converter.target()
    }

    pub(crate) fn check(&self, raw: &str) -> std::result::Result<(), ConversionError> {
        self.converter
            .decode_any(raw)
            .map(drop)
            .map_err(|e| ConversionError::new(raw, self.target()).with_source(e))
    }

    pub(crate) fn decode<T: 'static>(&self, raw: &str) -> std::result::Result<T, ConversionError> {
        let value = self
            .converter
            .decode_any(raw)
            .map_err(|e| ConversionError::new(raw, self.target()).with_source(e))?;
        value.downcast::<T>().map(|v| *v).map_err(|_| {
            ConversionError::new(raw, type_name::<T>())
                .with_source(format!("field converts to {}", self.target()).into())
        })
    }

    pub(crate) fn encode<T: 'static>(
        &self,
        value: &T,
    ) -> std::result::Result<String, ConversionError> {
        self.converter
            .encode_any(value)
            .map_err(|e| ConversionError::new("<typed value>", type_name::<T>()).with_source(e))
    }
}

// ---------------------------------------------------------------------------
// Observable
// ---------------------------------------------------------------------------

/// Receives every entity an observable field creates or reads.
pub trait FieldObserver: Send + Sync {
    /// `scope` is private to the current read or create call.
    fn field_observed(&self, field: &FieldEntity, scope: &mut Scope);
}

/// A field that reports each new entity to its observers.
pub struct ObservableField {
    inner: Descriptor,
    observers: Vec<Arc<dyn FieldObserver>>,
}

impl ObservableField {
    pub fn new(inner: Descriptor) -> Result<Self> {
        require_field("observable field", &inner)?;
        Ok(Self {
            inner,
            observers: Vec::new(),
        })
    }

    pub fn inner(&self) -> &Descriptor {
        &self.inner
    }

    pub fn observe(&mut self, observer: Arc<dyn FieldObserver>) {
        self.observers.push(observer);
    }

    /// Expose this field's value to a later sequence or optional.
    pub fn correlate<C>(&mut self, converter: C) -> Correlation<C::Value>
    where
        C: Converter + 'static,
    {
        let id = CorrelationId::next();
        self.observe(Arc::new(Publish(id)));
        Correlation::new(id, self.inner.name(), Arc::new(converter))
    }
}

impl fmt::Debug for ObservableField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableField")
            .field("inner", &self.inner)
            .field("observers", &self.observers.len())
            .finish()
    }
}
