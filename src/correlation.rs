//! Cross-field correlation: a count or presence flag read from one field
//! drives the shape of a later sequence or optional.
//!
//! An [`ObservableField`](crate::ObservableField) hands out a
//! [`Correlation`] at assembly time. During each read or create call the
//! field publishes its fresh entity into that call's [`Scope`], and the
//! consuming structure resolves it into a [`Link`]. The scope is a plain
//! value owned by the call, so concurrent calls sharing one layout never see
//! each other's fields.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::convert::{self, Converter};
use crate::decorator::FieldObserver;
use crate::entity::FieldEntity;
use crate::error::{ConfigError, Result};

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// Identity of one correlation, unique for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CorrelationId(u64);

impl CorrelationId {
    pub(crate) fn next() -> Self {
        CorrelationId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Assembly-time handle binding an observed field to a consumer.
pub struct Correlation<T> {
    id: CorrelationId,
    field: String,
    converter: Arc<dyn Converter<Value = T>>,
}

impl<T> Correlation<T> {
    pub(crate) fn new(
        id: CorrelationId,
        field: &str,
        converter: Arc<dyn Converter<Value = T>>,
    ) -> Self {
        Self {
            id,
            field: field.to_string(),
            converter,
        }
    }

    pub fn id(&self) -> CorrelationId {
        self.id
    }

    /// Name of the observed field.
    pub fn field_name(&self) -> &str {
        &self.field
    }
}

impl<T> Clone for Correlation<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            field: self.field.clone(),
            converter: Arc::clone(&self.converter),
        }
    }
}

impl<T> fmt::Debug for Correlation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Correlation")
            .field("id", &self.id)
            .field("field", &self.field)
            .finish()
    }
}

/// Observer that publishes entities under a correlation id.
pub(crate) struct Publish(pub(crate) CorrelationId);

impl FieldObserver for Publish {
    fn field_observed(&self, field: &FieldEntity, scope: &mut Scope) {
        scope.publish(self.0, field.share());
    }
}

/// Fields observed so far during one read or create call.
#[derive(Default)]
pub struct Scope {
    observed: HashMap<CorrelationId, FieldEntity>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the latest entity for `id`, replacing any earlier one.
    pub(crate) fn publish(&mut self, id: CorrelationId, field: FieldEntity) {
        self.observed.insert(id, field);
    }

    pub fn is_published(&self, id: CorrelationId) -> bool {
        self.observed.contains_key(&id)
    }

    /// Resolve `correlation` for consumer `item`.
    ///
    /// Fails when the observed field has not produced an entity yet, which
    /// means the layout places the consumer before its field.
    pub(crate) fn resolve<T>(&self, correlation: &Correlation<T>, item: &str) -> Result<Link<T>> {
        let field = self.observed.get(&correlation.id).ok_or_else(|| {
            ConfigError::UnresolvedCorrelation {
                item: item.to_string(),
                field: correlation.field.clone(),
            }
        })?;
        Ok(Link {
            field: field.share(),
            converter: Arc::clone(&correlation.converter),
        })
    }
}

/// Live connection from a structure entity to the field it is driven by.
///
/// The link shares the field's value with the entity tree, so storing
/// through it updates the field wherever it lives.
pub struct Link<T> {
    field: FieldEntity,
    converter: Arc<dyn Converter<Value = T>>,
}

impl<T> Link<T> {
    pub fn field(&self) -> &FieldEntity {
        &self.field
    }

    /// Current value of the linked field, converted.
    pub fn decoded(&self) -> Result<T> {
        Ok(convert::decode_with(&*self.converter, &self.field.value())?)
    }

    /// Value of the linked field as it will read back once written.
    pub fn written(&self) -> Result<T> {
        Ok(convert::decode_with(&*self.converter, &self.field.written_value())?)
    }

    /// Convert `value` and assign it to the linked field.
    pub fn store(&mut self, value: T) -> Result<()> {
        let raw = convert::encode_with(&*self.converter, &value)?;
        self.field.set_value(raw)
    }
}

impl<T> fmt::Debug for Link<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link").field("field", &self.field).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::ParseConverter;
    use crate::descriptor::Descriptor;
    use crate::error::FlatError;
    use crate::field::FixedField;
    use crate::ObservableField;

    fn count_field() -> (Descriptor, Correlation<usize>) {
        let mut observed = ObservableField::new(
            FixedField::new("count", 2)
                .unwrap()
                .with_default("0")
                .unwrap()
                .into(),
        )
        .unwrap();
        let correlation = observed.correlate(ParseConverter::<usize>::new());
        (observed.into(), correlation)
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(CorrelationId::next(), CorrelationId::next());
    }

    #[test]
    fn test_unpublished_field_is_config_error() {
        let (_, correlation) = count_field();
        let scope = Scope::new();
        let err = scope.resolve(&correlation, "items").unwrap_err();
        assert!(matches!(
            err,
            FlatError::Config(ConfigError::UnresolvedCorrelation { .. })
        ));
        assert!(err.to_string().contains("count"));
    }

    #[test]
    fn test_link_writes_back_to_shared_field() {
        let (descriptor, correlation) = count_field();
        let entity = descriptor.read_str("07").unwrap();
        let field = entity.as_field().unwrap();

        let mut scope = Scope::new();
        scope.publish(correlation.id(), field.share());
        let mut link = scope.resolve(&correlation, "items").unwrap();
        assert_eq!(link.decoded().unwrap(), 7);

        link.store(3).unwrap();
        assert_eq!(field.value(), "3");
        assert_eq!(entity.to_text().unwrap(), "3 ");
    }
}
