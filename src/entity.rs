//! Entities: the mutable data trees created or read from descriptors.
//!
//! An [`Entity`] always belongs to the descriptor that produced it. Field
//! values are re-validated on every assignment, and sequences and optionals
//! keep their linked count or flag field in step with their own shape.

use std::fmt;
use std::io;
use std::sync::{Arc, Mutex, PoisonError};

use crate::create::CreateCx;
use crate::correlation::Link;
use crate::decorator::{TypedField, validate_value};
use crate::descriptor::{BaseField, Descriptor, DescriptorKind};
use crate::error::{ConfigError, EncodeError, FlatError, Result};
use crate::push::ReadEvent;
use crate::structure::{DelimiterWrapper, Multiplicity, Optional, Sequence};

fn check_owner(expected: &Descriptor, entity: &Entity) -> Result<()> {
    if entity.descriptor().same(expected) {
        Ok(())
    } else {
        Err(ConfigError::ForeignEntity {
            item: expected.name().to_string(),
            found: entity.name().to_string(),
        }
        .into())
    }
}

// ---------------------------------------------------------------------------
// Field
// ---------------------------------------------------------------------------

/// The value of one field.
///
/// The value lives in a shared cell so that a sequence or optional driven by
/// this field can write its count or flag back into the tree.
pub struct FieldEntity {
    descriptor: Descriptor,
    value: Arc<Mutex<String>>,
}

impl FieldEntity {
    /// Build a field holding `value`, which must pass every check of the
    /// descriptor's decorator chain.
    pub(crate) fn new(descriptor: Descriptor, value: String) -> Result<Self> {
        validate_value(&descriptor, &value)?;
        Ok(Self {
            descriptor,
            value: Arc::new(Mutex::new(value)),
        })
    }

    /// Another handle onto the same value cell.
    pub(crate) fn share(&self) -> FieldEntity {
        FieldEntity {
            descriptor: self.descriptor.clone(),
            value: Arc::clone(&self.value),
        }
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    /// The raw value, without padding or delimiter.
    pub fn value(&self) -> String {
        self.value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Assign a raw value. On failure the previous value is kept.
    pub fn set_value(&mut self, value: impl Into<String>) -> Result<()> {
        if let Some(BaseField::Constant(_)) = self.descriptor.base_field() {
            return Err(FlatError::Immutable {
                item: self.name().to_string(),
            });
        }
        let value = value.into();
        validate_value(&self.descriptor, &value)?;
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = value;
        Ok(())
    }

    /// Decode the value through the field's converter.
    pub fn get<T: 'static>(&self) -> Result<T> {
        let typed = self.typed_layer()?;
        Ok(typed.decode::<T>(&self.value())?)
    }

    /// Encode `value` through the field's converter and assign it.
    pub fn set<T: 'static>(&mut self, value: T) -> Result<()> {
        let raw = self.typed_layer()?.encode(&value)?;
        self.set_value(raw)
    }

    /// Re-run every constraint and converter check on the current value.
    pub fn validate(&self) -> Result<()> {
        validate_value(&self.descriptor, &self.value())
    }

    /// The value as it appears in a record.
    pub fn encoded(&self) -> String {
        let value = self.value();
        match self.descriptor.base_field() {
            Some(base) => base.encode(&value),
            None => value,
        }
    }

    /// The value a reader gets back from [`FieldEntity::encoded`].
    pub fn written_value(&self) -> String {
        let value = self.value();
        match self.descriptor.base_field() {
            Some(base) => base.written_value(&value),
            None => value,
        }
    }

    pub fn length(&self) -> usize {
        let value = self.value.lock().unwrap_or_else(PoisonError::into_inner);
        match self.descriptor.base_field() {
            Some(base) => base.encoded_len(&value),
            None => value.chars().count(),
        }
    }

    fn typed_layer(&self) -> Result<&TypedField> {
        self.descriptor
            .layers()
            .find_map(|d| match d.kind() {
                DescriptorKind::Typed(t) => Some(t),
                _ => None,
            })
            .ok_or_else(|| {
                ConfigError::Untyped {
                    item: self.name().to_string(),
                }
                .into()
            })
    }
}

impl fmt::Debug for FieldEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldEntity")
            .field("name", &self.name())
            .field("value", &self.value())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Structures
// ---------------------------------------------------------------------------

/// Children of a composite, in declared order.
#[derive(Debug)]
pub struct CompositeEntity {
    descriptor: Descriptor,
    children: Vec<Entity>,
}

impl CompositeEntity {
    pub(crate) fn new(descriptor: Descriptor, children: Vec<Entity>) -> Self {
        Self {
            descriptor,
            children,
        }
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn children(&self) -> &[Entity] {
        &self.children
    }

    pub fn get(&self, name: &str) -> Option<&Entity> {
        self.children.iter().find(|c| c.name() == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Entity> {
        self.children.iter_mut().find(|c| c.name() == name)
    }
}

/// Elements of a sequence, plus the count field it is linked to, if any.
pub struct SequenceEntity {
    descriptor: Descriptor,
    element: Descriptor,
    multiplicity: Option<Multiplicity>,
    elements: Vec<Entity>,
    count: Option<Link<usize>>,
}

impl SequenceEntity {
    pub(crate) fn new(
        descriptor: Descriptor,
        sequence: &Sequence,
        elements: Vec<Entity>,
        count: Option<Link<usize>>,
    ) -> Self {
        Self {
            descriptor,
            element: sequence.element().clone(),
            multiplicity: sequence.multiplicity(),
            elements,
            count,
        }
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn elements(&self) -> &[Entity] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Entity> {
        self.elements.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Entity> {
        self.elements.get_mut(index)
    }

    /// The linked count field.
    pub fn count_field(&self) -> Option<&FieldEntity> {
        self.count.as_ref().map(Link::field)
    }

    /// Append an element created by this sequence's element descriptor.
    pub fn add(&mut self, element: Entity) -> Result<()> {
        check_owner(&self.element, &element)?;
        self.elements.push(element);
        if let Err(e) = self.sync_count() {
            self.elements.pop();
            return Err(e);
        }
        Ok(())
    }

    /// Append a freshly created element and return it.
    pub fn create_element(&mut self) -> Result<&mut Entity> {
        let element = CreateCx::new().create(&self.element)?;
        let index = self.elements.len();
        self.add(element)?;
        Ok(&mut self.elements[index])
    }

    /// Remove the element at `index`, if there is one.
    pub fn discard(&mut self, index: usize) -> Result<Option<Entity>> {
        if index >= self.elements.len() {
            return Ok(None);
        }
        let removed = self.elements.remove(index);
        if let Err(e) = self.sync_count() {
            self.elements.insert(index, removed);
            return Err(e);
        }
        Ok(Some(removed))
    }

    pub fn discard_all(&mut self) -> Result<()> {
        let removed = std::mem::take(&mut self.elements);
        if let Err(e) = self.sync_count() {
            self.elements = removed;
            return Err(e);
        }
        Ok(())
    }

    pub(crate) fn sync_count(&mut self) -> Result<()> {
        let len = self.elements.len();
        match &mut self.count {
            Some(link) => link.store(len),
            None => Ok(()),
        }
    }

    fn check_encodable(&self) -> Result<()> {
        let count = self.elements.len();
        if let Some(multiplicity) = self.multiplicity {
            if !multiplicity.contains(count) {
                return Err(EncodeError::Multiplicity {
                    item: self.descriptor.name().to_string(),
                    multiplicity,
                    count,
                }
                .into());
            }
        }
        if let Some(link) = &self.count {
            let declared = link.written()?;
            if declared != count {
                return Err(EncodeError::CountMismatch {
                    item: self.descriptor.name().to_string(),
                    field: link.field().name().to_string(),
                    declared,
                    actual: count,
                }
                .into());
            }
        }
        Ok(())
    }
}

impl fmt::Debug for SequenceEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceEntity")
            .field("descriptor", &self.descriptor)
            .field("elements", &self.elements)
            .finish()
    }
}

/// An optional target, plus the flag field it is linked to, if any.
pub struct OptionalEntity {
    descriptor: Descriptor,
    target_descriptor: Descriptor,
    target: Option<Box<Entity>>,
    flag: Option<Link<bool>>,
}

impl OptionalEntity {
    pub(crate) fn new(
        descriptor: Descriptor,
        optional: &Optional,
        target: Option<Entity>,
        flag: Option<Link<bool>>,
    ) -> Self {
        Self {
            descriptor,
            target_descriptor: optional.target().clone(),
            target: target.map(Box::new),
            flag,
        }
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn is_present(&self) -> bool {
        self.target.is_some()
    }

    pub fn target(&self) -> Option<&Entity> {
        self.target.as_deref()
    }

    pub fn target_mut(&mut self) -> Option<&mut Entity> {
        self.target.as_deref_mut()
    }

    /// The linked flag field.
    pub fn flag_field(&self) -> Option<&FieldEntity> {
        self.flag.as_ref().map(Link::field)
    }

    /// Replace the target with a fresh default one and return it.
    pub fn create_target(&mut self) -> Result<&mut Entity> {
        let target = CreateCx::new().create(&self.target_descriptor)?;
        self.store_flag(true)?;
        Ok(&mut **self.target.insert(Box::new(target)))
    }

    /// Make `target` the present target.
    pub fn set_target(&mut self, target: Entity) -> Result<()> {
        check_owner(&self.target_descriptor, &target)?;
        self.store_flag(true)?;
        self.target = Some(Box::new(target));
        Ok(())
    }

    /// Make the optional absent, returning the old target.
    pub fn discard_target(&mut self) -> Result<Option<Entity>> {
        self.store_flag(false)?;
        Ok(self.target.take().map(|b| *b))
    }

    pub(crate) fn sync_flag(&mut self) -> Result<()> {
        self.store_flag(self.target.is_some())
    }

    fn store_flag(&mut self, present: bool) -> Result<()> {
        match &mut self.flag {
            Some(link) => link.store(present),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for OptionalEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionalEntity")
            .field("descriptor", &self.descriptor)
            .field("target", &self.target)
            .finish()
    }
}

/// An entity followed by its wrapper's delimiter.
#[derive(Debug)]
pub struct WrappedEntity {
    descriptor: Descriptor,
    delimiter: char,
    inner: Box<Entity>,
}

impl WrappedEntity {
    pub(crate) fn new(descriptor: Descriptor, wrapper: &DelimiterWrapper, inner: Entity) -> Self {
        Self {
            descriptor,
            delimiter: wrapper.delimiter(),
            inner: Box::new(inner),
        }
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn inner(&self) -> &Entity {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut Entity {
        &mut self.inner
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// Any node of an entity tree.
#[derive(Debug)]
pub enum Entity {
    Field(FieldEntity),
    Composite(CompositeEntity),
    Sequence(SequenceEntity),
    Optional(OptionalEntity),
    Wrapped(WrappedEntity),
}

impl Entity {
    pub fn descriptor(&self) -> &Descriptor {
        match self {
            Entity::Field(e) => e.descriptor(),
            Entity::Composite(e) => e.descriptor(),
            Entity::Sequence(e) => e.descriptor(),
            Entity::Optional(e) => e.descriptor(),
            Entity::Wrapped(e) => e.descriptor(),
        }
    }

    pub fn name(&self) -> &str {
        self.descriptor().name()
    }

    /// Number of characters this entity currently serializes to.
    pub fn length(&self) -> usize {
        match self {
            Entity::Field(f) => f.length(),
            Entity::Composite(c) => c.children.iter().map(Entity::length).sum(),
            Entity::Sequence(s) => s.elements.iter().map(Entity::length).sum(),
            Entity::Optional(o) => o.target().map_or(0, Entity::length),
            Entity::Wrapped(w) => w.inner.length() + 1,
        }
    }

    /// Direct children, in order. Fields have none.
    pub fn children(&self) -> Vec<&Entity> {
        match self {
            Entity::Field(_) => Vec::new(),
            Entity::Composite(c) => c.children.iter().collect(),
            Entity::Sequence(s) => s.elements.iter().collect(),
            Entity::Optional(o) => o.target().into_iter().collect(),
            Entity::Wrapped(w) => vec![w.inner()],
        }
    }

    pub fn as_field(&self) -> Option<&FieldEntity> {
        match self {
            Entity::Field(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_field_mut(&mut self) -> Option<&mut FieldEntity> {
        match self {
            Entity::Field(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_composite(&self) -> Option<&CompositeEntity> {
        match self {
            Entity::Composite(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_composite_mut(&mut self) -> Option<&mut CompositeEntity> {
        match self {
            Entity::Composite(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&SequenceEntity> {
        match self {
            Entity::Sequence(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_sequence_mut(&mut self) -> Option<&mut SequenceEntity> {
        match self {
            Entity::Sequence(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_optional(&self) -> Option<&OptionalEntity> {
        match self {
            Entity::Optional(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_optional_mut(&mut self) -> Option<&mut OptionalEntity> {
        match self {
            Entity::Optional(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_wrapped(&self) -> Option<&WrappedEntity> {
        match self {
            Entity::Wrapped(w) => Some(w),
            _ => None,
        }
    }

    /// Call the handler method for this entity's descriptor kind.
    pub fn dispatch<H: EntityHandler + ?Sized>(&self, handler: &mut H) -> H::Output {
        match self {
            Entity::Field(f) => match f.descriptor().kind() {
                DescriptorKind::Constant(_) => handler.constant_field(self, f),
                DescriptorKind::Delimited(_) => handler.delimited_field(self, f),
                DescriptorKind::Fixed(_) => handler.fixed_field(self, f),
                DescriptorKind::Constrained(_) => handler.constrained_field(self, f),
                DescriptorKind::Typed(_) => handler.typed_field(self, f),
                DescriptorKind::Observable(_) => handler.observable_field(self, f),
                _ => handler.unhandled(self),
            },
            Entity::Composite(c) => handler.composite(self, c),
            Entity::Sequence(s) => handler.sequence(self, s),
            Entity::Optional(o) => handler.optional(self, o),
            Entity::Wrapped(w) => handler.delimiter_wrapper(self, w),
        }
    }

    /// Check that the whole tree can be written: every sequence within its
    /// multiplicity and in agreement with its count field.
    pub fn check_encodable(&self) -> Result<()> {
        if let Entity::Sequence(s) = self {
            s.check_encodable()?;
        }
        self.children()
            .into_iter()
            .try_for_each(Entity::check_encodable)
    }

    /// Serialize the tree to `out`. Nothing is written unless the whole tree
    /// passes [`Entity::check_encodable`].
    pub fn write_to<W: io::Write + ?Sized>(&self, out: &mut W) -> Result<()> {
        let text = self.to_text()?;
        out.write_all(text.as_bytes()).map_err(EncodeError::Io)?;
        Ok(())
    }

    /// Serialize the tree into a string.
    pub fn to_text(&self) -> Result<String> {
        self.check_encodable()?;
        let mut text = String::with_capacity(self.length());
        self.encode_into(&mut text);
        Ok(text)
    }

    fn encode_into(&self, out: &mut String) {
        match self {
            Entity::Field(f) => out.push_str(&f.encoded()),
            Entity::Wrapped(w) => {
                w.inner.encode_into(out);
                out.push(w.delimiter);
            }
            _ => {
                for child in self.children() {
                    child.encode_into(out);
                }
            }
        }
    }

    /// The read events this tree stands for, in traversal order.
    pub fn events(&self) -> Vec<ReadEvent> {
        let mut events = Vec::new();
        self.collect_events(&mut events);
        events
    }

    fn collect_events(&self, events: &mut Vec<ReadEvent>) {
        match self {
            Entity::Field(f) => events.push(ReadEvent::Field {
                descriptor: f.descriptor().clone(),
                value: f.value(),
            }),
            _ => {
                events.push(ReadEvent::Start(self.descriptor().clone()));
                for child in self.children() {
                    child.collect_events(events);
                }
                events.push(ReadEvent::End(self.descriptor().clone()));
            }
        }
    }
}

/// Per-kind callbacks for [`Entity::dispatch`], mirroring
/// [`DescriptorHandler`](crate::DescriptorHandler).
pub trait EntityHandler {
    type Output;

    fn unhandled(&mut self, entity: &Entity) -> Self::Output;

    fn constant_field(&mut self, entity: &Entity, _field: &FieldEntity) -> Self::Output {
        self.unhandled(entity)
    }

    fn delimited_field(&mut self, entity: &Entity, _field: &FieldEntity) -> Self::Output {
        self.unhandled(entity)
    }

    fn fixed_field(&mut self, entity: &Entity, _field: &FieldEntity) -> Self::Output {
        self.unhandled(entity)
    }

    fn constrained_field(&mut self, entity: &Entity, _field: &FieldEntity) -> Self::Output {
        self.unhandled(entity)
    }

    fn typed_field(&mut self, entity: &Entity, _field: &FieldEntity) -> Self::Output {
        self.unhandled(entity)
    }

    fn observable_field(&mut self, entity: &Entity, _field: &FieldEntity) -> Self::Output {
        self.unhandled(entity)
    }

    fn composite(&mut self, entity: &Entity, _composite: &CompositeEntity) -> Self::Output {
        self.unhandled(entity)
    }

    fn sequence(&mut self, entity: &Entity, _sequence: &SequenceEntity) -> Self::Output {
        self.unhandled(entity)
    }

    fn optional(&mut self, entity: &Entity, _optional: &OptionalEntity) -> Self::Output {
        self.unhandled(entity)
    }

    fn delimiter_wrapper(&mut self, entity: &Entity, _wrapped: &WrappedEntity) -> Self::Output {
        self.unhandled(entity)
    }
}
