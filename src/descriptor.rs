//! Item descriptors: the immutable nodes a layout is assembled from.
//!
//! A [`Descriptor`] is a cheap, shareable handle to one node of a layout.
//! The set of node kinds is closed ([`DescriptorKind`]); code that needs
//! per-kind behaviour either matches on the kind or implements
//! [`DescriptorHandler`] and calls [`Descriptor::dispatch`].

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::create::CreateCx;
use crate::decorator::{ConstrainedField, ObservableField, TypedField};
use crate::entity::Entity;
use crate::error::Result;
use crate::field::{ConstantField, DelimitedField, FixedField};
use crate::pull::PullReader;
use crate::push::{self, ReadHandler};
use crate::read::ReadCx;
use crate::stream::{CharSource, TextSource};
use crate::structure::{Composite, DelimiterWrapper, Optional, Sequence};

/// Every kind of item a layout can contain.
pub enum DescriptorKind {
    Constant(ConstantField),
    Delimited(DelimitedField),
    Fixed(FixedField),
    Constrained(ConstrainedField),
    Typed(TypedField),
    Observable(ObservableField),
    Composite(Composite),
    Sequence(Sequence),
    Optional(Optional),
    Wrapper(DelimiterWrapper),
}

impl DescriptorKind {
    /// Short label of the kind, for diagnostics.
    pub fn label(&self) -> &'static str {
        match self {
            DescriptorKind::Constant(_) => "constant",
            DescriptorKind::Delimited(_) => "delimited",
            DescriptorKind::Fixed(_) => "fixed",
            DescriptorKind::Constrained(_) => "constrained",
            DescriptorKind::Typed(_) => "typed",
            DescriptorKind::Observable(_) => "observable",
            DescriptorKind::Composite(_) => "composite",
            DescriptorKind::Sequence(_) => "sequence",
            DescriptorKind::Optional(_) => "optional",
            DescriptorKind::Wrapper(_) => "delimiter-wrapper",
        }
    }
}

/// Shared handle to an immutable layout node.
///
/// Cloning is cheap. Two handles are equal only if they point at the same
/// node, which is how entities and events identify their descriptor.
#[derive(Clone)]
pub struct Descriptor(Arc<DescriptorKind>);

impl Descriptor {
    pub fn kind(&self) -> &DescriptorKind {
        &self.0
    }

    pub fn name(&self) -> &str {
        match self.kind() {
            DescriptorKind::Constant(f) => f.name(),
            DescriptorKind::Delimited(f) => f.name(),
            DescriptorKind::Fixed(f) => f.name(),
            DescriptorKind::Constrained(f) => f.inner().name(),
            DescriptorKind::Typed(f) => f.inner().name(),
            DescriptorKind::Observable(f) => f.inner().name(),
            DescriptorKind::Composite(c) => c.name(),
            DescriptorKind::Sequence(s) => s.name(),
            DescriptorKind::Optional(o) => o.name(),
            DescriptorKind::Wrapper(w) => w.inner().name(),
        }
    }

    /// Minimum number of characters an instance of this item serializes to.
    pub fn min_length(&self) -> usize {
        match self.kind() {
            DescriptorKind::Constant(f) => f.literal().chars().count(),
            DescriptorKind::Delimited(_) => 1,
            DescriptorKind::Fixed(f) => f.width(),
            DescriptorKind::Constrained(f) => f.inner().min_length(),
            DescriptorKind::Typed(f) => f.inner().min_length(),
            DescriptorKind::Observable(f) => f.inner().min_length(),
            DescriptorKind::Composite(c) => c.children().iter().map(Descriptor::min_length).sum(),
            DescriptorKind::Sequence(s) => s
                .multiplicity()
                .map_or(0, |m| m.min() * s.element().min_length()),
            DescriptorKind::Optional(_) => 0,
            DescriptorKind::Wrapper(w) => w.inner().min_length() + 1,
        }
    }

    /// Whether this item reads and writes a single value.
    pub fn is_field(&self) -> bool {
        matches!(
            self.kind(),
            DescriptorKind::Constant(_)
                | DescriptorKind::Delimited(_)
                | DescriptorKind::Fixed(_)
                | DescriptorKind::Constrained(_)
                | DescriptorKind::Typed(_)
                | DescriptorKind::Observable(_)
        )
    }

    /// Whether both handles point at the same node.
    pub fn same(&self, other: &Descriptor) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Call the handler method for this descriptor's kind.
    pub fn dispatch<H: DescriptorHandler + ?Sized>(&self, handler: &mut H) -> H::Output {
        match self.kind() {
            DescriptorKind::Constant(f) => handler.constant_field(self, f),
            DescriptorKind::Delimited(f) => handler.delimited_field(self, f),
            DescriptorKind::Fixed(f) => handler.fixed_field(self, f),
            DescriptorKind::Constrained(f) => handler.constrained_field(self, f),
            DescriptorKind::Typed(f) => handler.typed_field(self, f),
            DescriptorKind::Observable(f) => handler.observable_field(self, f),
            DescriptorKind::Composite(c) => handler.composite(self, c),
            DescriptorKind::Sequence(s) => handler.sequence(self, s),
            DescriptorKind::Optional(o) => handler.optional(self, o),
            DescriptorKind::Wrapper(w) => handler.delimiter_wrapper(self, w),
        }
    }

    /// Build a fresh entity holding default values.
    pub fn create_entity(&self) -> Result<Entity> {
        CreateCx::new().create(self)
    }

    /// Read one entity from `source`.
    pub fn read_entity(&self, source: &mut dyn CharSource) -> Result<Entity> {
        debug!(item = self.name(), "reading entity");
        let entity = ReadCx::new(source).read(self)?;
        debug!(item = self.name(), length = entity.length(), "read entity");
        Ok(entity)
    }

    /// Read one entity from the start of `text`.
    pub fn read_str(&self, text: &str) -> Result<Entity> {
        self.read_entity(&mut TextSource::new(text))
    }

    /// Read from `source`, reporting each item to `handler` as it is decoded.
    pub fn push_read(
        &self,
        source: &mut dyn CharSource,
        handler: &mut dyn ReadHandler,
    ) -> Result<()> {
        push::push_read(self, source, handler)
    }

    /// Step-wise reader over `source`, yielding one event per call.
    pub fn pull_read<'s>(&self, source: &'s mut dyn CharSource) -> PullReader<'s> {
        PullReader::new(self, source)
    }
}

impl PartialEq for Descriptor {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl Eq for Descriptor {}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", self.kind().label(), self.name())
    }
}

impl From<DescriptorKind> for Descriptor {
    fn from(kind: DescriptorKind) -> Self {
        Descriptor(Arc::new(kind))
    }
}

macro_rules! descriptor_from {
    ($($kind:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$kind> for Descriptor {
                fn from(item: $kind) -> Self {
                    Descriptor::from(DescriptorKind::$variant(item))
                }
            }
        )*
    };
}

descriptor_from!(
    ConstantField => Constant,
    DelimitedField => Delimited,
    FixedField => Fixed,
    ConstrainedField => Constrained,
    TypedField => Typed,
    ObservableField => Observable,
    Composite => Composite,
    Sequence => Sequence,
    Optional => Optional,
    DelimiterWrapper => Wrapper,
);

/// Per-kind callbacks for [`Descriptor::dispatch`].
///
/// Every kind falls back to [`DescriptorHandler::unhandled`], so a handler
/// only overrides the kinds it cares about.
pub trait DescriptorHandler {
    type Output;

    fn unhandled(&mut self, descriptor: &Descriptor) -> Self::Output;

    fn constant_field(&mut self, descriptor: &Descriptor, _field: &ConstantField) -> Self::Output {
        self.unhandled(descriptor)
    }

    fn delimited_field(
        &mut self,
        descriptor: &Descriptor,
        _field: &DelimitedField,
    ) -> Self::Output {
        self.unhandled(descriptor)
    }

    fn fixed_field(&mut self, descriptor: &Descriptor, _field: &FixedField) -> Self::Output {
        self.unhandled(descriptor)
    }

    fn constrained_field(
        &mut self,
        descriptor: &Descriptor,
        _field: &ConstrainedField,
    ) -> Self::Output {
        self.unhandled(descriptor)
    }

    fn typed_field(&mut self, descriptor: &Descriptor, _field: &TypedField) -> Self::Output {
        self.unhandled(descriptor)
    }

    fn observable_field(
        &mut self,
        descriptor: &Descriptor,
        _field: &ObservableField,
    ) -> Self::Output {
        self.unhandled(descriptor)
    }

    fn composite(&mut self, descriptor: &Descriptor, _composite: &Composite) -> Self::Output {
        self.unhandled(descriptor)
    }

    fn sequence(&mut self, descriptor: &Descriptor, _sequence: &Sequence) -> Self::Output {
        self.unhandled(descriptor)
    }

    fn optional(&mut self, descriptor: &Descriptor, _optional: &Optional) -> Self::Output {
        self.unhandled(descriptor)
    }

    fn delimiter_wrapper(
        &mut self,
        descriptor: &Descriptor,
        _wrapper: &DelimiterWrapper,
    ) -> Self::Output {
        self.unhandled(descriptor)
    }
}

// ---------------------------------------------------------------------------
// Field layers
// ---------------------------------------------------------------------------

/// The undecorated field at the bottom of a decorator chain.
#[derive(Clone, Copy)]
pub(crate) enum BaseField<'a> {
    Constant(&'a ConstantField),
    Delimited(&'a DelimitedField),
    Fixed(&'a FixedField),
}

impl Descriptor {
    /// Walk a field's decorator chain from the outermost layer inwards.
    pub(crate) fn layers(&self) -> impl Iterator<Item = &Descriptor> {
        std::iter::successors(Some(self), |&d| match d.kind() {
            DescriptorKind::Constrained(f) => Some(f.inner()),
            DescriptorKind::Typed(f) => Some(f.inner()),
            DescriptorKind::Observable(f) => Some(f.inner()),
            _ => None,
        })
    }

    pub(crate) fn base_field(&self) -> Option<BaseField<'_>> {
        self.layers().find_map(|d| match d.kind() {
            DescriptorKind::Constant(f) => Some(BaseField::Constant(f)),
            DescriptorKind::Delimited(f) => Some(BaseField::Delimited(f)),
            DescriptorKind::Fixed(f) => Some(BaseField::Fixed(f)),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::Multiplicity;

    struct KindName;

    impl DescriptorHandler for KindName {
        type Output = &'static str;

        fn unhandled(&mut self, _descriptor: &Descriptor) -> &'static str {
            "other"
        }

        fn fixed_field(&mut self, _descriptor: &Descriptor, _field: &FixedField) -> &'static str {
            "fixed"
        }

        fn composite(&mut self, _descriptor: &Descriptor, _composite: &Composite) -> &'static str {
            "composite"
        }
    }

    fn fixed(name: &str, width: usize) -> Descriptor {
        FixedField::new(name, width).unwrap().into()
    }

    #[test]
    fn test_dispatch_falls_back_to_unhandled() {
        let constant: Descriptor = ConstantField::new("tag", "FOO").unwrap().into();
        let record: Descriptor = Composite::new("rec", vec![constant.clone(), fixed("a", 3)])
            .unwrap()
            .into();
        assert_eq!(fixed("a", 3).dispatch(&mut KindName), "fixed");
        assert_eq!(record.dispatch(&mut KindName), "composite");
        assert_eq!(constant.dispatch(&mut KindName), "other");
    }

    #[test]
    fn test_min_length() {
        let constant: Descriptor = ConstantField::new("tag", "FOO").unwrap().into();
        let record: Descriptor =
            Composite::new("rec", vec![constant.clone(), fixed("a", 5), fixed("b", 9)])
                .unwrap()
                .into();
        assert_eq!(record.min_length(), 17);

        let seq: Descriptor = Sequence::new("seq", constant.clone())
            .unwrap()
            .with_multiplicity(Multiplicity::new(2, 4).unwrap())
            .into();
        assert_eq!(seq.min_length(), 6);

        let unbounded: Descriptor = Sequence::new("seq", constant.clone()).unwrap().into();
        assert_eq!(unbounded.min_length(), 0);

        let optional: Descriptor = Optional::new("opt", constant.clone()).unwrap().into();
        assert_eq!(optional.min_length(), 0);

        let line: Descriptor = DelimiterWrapper::new(constant).into();
        assert_eq!(line.min_length(), 4);
    }

    #[test]
    fn test_decorator_takes_inner_name() {
        let amount: Descriptor = FixedField::new("amount", 4)
            .unwrap()
            .with_default("0")
            .unwrap()
            .into();
        let converter = crate::convert::ParseConverter::<u32>::new();
        let typed: Descriptor = TypedField::new(amount, converter).unwrap().into();
        assert_eq!(typed.name(), "amount");
        assert_eq!(typed.min_length(), 4);
    }

    #[test]
    fn test_equality_is_identity() {
        let a = fixed("a", 3);
        let b = fixed("a", 3);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(format!("{a:?}"), r#"fixed("a")"#);
    }

    #[test]
    fn test_layers_reach_base() {
        let base = fixed("n", 2);
        let observed: Descriptor = ObservableField::new(base.clone()).unwrap().into();
        assert_eq!(observed.layers().count(), 2);
        assert!(matches!(observed.base_field(), Some(BaseField::Fixed(_))));
        assert!(observed.is_field());
    }
}
