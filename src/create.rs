//! Default entity construction.

use crate::correlation::Scope;
use crate::decorator::notify_observers;
use crate::descriptor::{Descriptor, DescriptorHandler};
use crate::entity::{
    CompositeEntity, Entity, FieldEntity, OptionalEntity, SequenceEntity, WrappedEntity,
};
use crate::error::Result;
use crate::structure::{Composite, DelimiterWrapper, Optional, Sequence};

/// State of one create call.
pub(crate) struct CreateCx {
    scope: Scope,
}

impl CreateCx {
    pub(crate) fn new() -> Self {
        Self {
            scope: Scope::new(),
        }
    }

    pub(crate) fn create(&mut self, descriptor: &Descriptor) -> Result<Entity> {
        descriptor.dispatch(self)
    }
}

impl DescriptorHandler for CreateCx {
    type Output = Result<Entity>;

    // Every field kind starts from the default of its base field.
    fn unhandled(&mut self, descriptor: &Descriptor) -> Result<Entity> {
        let field = FieldEntity::new(descriptor.clone(), descriptor.default_value())?;
        notify_observers(descriptor, &field, &mut self.scope);
        Ok(Entity::Field(field))
    }

    fn composite(&mut self, descriptor: &Descriptor, composite: &Composite) -> Result<Entity> {
        let children = composite
            .children()
            .iter()
            .map(|child| self.create(child))
            .collect::<Result<Vec<_>>>()?;
        Ok(Entity::Composite(CompositeEntity::new(descriptor.clone(), children)))
    }

    /// Creates `multiplicity.min` elements and writes that count back into
    /// the linked count field.
    fn sequence(&mut self, descriptor: &Descriptor, sequence: &Sequence) -> Result<Entity> {
        let count = sequence
            .count()
            .map(|c| self.scope.resolve(c, sequence.name()))
            .transpose()?;
        let min = sequence.multiplicity().map_or(0, |m| m.min());
        let elements = (0..min)
            .map(|_| self.create(sequence.element()))
            .collect::<Result<Vec<_>>>()?;
        let mut entity = SequenceEntity::new(descriptor.clone(), sequence, elements, count);
        entity.sync_count()?;
        Ok(Entity::Sequence(entity))
    }

    /// Creates an absent optional and clears the linked flag.
    fn optional(&mut self, descriptor: &Descriptor, optional: &Optional) -> Result<Entity> {
        let flag = optional
            .flag()
            .map(|c| self.scope.resolve(c, optional.name()))
            .transpose()?;
        let mut entity = OptionalEntity::new(descriptor.clone(), optional, None, flag);
        entity.sync_flag()?;
        Ok(Entity::Optional(entity))
    }

    fn delimiter_wrapper(
        &mut self,
        descriptor: &Descriptor,
        wrapper: &DelimiterWrapper,
    ) -> Result<Entity> {
        let inner = self.create(wrapper.inner())?;
        Ok(Entity::Wrapped(WrappedEntity::new(descriptor.clone(), wrapper, inner)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::{BooleanConverter, ParseConverter};
    use crate::decorator::ObservableField;
    use crate::error::{ConfigError, FlatError};
    use crate::field::{ConstantField, FixedField, Padding};
    use crate::structure::Multiplicity;

    #[test]
    fn test_create_uses_defaults() {
        let rec: Descriptor = Composite::new(
            "rec",
            vec![
                ConstantField::new("tag", "HDR").unwrap().into(),
                FixedField::new("id", 4)
                    .unwrap()
                    .with_padding(Padding::right('0'))
                    .with_default("7")
                    .unwrap()
                    .into(),
            ],
        )
        .unwrap()
        .into();
        let entity = rec.create_entity().unwrap();
        assert_eq!(entity.to_text().unwrap(), "HDR0007");
        assert_eq!(entity.length(), 7);
    }

    #[test]
    fn test_created_sequence_has_min_elements_and_synced_count() {
        let mut count = ObservableField::new(
            FixedField::new("count", 2)
                .unwrap()
                .with_padding(Padding::right('0'))
                .with_default("0")
                .unwrap()
                .into(),
        )
        .unwrap();
        let counted = count.correlate(ParseConverter::<usize>::new());
        let items: Descriptor = Sequence::new("items", ConstantField::new("x", "X").unwrap().into())
            .unwrap()
            .with_multiplicity(Multiplicity::new(2, 5).unwrap())
            .counted_by(counted)
            .into();
        let rec: Descriptor = Composite::new("rec", vec![count.into(), items]).unwrap().into();

        let mut entity = rec.create_entity().unwrap();
        assert_eq!(entity.to_text().unwrap(), "02XX");

        let record = entity.as_composite_mut().unwrap();
        let items = record.get_mut("items").unwrap().as_sequence_mut().unwrap();
        items.create_element().unwrap();
        assert_eq!(items.count_field().unwrap().value(), "3");
        assert_eq!(entity.to_text().unwrap(), "03XXX");
    }

    #[test]
    fn test_created_optional_is_absent_with_false_flag() {
        let mut flag = ObservableField::new(
            FixedField::new("flag", 1).unwrap().with_default("Y").unwrap().into(),
        )
        .unwrap();
        let present = flag.correlate(BooleanConverter::yes_no());
        let note: Descriptor = Optional::new("note", FixedField::new("text", 3).unwrap().into())
            .unwrap()
            .flagged_by(present)
            .into();
        let rec: Descriptor = Composite::new("rec", vec![flag.into(), note]).unwrap().into();

        let mut entity = rec.create_entity().unwrap();
        assert_eq!(entity.to_text().unwrap(), "N");

        let record = entity.as_composite_mut().unwrap();
        let note = record.get_mut("note").unwrap().as_optional_mut().unwrap();
        note.create_target()
            .unwrap()
            .as_field_mut()
            .unwrap()
            .set_value("abc")
            .unwrap();
        assert_eq!(note.flag_field().unwrap().value(), "Y");
        assert_eq!(entity.to_text().unwrap(), "Yabc");

        let record = entity.as_composite_mut().unwrap();
        let note = record.get_mut("note").unwrap().as_optional_mut().unwrap();
        assert!(note.discard_target().unwrap().is_some());
        assert_eq!(entity.to_text().unwrap(), "N");
    }

    #[test]
    fn test_consumer_before_field_is_config_error() {
        let width_one = FixedField::new("count", 1).unwrap().with_default("0").unwrap();
        let mut count = ObservableField::new(width_one.into()).unwrap();
        let counted = count.correlate(ParseConverter::<usize>::new());
        let items: Descriptor = Sequence::new("items", ConstantField::new("x", "X").unwrap().into())
            .unwrap()
            .counted_by(counted)
            .into();
        let rec: Descriptor = Composite::new("rec", vec![items, count.into()]).unwrap().into();
        assert!(matches!(
            rec.create_entity(),
            Err(FlatError::Config(ConfigError::UnresolvedCorrelation { .. }))
        ));
    }
}
