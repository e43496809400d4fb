//! Whole-entity reading, and the pieces the streaming protocols share with it.
//!
//! A [`ReadCx`] lives for exactly one top-level read. It owns the
//! correlation [`Scope`] of that read and borrows the input source.
//! Trial-and-error reads go through [`ReadCx::try_read`], which checkpoints
//! the source, attempts an ordinary read and rewinds on a miss.

use tracing::{debug, trace};

use crate::correlation::{Link, Scope};
use crate::decorator::notify_observers;
use crate::descriptor::{Descriptor, DescriptorHandler};
use crate::entity::{
    CompositeEntity, Entity, FieldEntity, OptionalEntity, SequenceEntity, WrappedEntity,
};
use crate::error::{ConfigError, DecodeError, FlatError, Result};
use crate::stream::CharSource;
use crate::structure::{Composite, DelimiterWrapper, Optional, Sequence};

/// Fail when a sequence read ends outside its multiplicity.
pub(crate) fn check_multiplicity(sequence: &Sequence, count: usize) -> Result<()> {
    match sequence.multiplicity() {
        Some(multiplicity) if !multiplicity.contains(count) => {
            debug!(
                item = sequence.name(),
                %multiplicity,
                count,
                "sequence outside multiplicity"
            );
            Err(DecodeError::Multiplicity {
                item: sequence.name().to_string(),
                multiplicity,
                count,
            }
            .into())
        }
        _ => Ok(()),
    }
}

/// State of one read call.
pub(crate) struct ReadCx<'s> {
    source: &'s mut dyn CharSource,
    scope: Scope,
}

impl<'s> ReadCx<'s> {
    pub(crate) fn new(source: &'s mut dyn CharSource) -> Self {
        Self {
            source,
            scope: Scope::new(),
        }
    }

    /// Read a whole entity.
    pub(crate) fn read(&mut self, descriptor: &Descriptor) -> Result<Entity> {
        descriptor.dispatch(self)
    }

    /// Decode one field, validate it and tell its observers.
    pub(crate) fn read_field(&mut self, descriptor: &Descriptor) -> Result<FieldEntity> {
        let Some(base) = descriptor.base_field() else {
            return Err(ConfigError::NotAField {
                decorator: "field reader",
                item: descriptor.name().to_string(),
            }
            .into());
        };
        let value = base.decode(&mut *self.source)?;
        let field = FieldEntity::new(descriptor.clone(), value)?;
        notify_observers(descriptor, &field, &mut self.scope);
        Ok(field)
    }

    pub(crate) fn count_link(&self, sequence: &Sequence) -> Result<Option<Link<usize>>> {
        sequence
            .count()
            .map(|c| self.scope.resolve(c, sequence.name()))
            .transpose()
    }

    pub(crate) fn flag_link(&self, optional: &Optional) -> Result<Option<Link<bool>>> {
        optional
            .flag()
            .map(|c| self.scope.resolve(c, optional.name()))
            .transpose()
    }

    /// Speculatively read `descriptor`.
    ///
    /// Returns `None`, with the source back where it was, when the input
    /// does not hold one. Layout errors still propagate.
    pub(crate) fn try_read(&mut self, descriptor: &Descriptor) -> Result<Option<Entity>> {
        let checkpoint = self.source.checkpoint(descriptor.min_length())?;
        match self.read(descriptor) {
            Ok(entity) => {
                self.source.release(checkpoint);
                Ok(Some(entity))
            }
            Err(e) if e.is_speculative_miss() => {
                trace!(item = descriptor.name(), error = %e, "speculative read missed");
                self.source.rewind(checkpoint).map_err(FlatError::Rewind)?;
                Ok(None)
            }
            Err(e) => {
                self.source.release(checkpoint);
                Err(e)
            }
        }
    }

    /// Speculatively read the next element of a sequence without a count.
    ///
    /// An element that matches without consuming any input ends the
    /// sequence as well.
    pub(crate) fn next_element(&mut self, element: &Descriptor) -> Result<Option<Entity>> {
        let start = self.source.position();
        match self.try_read(element)? {
            Some(entity) if self.source.position() > start => Ok(Some(entity)),
            Some(_) => {
                trace!(item = element.name(), "element consumed no input, sequence ends");
                Ok(None)
            }
            None => {
                trace!(item = element.name(), "no further element, sequence ends");
                Ok(None)
            }
        }
    }

    /// Consume a wrapper's delimiter. End of input counts as one.
    pub(crate) fn expect_delimiter(&mut self, wrapper: &DelimiterWrapper) -> Result<()> {
        match self.source.next_char().map_err(DecodeError::Io)? {
            None => Ok(()),
            Some(c) if c == wrapper.delimiter() => Ok(()),
            Some(found) => Err(DecodeError::MissingDelimiter {
                item: wrapper.inner().name().to_string(),
                delimiter: wrapper.delimiter(),
                found,
            }
            .into()),
        }
    }
}

impl DescriptorHandler for ReadCx<'_> {
    type Output = Result<Entity>;

    fn unhandled(&mut self, descriptor: &Descriptor) -> Result<Entity> {
        Ok(Entity::Field(self.read_field(descriptor)?))
    }

    fn composite(&mut self, descriptor: &Descriptor, composite: &Composite) -> Result<Entity> {
        let children = composite
            .children()
            .iter()
            .map(|child| self.read(child))
            .collect::<Result<Vec<_>>>()?;
        Ok(Entity::Composite(CompositeEntity::new(descriptor.clone(), children)))
    }

    fn sequence(&mut self, descriptor: &Descriptor, sequence: &Sequence) -> Result<Entity> {
        let count = self.count_link(sequence)?;
        let mut elements = Vec::new();
        match &count {
            Some(link) => {
                for _ in 0..link.decoded()? {
                    elements.push(self.read(sequence.element())?);
                }
            }
            None => {
                while let Some(element) = self.next_element(sequence.element())? {
                    elements.push(element);
                }
            }
        }
        check_multiplicity(sequence, elements.len())?;
        Ok(Entity::Sequence(SequenceEntity::new(
            descriptor.clone(),
            sequence,
            elements,
            count,
        )))
    }

    fn optional(&mut self, descriptor: &Descriptor, optional: &Optional) -> Result<Entity> {
        let flag = self.flag_link(optional)?;
        let target = match &flag {
            Some(link) => {
                if link.decoded()? {
                    Some(self.read(optional.target())?)
                } else {
                    None
                }
            }
            None => self.try_read(optional.target())?,
        };
        Ok(Entity::Optional(OptionalEntity::new(
            descriptor.clone(),
            optional,
            target,
            flag,
        )))
    }

    fn delimiter_wrapper(
        &mut self,
        descriptor: &Descriptor,
        wrapper: &DelimiterWrapper,
    ) -> Result<Entity> {
        let inner = self.read(wrapper.inner())?;
        self.expect_delimiter(wrapper)?;
        Ok(Entity::Wrapped(WrappedEntity::new(descriptor.clone(), wrapper, inner)))
    }
}
