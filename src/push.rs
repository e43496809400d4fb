//! Push read: one synchronous traversal that reports each item to a handler
//! as soon as it is decoded.
//!
//! Structures are reported as a start/end pair around their children and
//! fields as a single value event. Elements and targets read by trial and
//! error are decoded whole first, then replayed to the handler, so a handler
//! never sees events from a speculative read that missed.

use crate::descriptor::{Descriptor, DescriptorHandler};
use crate::entity::Entity;
use crate::error::Result;
use crate::read::{ReadCx, check_multiplicity};
use crate::stream::CharSource;
use crate::structure::{Composite, DelimiterWrapper, Optional, Sequence};

/// One step of a read traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadEvent {
    /// A structure begins.
    Start(Descriptor),
    /// A field was decoded.
    Field { descriptor: Descriptor, value: String },
    /// A structure ends.
    End(Descriptor),
}

impl ReadEvent {
    pub fn descriptor(&self) -> &Descriptor {
        match self {
            ReadEvent::Start(d) | ReadEvent::End(d) => d,
            ReadEvent::Field { descriptor, .. } => descriptor,
        }
    }

    /// Hand this event to the matching handler callback.
    pub fn deliver(&self, handler: &mut dyn ReadHandler) -> Result<()> {
        match self {
            ReadEvent::Start(d) => handler.structure_start(d),
            ReadEvent::Field { descriptor, value } => handler.field(descriptor, value),
            ReadEvent::End(d) => handler.structure_end(d),
        }
    }
}

/// Receives push-read events. Returning an error aborts the read.
pub trait ReadHandler {
    fn structure_start(&mut self, _descriptor: &Descriptor) -> Result<()> {
        Ok(())
    }

    fn field(&mut self, descriptor: &Descriptor, value: &str) -> Result<()>;

    fn structure_end(&mut self, _descriptor: &Descriptor) -> Result<()> {
        Ok(())
    }
}

/// Collects every event.
impl ReadHandler for Vec<ReadEvent> {
    fn structure_start(&mut self, descriptor: &Descriptor) -> Result<()> {
        self.push(ReadEvent::Start(descriptor.clone()));
        Ok(())
    }

    fn field(&mut self, descriptor: &Descriptor, value: &str) -> Result<()> {
        self.push(ReadEvent::Field {
            descriptor: descriptor.clone(),
            value: value.to_string(),
        });
        Ok(())
    }

    fn structure_end(&mut self, descriptor: &Descriptor) -> Result<()> {
        self.push(ReadEvent::End(descriptor.clone()));
        Ok(())
    }
}

pub(crate) fn push_read(
    descriptor: &Descriptor,
    source: &mut dyn CharSource,
    handler: &mut dyn ReadHandler,
) -> Result<()> {
    let mut push = PushRead {
        cx: ReadCx::new(source),
        handler,
    };
    descriptor.dispatch(&mut push)
}

struct PushRead<'a, 's> {
    cx: ReadCx<'s>,
    handler: &'a mut dyn ReadHandler,
}

impl PushRead<'_, '_> {
    fn replay(&mut self, entity: &Entity) -> Result<()> {
        entity
            .events()
            .iter()
            .try_for_each(|event| event.deliver(&mut *self.handler))
    }
}

impl DescriptorHandler for PushRead<'_, '_> {
    type Output = Result<()>;

    fn unhandled(&mut self, descriptor: &Descriptor) -> Result<()> {
        let field = self.cx.read_field(descriptor)?;
        self.handler.field(descriptor, &field.value())
    }

    fn composite(&mut self, descriptor: &Descriptor, composite: &Composite) -> Result<()> {
        self.handler.structure_start(descriptor)?;
        for child in composite.children() {
            child.dispatch(self)?;
        }
        self.handler.structure_end(descriptor)
    }

    fn sequence(&mut self, descriptor: &Descriptor, sequence: &Sequence) -> Result<()> {
        self.handler.structure_start(descriptor)?;
        let count = match self.cx.count_link(sequence)? {
            Some(link) => {
                let count = link.decoded()?;
                for _ in 0..count {
                    sequence.element().dispatch(self)?;
                }
                count
            }
            None => {
                let mut count = 0;
                while let Some(element) = self.cx.next_element(sequence.element())? {
                    self.replay(&element)?;
                    count += 1;
                }
                count
            }
        };
        check_multiplicity(sequence, count)?;
        self.handler.structure_end(descriptor)
    }

    fn optional(&mut self, descriptor: &Descriptor, optional: &Optional) -> Result<()> {
        self.handler.structure_start(descriptor)?;
        match self.cx.flag_link(optional)? {
            Some(link) => {
                if link.decoded()? {
                    optional.target().dispatch(self)?;
                }
            }
            None => {
                if let Some(target) = self.cx.try_read(optional.target())? {
                    self.replay(&target)?;
                }
            }
        }
        self.handler.structure_end(descriptor)
    }

    fn delimiter_wrapper(
        &mut self,
        descriptor: &Descriptor,
        wrapper: &DelimiterWrapper,
    ) -> Result<()> {
        self.handler.structure_start(descriptor)?;
        wrapper.inner().dispatch(self)?;
        self.cx.expect_delimiter(wrapper)?;
        self.handler.structure_end(descriptor)
    }
}
