//! Pull read: the push traversal as a resumable, caller-driven iterator.
//!
//! Each structure kind has a cursor that emits its start event, then drives
//! one child cursor at a time until that child is exhausted, then emits its
//! end event. Elements and targets read by trial and error are decoded whole
//! and replayed from a queue, exactly as the push reader does, so both
//! protocols report the same events in the same order.

use std::collections::VecDeque;

use tracing::debug;

use crate::descriptor::{Descriptor, DescriptorHandler};
use crate::error::{FlatError, Result};
use crate::push::ReadEvent;
use crate::read::{ReadCx, check_multiplicity};
use crate::stream::CharSource;
use crate::structure::{Composite, DelimiterWrapper, Optional, Sequence};

/// Step-wise reader returned by [`Descriptor::pull_read`].
///
/// Also an [`Iterator`] over `Result<ReadEvent>`. Iteration stops after the
/// final event or after the first error.
pub struct PullReader<'s> {
    cx: ReadCx<'s>,
    root: Cursor,
    failed: bool,
}

impl<'s> PullReader<'s> {
    pub(crate) fn new(descriptor: &Descriptor, source: &'s mut dyn CharSource) -> Self {
        debug!(item = descriptor.name(), "pull read started");
        Self {
            cx: ReadCx::new(source),
            root: Cursor::new(descriptor),
            failed: false,
        }
    }

    /// Whether another event can be pulled.
    pub fn has_next(&self) -> bool {
        !self.failed && !self.root.is_done()
    }

    /// Advance by exactly one event.
    pub fn next_event(&mut self) -> Result<ReadEvent> {
        if !self.has_next() {
            return Err(FlatError::Exhausted);
        }
        match self.root.step(&mut self.cx) {
            Ok(Some(event)) => {
                if self.root.is_done() {
                    debug!(item = event.descriptor().name(), "pull read finished");
                }
                Ok(event)
            }
            Ok(None) => Err(FlatError::Exhausted),
            Err(e) => {
                self.failed = true;
                Err(e)
            }
        }
    }
}

impl Iterator for PullReader<'_> {
    type Item = Result<ReadEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        self.has_next().then(|| self.next_event())
    }
}

// ---------------------------------------------------------------------------
// Cursors
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq, Eq)]
enum Phase {
    Start,
    Body,
    Done,
}

/// How a sequence cursor finds its elements, decided once its start event
/// has been emitted.
enum Plan {
    Counted(usize),
    Trial,
}

enum Cursor {
    Field(FieldCursor),
    Composite(CompositeCursor),
    Sequence(SequenceCursor),
    Optional(OptionalCursor),
    Wrapper(WrapperCursor),
    Replay(VecDeque<ReadEvent>),
}

struct FieldCursor {
    descriptor: Descriptor,
    done: bool,
}

struct CompositeCursor {
    descriptor: Descriptor,
    composite: Composite,
    phase: Phase,
    next_child: usize,
    child: Option<Box<Cursor>>,
}

struct SequenceCursor {
    descriptor: Descriptor,
    sequence: Sequence,
    phase: Phase,
    plan: Option<Plan>,
    count: usize,
    child: Option<Box<Cursor>>,
}

struct OptionalCursor {
    descriptor: Descriptor,
    optional: Optional,
    phase: Phase,
    decided: bool,
    child: Option<Box<Cursor>>,
}

struct WrapperCursor {
    descriptor: Descriptor,
    wrapper: DelimiterWrapper,
    phase: Phase,
    child: Option<Box<Cursor>>,
}

/// Builds the cursor for a descriptor's kind.
struct CursorFactory;

impl DescriptorHandler for CursorFactory {
    type Output = Cursor;

    fn unhandled(&mut self, descriptor: &Descriptor) -> Cursor {
        Cursor::Field(FieldCursor {
            descriptor: descriptor.clone(),
            done: false,
        })
    }

    fn composite(&mut self, descriptor: &Descriptor, composite: &Composite) -> Cursor {
        Cursor::Composite(CompositeCursor {
            descriptor: descriptor.clone(),
            composite: composite.clone(),
            phase: Phase::Start,
            next_child: 0,
            child: None,
        })
    }

    fn sequence(&mut self, descriptor: &Descriptor, sequence: &Sequence) -> Cursor {
        Cursor::Sequence(SequenceCursor {
            descriptor: descriptor.clone(),
            sequence: sequence.clone(),
            phase: Phase::Start,
            plan: None,
            count: 0,
            child: None,
        })
    }

    fn optional(&mut self, descriptor: &Descriptor, optional: &Optional) -> Cursor {
        Cursor::Optional(OptionalCursor {
            descriptor: descriptor.clone(),
            optional: optional.clone(),
            phase: Phase::Start,
            decided: false,
            child: None,
        })
    }

    fn delimiter_wrapper(&mut self, descriptor: &Descriptor, wrapper: &DelimiterWrapper) -> Cursor {
        Cursor::Wrapper(WrapperCursor {
            descriptor: descriptor.clone(),
            wrapper: wrapper.clone(),
            phase: Phase::Start,
            child: None,
        })
    }
}

/// Advance `child`, dropping it once it has no more events.
fn step_child(child: &mut Option<Box<Cursor>>, cx: &mut ReadCx<'_>) -> Result<Option<ReadEvent>> {
    let Some(cursor) = child else {
        return Ok(None);
    };
    let event = cursor.step(cx)?;
    if event.is_none() {
        *child = None;
    }
    Ok(event)
}

impl Cursor {
    fn new(descriptor: &Descriptor) -> Self {
        descriptor.dispatch(&mut CursorFactory)
    }

    fn boxed(descriptor: &Descriptor) -> Option<Box<Cursor>> {
        Some(Box::new(Cursor::new(descriptor)))
    }

    fn replay(events: Vec<ReadEvent>) -> Option<Box<Cursor>> {
        Some(Box::new(Cursor::Replay(events.into())))
    }

    fn is_done(&self) -> bool {
        match self {
            Cursor::Field(c) => c.done,
            Cursor::Composite(c) => c.phase == Phase::Done,
            Cursor::Sequence(c) => c.phase == Phase::Done,
            Cursor::Optional(c) => c.phase == Phase::Done,
            Cursor::Wrapper(c) => c.phase == Phase::Done,
            Cursor::Replay(events) => events.is_empty(),
        }
    }

    /// Next event of this item, or `None` once it has emitted its last one.
    fn step(&mut self, cx: &mut ReadCx<'_>) -> Result<Option<ReadEvent>> {
        match self {
            Cursor::Field(c) => c.step(cx),
            Cursor::Composite(c) => c.step(cx),
            Cursor::Sequence(c) => c.step(cx),
            Cursor::Optional(c) => c.step(cx),
            Cursor::Wrapper(c) => c.step(cx),
            Cursor::Replay(events) => Ok(events.pop_front()),
        }
    }
}

impl FieldCursor {
    fn step(&mut self, cx: &mut ReadCx<'_>) -> Result<Option<ReadEvent>> {
        if self.done {
            return Ok(None);
        }
        let field = cx.read_field(&self.descriptor)?;
        self.done = true;
        Ok(Some(ReadEvent::Field {
            descriptor: self.descriptor.clone(),
            value: field.value(),
        }))
    }
}

impl CompositeCursor {
    fn step(&mut self, cx: &mut ReadCx<'_>) -> Result<Option<ReadEvent>> {
        match self.phase {
            Phase::Start => {
                self.phase = Phase::Body;
                Ok(Some(ReadEvent::Start(self.descriptor.clone())))
            }
            Phase::Body => loop {
                if let Some(event) = step_child(&mut self.child, cx)? {
                    return Ok(Some(event));
                }
                match self.composite.children().get(self.next_child) {
                    Some(child) => {
                        self.child = Cursor::boxed(child);
                        self.next_child += 1;
                    }
                    None => {
                        self.phase = Phase::Done;
                        return Ok(Some(ReadEvent::End(self.descriptor.clone())));
                    }
                }
            },
            Phase::Done => Ok(None),
        }
    }
}

impl SequenceCursor {
    fn step(&mut self, cx: &mut ReadCx<'_>) -> Result<Option<ReadEvent>> {
        match self.phase {
            Phase::Start => {
                self.phase = Phase::Body;
                Ok(Some(ReadEvent::Start(self.descriptor.clone())))
            }
            Phase::Body => {
                if self.plan.is_none() {
                    self.plan = Some(match cx.count_link(&self.sequence)? {
                        Some(link) => Plan::Counted(link.decoded()?),
                        None => Plan::Trial,
                    });
                }
                loop {
                    if self.child.is_some() {
                        if let Some(event) = step_child(&mut self.child, cx)? {
                            return Ok(Some(event));
                        }
                        self.count += 1;
                    }
                    self.child = match self.plan {
                        Some(Plan::Counted(n)) if self.count < n => {
                            Cursor::boxed(self.sequence.element())
                        }
                        Some(Plan::Trial) => cx
                            .next_element(self.sequence.element())?
                            .and_then(|element| Cursor::replay(element.events())),
                        _ => None,
                    };
                    if self.child.is_none() {
                        check_multiplicity(&self.sequence, self.count)?;
                        self.phase = Phase::Done;
                        return Ok(Some(ReadEvent::End(self.descriptor.clone())));
                    }
                }
            }
            Phase::Done => Ok(None),
        }
    }
}

impl OptionalCursor {
    fn step(&mut self, cx: &mut ReadCx<'_>) -> Result<Option<ReadEvent>> {
        match self.phase {
            Phase::Start => {
                self.phase = Phase::Body;
                Ok(Some(ReadEvent::Start(self.descriptor.clone())))
            }
            Phase::Body => {
                if !self.decided {
                    self.decided = true;
                    self.child = match cx.flag_link(&self.optional)? {
                        Some(link) => {
                            if link.decoded()? {
                                Cursor::boxed(self.optional.target())
                            } else {
                                None
                            }
                        }
                        None => cx
                            .try_read(self.optional.target())?
                            .and_then(|target| Cursor::replay(target.events())),
                    };
                }
                if let Some(event) = step_child(&mut self.child, cx)? {
                    return Ok(Some(event));
                }
                self.phase = Phase::Done;
                Ok(Some(ReadEvent::End(self.descriptor.clone())))
            }
            Phase::Done => Ok(None),
        }
    }
}

impl WrapperCursor {
    fn step(&mut self, cx: &mut ReadCx<'_>) -> Result<Option<ReadEvent>> {
        match self.phase {
            Phase::Start => {
                self.phase = Phase::Body;
                self.child = Cursor::boxed(self.wrapper.inner());
                Ok(Some(ReadEvent::Start(self.descriptor.clone())))
            }
            Phase::Body => {
                if let Some(event) = step_child(&mut self.child, cx)? {
                    return Ok(Some(event));
                }
                cx.expect_delimiter(&self.wrapper)?;
                self.phase = Phase::Done;
                Ok(Some(ReadEvent::End(self.descriptor.clone())))
            }
            Phase::Done => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{ConstantField, FixedField};
    use crate::stream::TextSource;
    use crate::structure::Multiplicity;

    fn bars(multiplicity: Option<Multiplicity>) -> Descriptor {
        let seq = Sequence::new("bars", ConstantField::new("bar", "BAR").unwrap().into()).unwrap();
        match multiplicity {
            Some(m) => seq.with_multiplicity(m).into(),
            None => seq.into(),
        }
    }

    #[test]
    fn test_pull_steps_one_event_at_a_time() {
        let seq = bars(None);
        let mut source = TextSource::new("BARBARBAL");
        let mut reader = seq.pull_read(&mut source);
        assert!(reader.has_next());
        assert_eq!(reader.next_event().unwrap(), ReadEvent::Start(seq.clone()));
        assert!(matches!(reader.next_event().unwrap(), ReadEvent::Field { .. }));
        assert!(matches!(reader.next_event().unwrap(), ReadEvent::Field { .. }));
        assert!(reader.has_next());
        assert_eq!(reader.next_event().unwrap(), ReadEvent::End(seq.clone()));
        assert!(!reader.has_next());
        assert!(matches!(reader.next_event(), Err(FlatError::Exhausted)));
    }

    #[test]
    fn test_pull_stops_after_error() {
        let seq = bars(Some(Multiplicity::new(1, 2).unwrap()));
        let mut source = TextSource::new("BARBARBAR");
        let results: Vec<_> = seq.pull_read(&mut source).collect();
        assert_eq!(results.len(), 5);
        assert!(results[..4].iter().all(Result::is_ok));
        assert!(results[4].is_err());
    }

    #[test]
    fn test_pull_field_root() {
        let field: Descriptor = FixedField::new("a", 3).unwrap().into();
        let mut source = TextSource::new("xyz");
        let events: Vec<_> = field
            .pull_read(&mut source)
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(
            events,
            vec![ReadEvent::Field {
                descriptor: field.clone(),
                value: "xyz".to_string(),
            }]
        );
    }

    #[test]
    fn test_pull_reads_lazily() {
        let rec: Descriptor = Composite::new(
            "rec",
            vec![
                FixedField::new("a", 2).unwrap().into(),
                FixedField::new("b", 2).unwrap().into(),
            ],
        )
        .unwrap()
        .into();
        let mut source = TextSource::new("aabb");
        {
            let mut reader = rec.pull_read(&mut source);
            reader.next_event().unwrap();
            reader.next_event().unwrap();
        }
        assert_eq!(source.remaining(), "bb");
    }
}
