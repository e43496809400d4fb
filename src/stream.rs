//! Character input sources.
//!
//! Reading is character-at-a-time. Backtracking (needed only by
//! trial-and-error reads) goes through explicit [`Checkpoint`] tokens: a
//! source hands one out from [`CharSource::checkpoint`] and takes it back in
//! either [`CharSource::rewind`] or [`CharSource::release`]. Sources that
//! cannot backtrack keep the default `checkpoint`, which fails with
//! [`DecodeError::MarkUnsupported`].

use std::io::{self, BufReader, ErrorKind, Read};

use crate::error::DecodeError;

/// A position a source can be rewound to.
///
/// Deliberately not `Clone`: a checkpoint is consumed by exactly one
/// `rewind` or `release`.
#[derive(Debug, PartialEq, Eq)]
pub struct Checkpoint {
    position: usize,
}

impl Checkpoint {
    /// Create a checkpoint at an absolute character position.
    pub fn at(position: usize) -> Self {
        Self { position }
    }

    pub fn position(&self) -> usize {
        self.position
    }
}

/// A source of characters read by a layout.
pub trait CharSource {
    /// Read the next character, `None` at end of input.
    fn next_char(&mut self) -> io::Result<Option<char>>;

    /// Number of characters consumed so far.
    fn position(&self) -> usize;

    /// Mark the current position. `lookahead` is the number of characters the
    /// caller expects to read before rewinding or releasing.
    fn checkpoint(&mut self, lookahead: usize) -> Result<Checkpoint, DecodeError> {
        let _ = lookahead;
        Err(DecodeError::MarkUnsupported)
    }

    /// Return to a checkpoint handed out by this source.
    fn rewind(&mut self, checkpoint: Checkpoint) -> io::Result<()> {
        let _ = checkpoint;
        Err(io::Error::new(
            ErrorKind::Unsupported,
            "source does not support rewinding",
        ))
    }

    /// Drop a checkpoint without rewinding.
    fn release(&mut self, checkpoint: Checkpoint) {
        let _ = checkpoint;
    }
}

impl<S: CharSource + ?Sized> CharSource for &mut S {
    fn next_char(&mut self) -> io::Result<Option<char>> {
        (**self).next_char()
    }

    fn position(&self) -> usize {
        (**self).position()
    }

    fn checkpoint(&mut self, lookahead: usize) -> Result<Checkpoint, DecodeError> {
        (**self).checkpoint(lookahead)
    }

    fn rewind(&mut self, checkpoint: Checkpoint) -> io::Result<()> {
        (**self).rewind(checkpoint)
    }

    fn release(&mut self, checkpoint: Checkpoint) {
        (**self).release(checkpoint);
    }
}

// ---------------------------------------------------------------------------
// In-memory text
// ---------------------------------------------------------------------------

/// A fully buffered source over a string.
#[derive(Debug, Clone)]
pub struct TextSource {
    chars: Vec<char>,
    cursor: usize,
}

impl TextSource {
    pub fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            cursor: 0,
        }
    }

    /// Characters not consumed yet.
    pub fn remaining(&self) -> String {
        self.chars[self.cursor..].iter().collect()
    }
}

impl CharSource for TextSource {
    fn next_char(&mut self) -> io::Result<Option<char>> {
        let c = self.chars.get(self.cursor).copied();
        if c.is_some() {
            self.cursor += 1;
        }
        Ok(c)
    }

    fn position(&self) -> usize {
        self.cursor
    }

    fn checkpoint(&mut self, _lookahead: usize) -> Result<Checkpoint, DecodeError> {
        Ok(Checkpoint::at(self.cursor))
    }

    fn rewind(&mut self, checkpoint: Checkpoint) -> io::Result<()> {
        if checkpoint.position > self.chars.len() {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                format!("checkpoint {} is past end of input", checkpoint.position),
            ));
        }
        self.cursor = checkpoint.position;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Streaming reader
// ---------------------------------------------------------------------------

/// An incremental UTF-8 source over any reader.
///
/// Characters read while a checkpoint is open are retained so they can be
/// replayed after a rewind. Once no checkpoint is open and every retained
/// character has been replayed the buffer is dropped.
pub struct ReaderSource<R> {
    reader: BufReader<R>,
    retained: Vec<char>,
    retained_start: usize,
    cursor: usize,
    open_checkpoints: usize,
}

impl<R: Read> ReaderSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            retained: Vec::new(),
            retained_start: 0,
            cursor: 0,
            open_checkpoints: 0,
        }
    }

    fn decode_next(&mut self) -> io::Result<Option<char>> {
        let mut bytes = [0u8; 4];
        loop {
            match self.reader.read(&mut bytes[..1]) {
                Ok(0) => return Ok(None),
                Ok(_) => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        let width = utf8_width(bytes[0]).ok_or_else(|| {
            io::Error::new(
                ErrorKind::InvalidData,
                format!("invalid UTF-8 lead byte 0x{:02x}", bytes[0]),
            )
        })?;
        self.reader.read_exact(&mut bytes[1..width])?;
        let text = std::str::from_utf8(&bytes[..width])
            .map_err(|e| io::Error::new(ErrorKind::InvalidData, e))?;
        Ok(text.chars().next())
    }

    fn compact(&mut self) {
        if self.open_checkpoints == 0 && self.cursor - self.retained_start >= self.retained.len()
        {
            self.retained.clear();
            self.retained_start = self.cursor;
        }
    }
}

fn utf8_width(lead: u8) -> Option<usize> {
    match lead {
        0x00..=0x7F => Some(1),
        0xC2..=0xDF => Some(2),
        0xE0..=0xEF => Some(3),
        0xF0..=0xF4 => Some(4),
        _ => None,
    }
}

impl<R: Read> CharSource for ReaderSource<R> {
    fn next_char(&mut self) -> io::Result<Option<char>> {
        let offset = self.cursor - self.retained_start;
        if let Some(&c) = self.retained.get(offset) {
            self.cursor += 1;
            self.compact();
            return Ok(Some(c));
        }
        let Some(c) = self.decode_next()? else {
            return Ok(None);
        };
        if self.open_checkpoints > 0 {
            self.retained.push(c);
        }
        self.cursor += 1;
        self.compact();
        Ok(Some(c))
    }

    fn position(&self) -> usize {
        self.cursor
    }

    fn checkpoint(&mut self, lookahead: usize) -> Result<Checkpoint, DecodeError> {
        if self.open_checkpoints == 0 {
            // Nothing before the cursor can be rewound to any more.
            let consumed = self.cursor - self.retained_start;
            self.retained.drain(..consumed);
            self.retained_start = self.cursor;
        }
        self.open_checkpoints += 1;
        self.retained.reserve(lookahead);
        Ok(Checkpoint::at(self.cursor))
    }

    fn rewind(&mut self, checkpoint: Checkpoint) -> io::Result<()> {
        if checkpoint.position < self.retained_start || checkpoint.position > self.cursor {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                format!(
                    "checkpoint {} is outside the retained window {}..{}",
                    checkpoint.position, self.retained_start, self.cursor
                ),
            ));
        }
        self.cursor = checkpoint.position;
        self.open_checkpoints = self.open_checkpoints.saturating_sub(1);
        self.compact();
        Ok(())
    }

    fn release(&mut self, _checkpoint: Checkpoint) {
        self.open_checkpoints = self.open_checkpoints.saturating_sub(1);
        self.compact();
    }
}

// ---------------------------------------------------------------------------
// Forward-only adapter
// ---------------------------------------------------------------------------

/// Wraps a source and hides its checkpoint support.
#[derive(Debug)]
pub struct ForwardOnly<S>(pub S);

impl<S: CharSource> CharSource for ForwardOnly<S> {
    fn next_char(&mut self) -> io::Result<Option<char>> {
        self.0.next_char()
    }

    fn position(&self) -> usize {
        self.0.position()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(source: &mut dyn CharSource, n: usize) -> String {
        (0..n)
            .filter_map(|_| source.next_char().unwrap())
            .collect()
    }

    #[test]
    fn test_text_source_rewind() {
        let mut source = TextSource::new("ABCDEF");
        assert_eq!(drain(&mut source, 2), "AB");
        let mark = source.checkpoint(3).unwrap();
        assert_eq!(drain(&mut source, 3), "CDE");
        source.rewind(mark).unwrap();
        assert_eq!(source.position(), 2);
        assert_eq!(source.remaining(), "CDEF");
    }

    #[test]
    fn test_text_source_end() {
        let mut source = TextSource::new("A");
        assert_eq!(source.next_char().unwrap(), Some('A'));
        assert_eq!(source.next_char().unwrap(), None);
        assert_eq!(source.position(), 1);
    }

    #[test]
    fn test_reader_source_decodes_utf8() {
        let mut source = ReaderSource::new("añ€😀".as_bytes());
        assert_eq!(drain(&mut source, 10), "añ€😀");
        assert_eq!(source.position(), 4);
    }

    #[test]
    fn test_reader_source_rejects_bad_utf8() {
        let bytes: &[u8] = &[0x41, 0xFF];
        let mut source = ReaderSource::new(bytes);
        assert_eq!(source.next_char().unwrap(), Some('A'));
        let err = source.next_char().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn test_reader_source_rewind_replays() {
        let mut source = ReaderSource::new("ABCDEF".as_bytes());
        assert_eq!(drain(&mut source, 1), "A");
        let mark = source.checkpoint(2).unwrap();
        assert_eq!(drain(&mut source, 3), "BCD");
        source.rewind(mark).unwrap();
        assert_eq!(drain(&mut source, 10), "BCDEF");
    }

    #[test]
    fn test_reader_source_nested_checkpoints() {
        let mut source = ReaderSource::new("ABCDEFG".as_bytes());
        let outer = source.checkpoint(0).unwrap();
        assert_eq!(drain(&mut source, 2), "AB");
        let inner = source.checkpoint(0).unwrap();
        assert_eq!(drain(&mut source, 2), "CD");
        source.rewind(inner).unwrap();
        assert_eq!(drain(&mut source, 1), "C");
        source.rewind(outer).unwrap();
        assert_eq!(drain(&mut source, 10), "ABCDEFG");
    }

    #[test]
    fn test_reader_source_release_keeps_position() {
        let mut source = ReaderSource::new("ABCD".as_bytes());
        let mark = source.checkpoint(2).unwrap();
        assert_eq!(drain(&mut source, 2), "AB");
        source.release(mark);
        assert_eq!(drain(&mut source, 10), "CD");
        assert_eq!(source.position(), 4);
    }

    #[test]
    fn test_reader_source_stale_checkpoint_fails() {
        let mut source = ReaderSource::new("ABCD".as_bytes());
        let mark = source.checkpoint(0).unwrap();
        source.release(Checkpoint::at(0));
        assert_eq!(drain(&mut source, 2), "AB");
        let _ = source.checkpoint(0).unwrap();
        assert!(source.rewind(mark).is_err());
    }

    #[test]
    fn test_forward_only_refuses_marks() {
        let mut source = ForwardOnly(TextSource::new("AB"));
        assert!(matches!(
            source.checkpoint(1),
            Err(DecodeError::MarkUnsupported)
        ));
        assert_eq!(source.next_char().unwrap(), Some('A'));
    }
}
