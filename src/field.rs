//! Base field kinds: constant literals, fixed-width columns and delimited
//! values.

use crate::descriptor::{BaseField, Descriptor};
use crate::error::{ConfigError, DecodeError};
use crate::stream::CharSource;

pub(crate) fn check_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() {
        Err(ConfigError::EmptyName)
    } else {
        Ok(())
    }
}

/// Read exactly `count` characters, or report how many were available.
fn read_exact(
    source: &mut dyn CharSource,
    item: &str,
    count: usize,
) -> Result<String, DecodeError> {
    let mut raw = String::with_capacity(count);
    for found in 0..count {
        match source.next_char()? {
            Some(c) => raw.push(c),
            None => {
                return Err(DecodeError::ShortRead {
                    item: item.to_string(),
                    expected: count,
                    found,
                });
            }
        }
    }
    Ok(raw)
}

// ---------------------------------------------------------------------------
// Constant
// ---------------------------------------------------------------------------

/// A literal that must appear verbatim in the input.
#[derive(Debug, Clone)]
pub struct ConstantField {
    name: String,
    literal: String,
}

impl ConstantField {
    pub fn new(name: impl Into<String>, literal: impl Into<String>) -> Result<Self, ConfigError> {
        let name = name.into();
        check_name(&name)?;
        Ok(Self {
            name,
            literal: literal.into(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn literal(&self) -> &str {
        &self.literal
    }

    pub(crate) fn decode(&self, source: &mut dyn CharSource) -> Result<String, DecodeError> {
        let raw = read_exact(source, &self.name, self.literal.chars().count())?;
        if raw != self.literal {
            return Err(DecodeError::ConstantMismatch {
                item: self.name.clone(),
                expected: self.literal.clone(),
                found: raw,
            });
        }
        Ok(raw)
    }
}

// ---------------------------------------------------------------------------
// Fixed width
// ---------------------------------------------------------------------------

/// Which side of a fixed-width column the value sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    /// Value first, padding after.
    #[default]
    Left,
    /// Padding first, value after.
    Right,
}

/// How a value is padded to, and recovered from, a fixed-width column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Padding {
    pub fill: char,
    pub alignment: Alignment,
}

impl Default for Padding {
    fn default() -> Self {
        Self::left(' ')
    }
}

impl Padding {
    pub fn left(fill: char) -> Self {
        Self {
            fill,
            alignment: Alignment::Left,
        }
    }

    pub fn right(fill: char) -> Self {
        Self {
            fill,
            alignment: Alignment::Right,
        }
    }

    /// Strip the fill characters from the padded side of `raw`.
    ///
    /// A right-aligned column filled entirely with a digit keeps its last
    /// digit, so `"0000"` reads as `"0"`.
    pub fn strip<'a>(&self, raw: &'a str) -> &'a str {
        match self.alignment {
            Alignment::Left => raw.trim_end_matches(self.fill),
            Alignment::Right => {
                let stripped = raw.trim_start_matches(self.fill);
                if stripped.is_empty() && self.fill.is_ascii_digit() {
                    &raw[raw.len() - self.fill.len_utf8().min(raw.len())..]
                } else {
                    stripped
                }
            }
        }
    }

    /// Pad or truncate `value` to exactly `width` characters.
    ///
    /// Truncation keeps the aligned end: left-aligned values lose their
    /// tail, right-aligned values lose their head.
    pub fn apply(&self, value: &str, width: usize) -> String {
        let len = value.chars().count();
        if len >= width {
            return match self.alignment {
                Alignment::Left => value.chars().take(width).collect(),
                Alignment::Right => value.chars().skip(len - width).collect(),
            };
        }
        let fill: String = std::iter::repeat_n(self.fill, width - len).collect();
        match self.alignment {
            Alignment::Left => format!("{value}{fill}"),
            Alignment::Right => format!("{fill}{value}"),
        }
    }
}

/// A column of a fixed number of characters.
#[derive(Debug, Clone)]
pub struct FixedField {
    name: String,
    width: usize,
    padding: Padding,
    default: String,
}

impl FixedField {
    pub fn new(name: impl Into<String>, width: usize) -> Result<Self, ConfigError> {
        let name = name.into();
        check_name(&name)?;
        if width == 0 {
            return Err(ConfigError::ZeroWidth { item: name });
        }
        Ok(Self {
            name,
            width,
            padding: Padding::default(),
            default: String::new(),
        })
    }

    pub fn with_padding(mut self, padding: Padding) -> Self {
        self.padding = padding;
        self.default = padding.strip(&self.default).to_string();
        self
    }

    /// Set the default value, given either bare or already padded.
    pub fn with_default(mut self, value: &str) -> Result<Self, ConfigError> {
        let stripped = self.padding.strip(value);
        if stripped.chars().count() > self.width {
            return Err(ConfigError::DefaultTooWide {
                item: self.name,
                width: self.width,
                value: value.to_string(),
            });
        }
        self.default = stripped.to_string();
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn padding(&self) -> Padding {
        self.padding
    }

    pub fn default_value(&self) -> &str {
        &self.default
    }

    pub(crate) fn decode(&self, source: &mut dyn CharSource) -> Result<String, DecodeError> {
        let raw = read_exact(source, &self.name, self.width)?;
        Ok(self.padding.strip(&raw).to_string())
    }

    pub(crate) fn encode(&self, value: &str) -> String {
        self.padding.apply(value, self.width)
    }
}

// ---------------------------------------------------------------------------
// Delimited
// ---------------------------------------------------------------------------

/// A value running up to a terminating character (or end of input).
///
/// The delimiter cannot be escaped inside the value.
#[derive(Debug, Clone)]
pub struct DelimitedField {
    name: String,
    delimiter: char,
    default: String,
}

impl DelimitedField {
    pub fn new(name: impl Into<String>, delimiter: char) -> Result<Self, ConfigError> {
        let name = name.into();
        check_name(&name)?;
        Ok(Self {
            name,
            delimiter,
            default: String::new(),
        })
    }

    pub fn with_default(mut self, value: &str) -> Result<Self, ConfigError> {
        if value.contains(self.delimiter) {
            return Err(ConfigError::DelimiterInDefault {
                item: self.name,
                value: value.to_string(),
            });
        }
        self.default = value.to_string();
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    pub fn default_value(&self) -> &str {
        &self.default
    }

    pub(crate) fn decode(&self, source: &mut dyn CharSource) -> Result<String, DecodeError> {
        let mut value = String::new();
        let mut seen_any = false;
        while let Some(c) = source.next_char()? {
            seen_any = true;
            if c == self.delimiter {
                return Ok(value);
            }
            value.push(c);
        }
        if !seen_any {
            return Err(DecodeError::EndOfStream {
                item: self.name.clone(),
            });
        }
        Ok(value)
    }

    pub(crate) fn encode(&self, value: &str) -> String {
        let mut out = String::with_capacity(value.len() + self.delimiter.len_utf8());
        out.push_str(value);
        out.push(self.delimiter);
        out
    }
}

// ---------------------------------------------------------------------------
// Dispatch over the base of a decorator chain
// ---------------------------------------------------------------------------

impl<'a> BaseField<'a> {
    pub(crate) fn default_value(self) -> &'a str {
        match self {
            BaseField::Constant(f) => f.literal(),
            BaseField::Delimited(f) => f.default_value(),
            BaseField::Fixed(f) => f.default_value(),
        }
    }

    pub(crate) fn decode(self, source: &mut dyn CharSource) -> Result<String, DecodeError> {
        match self {
            BaseField::Constant(f) => f.decode(source),
            BaseField::Delimited(f) => f.decode(source),
            BaseField::Fixed(f) => f.decode(source),
        }
    }

    pub(crate) fn encode(self, value: &str) -> String {
        match self {
            BaseField::Constant(f) => f.literal().to_string(),
            BaseField::Delimited(f) => f.encode(value),
            BaseField::Fixed(f) => f.encode(value),
        }
    }

    /// The value a reader recovers after `value` is written, which differs
    /// from `value` when a fixed column truncates it.
    pub(crate) fn written_value(self, value: &str) -> String {
        match self {
            BaseField::Constant(f) => f.literal().to_string(),
            BaseField::Delimited(_) => value.to_string(),
            BaseField::Fixed(f) => f.padding().strip(&f.encode(value)).to_string(),
        }
    }

    /// Serialized length of `value`, without building the string.
    pub(crate) fn encoded_len(self, value: &str) -> usize {
        match self {
            BaseField::Constant(f) => f.literal().chars().count(),
            BaseField::Delimited(_) => value.chars().count() + 1,
            BaseField::Fixed(f) => f.width(),
        }
    }
}

impl Descriptor {
    /// Default raw value of a field descriptor, empty for structures.
    pub(crate) fn default_value(&self) -> String {
        self.base_field()
            .map(|base| base.default_value().to_string())
            .unwrap_or_default()
    }
}
