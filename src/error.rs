//! Error types for assembling layouts and for reading and writing records.
//!
//! Every fallible operation in the crate returns [`Result`], whose error is
//! [`FlatError`]. The variants follow the failure categories a caller has to
//! tell apart: malformed input ([`DecodeError`]), unwritable entities
//! ([`EncodeError`]), rejected values ([`ConstraintViolation`],
//! [`ConversionError`]) and broken layouts ([`ConfigError`]).

use std::io;

use thiserror::Error;

use crate::structure::Multiplicity;

/// Boxed error produced by converters and other pluggable collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FlatError>;

/// Top-level error for every read, create, write and assembly call.
#[derive(Debug, Error)]
pub enum FlatError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Constraint(#[from] ConstraintViolation),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Rewinding to a checkpoint failed after a speculative read missed.
    #[error("failed to rewind input after speculative read: {0}")]
    Rewind(#[source] io::Error),

    /// A value was assigned to a constant field.
    #[error("field '{item}' is constant and cannot be changed")]
    Immutable { item: String },

    /// A pull reader was advanced after its last event.
    #[error("pull reader has no more events")]
    Exhausted,
}

impl FlatError {
    /// Whether a trial-and-error read treats this error as "nothing here".
    ///
    /// Shape failures of the input (short reads, mismatching literals,
    /// rejected values) count as a miss. Layout errors and rewind failures
    /// never do.
    pub fn is_speculative_miss(&self) -> bool {
        matches!(
            self,
            FlatError::Decode(_) | FlatError::Constraint(_) | FlatError::Conversion(_)
        )
    }
}

/// The input does not match the layout.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("item '{item}' needs {expected} characters but only {found} are available")]
    ShortRead {
        item: String,
        expected: usize,
        found: usize,
    },

    #[error("item '{item}' reached end of input before any character")]
    EndOfStream { item: String },

    #[error("constant '{item}' mismatch: {expected} != {found}")]
    ConstantMismatch {
        item: String,
        expected: String,
        found: String,
    },

    #[error("item '{item}' is not followed by delimiter {delimiter:?} (found {found:?})")]
    MissingDelimiter {
        item: String,
        delimiter: char,
        found: char,
    },

    #[error("sequence '{item}' holds {count} elements, outside multiplicity {multiplicity}")]
    Multiplicity {
        item: String,
        multiplicity: Multiplicity,
        count: usize,
    },

    #[error("unread input at character {position} (found {found:?})")]
    TrailingInput { position: usize, found: char },

    #[error("input source does not support marking")]
    MarkUnsupported,

    #[error("failed to read input: {0}")]
    Io(#[from] io::Error),
}

/// An entity tree cannot be written out.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("sequence '{item}' holds {count} elements, outside multiplicity {multiplicity}")]
    Multiplicity {
        item: String,
        multiplicity: Multiplicity,
        count: usize,
    },

    #[error("sequence '{item}' holds {actual} elements but count field '{field}' says {declared}")]
    CountMismatch {
        item: String,
        field: String,
        declared: usize,
        actual: usize,
    },

    #[error("value {value:?} of field '{item}' contains its delimiter {delimiter:?}")]
    DelimiterInValue {
        item: String,
        delimiter: char,
        value: String,
    },

    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

/// A value failed one or more constraints of a field.
#[derive(Debug, Error)]
#[error("field '{field}' value {value:?} violates [{}]", .violated.join(", "))]
pub struct ConstraintViolation {
    pub field: String,
    pub value: String,
    pub violated: Vec<String>,
}

/// A raw value could not be converted to or from its typed form.
#[derive(Debug, Error)]
#[error("cannot convert {raw:?} to {target}")]
pub struct ConversionError {
    pub raw: String,
    pub target: &'static str,
    #[source]
    pub source: Option<BoxError>,
}

impl ConversionError {
    pub fn new(raw: impl Into<String>, target: &'static str) -> Self {
        Self {
            raw: raw.into(),
            target,
            source: None,
        }
    }

    pub fn with_source(mut self, source: BoxError) -> Self {
        self.source = Some(source);
        self
    }
}

/// A layout is malformed or used in a way it was not assembled for.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("item names must not be empty")]
    EmptyName,

    #[error("fixed field '{item}' must have a positive width")]
    ZeroWidth { item: String },

    #[error("default {value:?} of field '{item}' does not fit width {width}")]
    DefaultTooWide {
        item: String,
        width: usize,
        value: String,
    },

    #[error("default {value:?} of field '{item}' contains its delimiter")]
    DelimiterInDefault { item: String, value: String },

    #[error("{decorator} can only wrap a field, '{item}' is not one")]
    NotAField {
        decorator: &'static str,
        item: String,
    },

    #[error("field '{item}' has no converter")]
    Untyped { item: String },

    #[error("field '{item}' declares constraint '{name}' twice")]
    DuplicateConstraint { item: String, name: String },

    #[error("invalid pattern for constraint '{name}': {source}")]
    InvalidPattern {
        name: String,
        #[source]
        source: regex::Error,
    },

    #[error("composite '{composite}' already has a child named '{name}'")]
    DuplicateChild { composite: String, name: String },

    #[error("composite '{composite}' uses the same descriptor '{name}' twice")]
    RepeatedDescriptor { composite: String, name: String },

    #[error("multiplicity {min}..{max} must allow at least one element")]
    InvalidMultiplicity { min: usize, max: usize },

    #[error("'{item}' depends on field '{field}', which has not been reached yet")]
    UnresolvedCorrelation { item: String, field: String },

    #[error("entity of '{found}' does not belong to '{item}'")]
    ForeignEntity { item: String, found: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_mismatch_message() {
        let err = DecodeError::ConstantMismatch {
            item: "tag".to_string(),
            expected: "FOO".to_string(),
            found: "BAR".to_string(),
        };
        assert!(err.to_string().contains("FOO != BAR"));
    }

    #[test]
    fn test_violation_lists_every_constraint() {
        let err = ConstraintViolation {
            field: "dept".to_string(),
            value: "X".to_string(),
            violated: vec!["choice".to_string(), "pattern".to_string()],
        };
        assert_eq!(
            err.to_string(),
            r#"field 'dept' value "X" violates [choice, pattern]"#
        );
    }

    #[test]
    fn test_speculative_miss_classification() {
        let miss: FlatError = DecodeError::MarkUnsupported.into();
        assert!(miss.is_speculative_miss());
        let config: FlatError = ConfigError::EmptyName.into();
        assert!(!config.is_speculative_miss());
        let rewind = FlatError::Rewind(io::Error::other("gone"));
        assert!(!rewind.is_speculative_miss());
    }

    #[test]
    fn test_conversion_error_keeps_source() {
        use std::error::Error;
        let parse = "x".parse::<u32>().unwrap_err();
        let err = ConversionError::new("x", "u32").with_source(Box::new(parse));
        assert!(err.source().is_some());
        assert_eq!(err.to_string(), r#"cannot convert "x" to u32"#);
    }
}
