//! # flatfile-rs
//!
//! Schema-driven reading and writing of flat record files: the fixed-width
//! and delimited text layouts of legacy batch interchange.
//!
//! ## Overview
//!
//! A layout is a tree of immutable [`Descriptor`]s, assembled once and shared
//! freely between threads:
//! - **Fields**: constant literals, fixed-width columns, delimited values
//! - **Decorators**: constraint checks, typed conversion, observation
//! - **Structures**: composites, repeated sequences, optionals, and
//!   delimiter-terminated items
//!
//! Reading a descriptor produces an [`Entity`] tree that writes back to the
//! exact text it was read from. Reads can also be streamed, either pushed to
//! a [`ReadHandler`] or pulled one [`ReadEvent`] at a time; both report the
//! same events in the same order.
//!
//! A field can drive the shape of a later structure: an [`ObservableField`]
//! hands out a [`Correlation`] that a [`Sequence`] uses as its element count
//! or an [`Optional`] as its presence flag. Without one, sequences and
//! optionals read by trial and error, rewinding the input on a miss.
//!
//! ## Example
//!
//! ```
//! use flatfile_rs::{Composite, ConstantField, Descriptor, FixedField};
//!
//! // Record layout: Tag(3) Name(5) Code(9)
//! let layout: Descriptor = Composite::new(
//!     "rec",
//!     vec![
//!         ConstantField::new("tag", "FOO").unwrap().into(),
//!         FixedField::new("name", 5).unwrap().into(),
//!         FixedField::new("code", 9).unwrap().into(),
//!     ],
//! )
//! .unwrap()
//! .into();
//!
//! let record = layout.read_str("FOOTest1123456789").unwrap();
//! assert_eq!(record.length(), 17);
//! assert_eq!(record.to_text().unwrap(), "FOOTest1123456789");
//! ```

pub mod convert;
pub mod correlation;
mod create;
pub mod decorator;
pub mod descriptor;
pub mod entity;
pub mod error;
pub mod field;
pub mod layouts;
pub mod pull;
pub mod push;
mod read;
pub mod stream;
pub mod structure;

pub use convert::{BooleanConverter, Converter, ParseConverter};
pub use correlation::{Correlation, CorrelationId, Link, Scope};
pub use decorator::{
    ChoiceConstraint, ConstrainedField, FieldObserver, MaxLengthConstraint, ObservableField,
    PatternConstraint, TypedField, ValueConstraint,
};
pub use descriptor::{Descriptor, DescriptorHandler, DescriptorKind};
pub use entity::{
    CompositeEntity, Entity, EntityHandler, FieldEntity, OptionalEntity, SequenceEntity,
    WrappedEntity,
};
pub use error::{
    BoxError, ConfigError, ConstraintViolation, ConversionError, DecodeError, EncodeError,
    FlatError, Result,
};
pub use field::{Alignment, ConstantField, DelimitedField, FixedField, Padding};
pub use pull::PullReader;
pub use push::{ReadEvent, ReadHandler};
pub use stream::{CharSource, Checkpoint, ForwardOnly, ReaderSource, TextSource};
pub use structure::{Composite, DelimiterWrapper, Multiplicity, Optional, Sequence};
