//! Value converters between raw field text and typed values.

use std::any::{Any, type_name};
use std::fmt::Display;
use std::marker::PhantomData;
use std::str::FromStr;

use crate::error::{BoxError, ConversionError};

/// Converts the raw text of a field to and from a typed value.
pub trait Converter: Send + Sync {
    type Value;

    fn decode(&self, raw: &str) -> Result<Self::Value, BoxError>;

    fn encode(&self, value: &Self::Value) -> Result<String, BoxError>;

    /// Name of the target type, used in error messages.
    fn type_name(&self) -> &'static str {
        type_name::<Self::Value>()
    }
}

/// Decode `raw`, wrapping any converter failure with its context.
pub(crate) fn decode_with<C>(converter: &C, raw: &str) -> Result<C::Value, ConversionError>
where
    C: Converter + ?Sized,
{
    converter
        .decode(raw)
        .map_err(|e| ConversionError::new(raw, converter.type_name()).with_source(e))
}

/// Encode `value`, wrapping any converter failure with its context.
pub(crate) fn encode_with<C>(converter: &C, value: &C::Value) -> Result<String, ConversionError>
where
    C: Converter + ?Sized,
{
    converter
        .encode(value)
        .map_err(|e| ConversionError::new("<unencodable>", converter.type_name()).with_source(e))
}

/// Type-erased converter stored by typed fields.
pub(crate) trait AnyConverter: Send + Sync {
    fn target(&self) -> &'static str;

    fn decode_any(&self, raw: &str) -> Result<Box<dyn Any>, BoxError>;

    fn encode_any(&self, value: &dyn Any) -> Result<String, BoxError>;
}

impl<C> AnyConverter for C
where
    C: Converter,
    C::Value: 'static,
{
    fn target(&self) -> &'static str {
        self.type_name()
    }

    fn decode_any(&self, raw: &str) -> Result<Box<dyn Any>, BoxError> {
        Ok(Box::new(self.decode(raw)?))
    }

    fn encode_any(&self, value: &dyn Any) -> Result<String, BoxError> {
        let value = value
            .downcast_ref::<C::Value>()
            .ok_or_else(|| format!("value is not a {}", self.type_name()))?;
        self.encode(value)
    }
}

/// Converter for any type with `FromStr` and `Display`, such as integers.
///
/// Surrounding whitespace is ignored on decode so that space-padded numeric
/// columns convert cleanly.
pub struct ParseConverter<T>(PhantomData<fn() -> T>);

impl<T> ParseConverter<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for ParseConverter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Converter for ParseConverter<T>
where
    T: FromStr + Display,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    type Value = T;

    fn decode(&self, raw: &str) -> Result<T, BoxError> {
        Ok(raw.trim().parse::<T>()?)
    }

    fn encode(&self, value: &T) -> Result<String, BoxError> {
        Ok(value.to_string())
    }
}

/// Converter between a pair of marker texts and `bool`.
#[derive(Debug, Clone)]
pub struct BooleanConverter {
    true_text: String,
    false_text: String,
}

impl BooleanConverter {
    pub fn new(true_text: impl Into<String>, false_text: impl Into<String>) -> Self {
        Self {
            true_text: true_text.into(),
            false_text: false_text.into(),
        }
    }

    /// `Y` / `N` flags, as found on most card layouts.
    pub fn yes_no() -> Self {
        Self::new("Y", "N")
    }
}

impl Converter for BooleanConverter {
    type Value = bool;

    fn decode(&self, raw: &str) -> Result<bool, BoxError> {
        let raw = raw.trim();
        if raw == self.true_text {
            Ok(true)
        } else if raw == self.false_text {
            Ok(false)
        } else {
            Err(format!(
                "expected {:?} or {:?}, found {raw:?}",
                self.true_text, self.false_text
            )
            .into())
        }
    }

    fn encode(&self, value: &bool) -> Result<String, BoxError> {
        Ok(if *value {
            self.true_text.clone()
        } else {
            self.false_text.clone()
        })
    }
}
