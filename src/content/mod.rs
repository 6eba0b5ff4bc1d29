//! Codec contracts and value shapes.
//!
//! There are four codec kinds: an [`Assembler`] writes a value as bytes, a
//! [`Disassembler`] reads a value from bytes, a [`Serializer`] writes a value
//! as text and a [`Deserializer`] reads a value from text. Each of them is
//! handed the [`TypeDescriptor`] of the value alongside it, so that generic
//! payloads are handled by their full type and not only by their raw shape.
//!
//! Values cross the codec boundary as [`Value`]s, type-erased boxes that the
//! codec downcasts to the shapes it knows about.
use std::any::Any;
use std::fmt;
use std::io;
use std::io::prelude::*;

use crate::error::{Error, Result};
use crate::types::TypeDescriptor;

pub use crate::io::{ByteSource, CharSource};
#[cfg(feature = "json")]
pub use json::JsonCodec;
pub use octet::OctetCodec;
pub use text::TextCodec;

#[cfg(feature = "json")]
pub mod json;
pub mod octet;
pub mod text;

/// A type-erased value.
pub type Value = Box<dyn Any + Send>;

type WriteFn = Box<dyn FnOnce(&mut dyn Write) -> io::Result<()> + Send>;

/// Writes a value as bytes. Must not close the sink.
pub trait Assembler: Send + Sync {
    fn assemble(&self, value: Value, ty: &TypeDescriptor, sink: &mut dyn Write) -> Result<()>;
}

/// Reads a value from bytes. The source is dropped once read, unless it is
/// handed back inside the returned value.
pub trait Disassembler: Send + Sync {
    fn disassemble(&self, source: ByteSource, ty: &TypeDescriptor) -> Result<Value>;
}

/// Writes a value as UTF-8 text. Must not close the sink.
pub trait Serializer: Send + Sync {
    fn serialize(&self, value: Value, ty: &TypeDescriptor, sink: &mut dyn Write) -> Result<()>;
}

/// Reads a value from text. The source is dropped once read, unless it is
/// handed back inside the returned value.
pub trait Deserializer: Send + Sync {
    fn deserialize(&self, source: CharSource, ty: &TypeDescriptor) -> Result<Value>;
}

/// A payload that writes itself into a byte sink.
///
/// # Example
/// ```
/// use std::io::Write;
/// use jbcontent::content::ByteCallback;
///
/// let callback = ByteCallback::new(|sink| sink.write_all(b"\x00\x01"));
/// let mut out = vec![];
/// callback.call(&mut out).unwrap();
/// assert_eq!(out, b"\x00\x01");
/// ```
pub struct ByteCallback(WriteFn);

impl ByteCallback {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(&mut dyn Write) -> io::Result<()> + Send + 'static,
    {
        Self(Box::new(f))
    }
    pub fn call(self, sink: &mut dyn Write) -> io::Result<()> {
        (self.0)(sink)
    }
}

impl fmt::Debug for ByteCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByteCallback")
    }
}

/// A payload that writes itself into a text sink, as UTF-8.
pub struct TextCallback(WriteFn);

impl TextCallback {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(&mut dyn Write) -> io::Result<()> + Send + 'static,
    {
        Self(Box::new(f))
    }
    pub fn call(self, sink: &mut dyn Write) -> io::Result<()> {
        (self.0)(sink)
    }
}

impl fmt::Debug for TextCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TextCallback")
    }
}

/// Box a value for a codec.
pub fn value<T: Any + Send>(value: T) -> Value {
    Box::new(value)
}

/// Unbox a value returned by a codec.
pub fn downcast<T: Any>(value: Value) -> Result<T> {
    match value.downcast::<T>() {
        Ok(value) => Ok(*value),
        Err(_) => Err(Error::Unsupported {
            codec: "downcast",
            ty: TypeDescriptor::of::<T>(),
            allowed: "the type the value was read as".to_string(),
        }),
    }
}

pub(crate) fn unsupported(codec: &'static str, ty: &TypeDescriptor, allowed: &[&str]) -> Error {
    Error::Unsupported {
        codec,
        ty: ty.clone(),
        allowed: allowed.join(", "),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_downcast() {
        let v = value(42u32);
        assert_eq!(downcast::<u32>(v).unwrap(), 42);
        let v = value("str".to_string());
        assert!(matches!(downcast::<u32>(v), Err(Error::Unsupported { .. })));
    }

    #[test]
    fn test_text_callback() {
        let callback = TextCallback::new(|sink| write!(sink, "{}-{}", 1, 2));
        let mut out = vec![];
        callback.call(&mut out).unwrap();
        assert_eq!(out, b"1-2");
    }
}
