//! Default text codec for `text/plain`.
use std::any::Any;
use std::io;
use std::io::prelude::*;

use crate::content::{unsupported, CharSource, Deserializer, Serializer, TextCallback, Value};
use crate::error::Result;
use crate::media::read_string;
use crate::types::TypeDescriptor;

const SERIALIZER_SHAPES: &[&str] = &[
    "String",
    "&'static str",
    "char",
    "bool",
    "integer and float primitives",
    "CharSource",
    "TextCallback",
];
const DESERIALIZER_SHAPES: &[&str] = &["String", "CharSource"];

// Written through their Display implementation.
macro_rules! display_shapes {
    ($m:ident) => {
        $m!(
            String, &'static str, char, bool, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64,
            u128, usize, f32, f64
        )
    };
}

/// True if the text codec knows how to write `value`.
pub fn is_textual(value: &(dyn Any + Send)) -> bool {
    macro_rules! any_is {
        ($($t:ty),*) => { false $(|| value.is::<$t>())* };
    }
    display_shapes!(any_is) || value.is::<CharSource>() || value.is::<TextCallback>()
}

/// True if the text codec knows how to read a value of type `ty`.
pub fn is_textual_type(ty: &TypeDescriptor) -> bool {
    ty.is::<String>() || ty.is::<CharSource>()
}

/// Writes strings, primitives, character streams and text callbacks, and
/// reads strings or hands back the character stream itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextCodec;

impl Serializer for TextCodec {
    fn serialize(&self, value: Value, ty: &TypeDescriptor, sink: &mut dyn Write) -> Result<()> {
        macro_rules! try_display {
            ($($t:ty),*) => {{
                $(
                    let value = match value.downcast::<$t>() {
                        Ok(v) => {
                            write!(sink, "{}", v)?;
                            return Ok(());
                        }
                        Err(value) => value,
                    };
                )*
                value
            }};
        }
        let value = display_shapes!(try_display);
        let value = match value.downcast::<CharSource>() {
            Ok(mut source) => {
                io::copy(&mut *source, sink)?;
                return Ok(());
            }
            Err(value) => value,
        };
        match value.downcast::<TextCallback>() {
            Ok(callback) => Ok(callback.call(sink)?),
            Err(_) => Err(unsupported("text serializer", ty, SERIALIZER_SHAPES)),
        }
    }
}

impl Deserializer for TextCodec {
    fn deserialize(&self, source: CharSource, ty: &TypeDescriptor) -> Result<Value> {
        if ty.is::<String>() {
            Ok(Box::new(read_string(source)?))
        } else if ty.is::<CharSource>() {
            Ok(Box::new(source))
        } else {
            Err(unsupported("text deserializer", ty, DESERIALIZER_SHAPES))
        }
    }
}
