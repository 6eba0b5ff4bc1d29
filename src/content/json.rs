//! JSON de/serialization of [`serde`] types with [`serde_json`].
//!
//! Rust has no runtime reflection, so a [`JsonCodec`] only handles the types
//! bound to it, each under its [`TypeDescriptor`]. Binding a Rust type under
//! a generic descriptor lets "list of Foo" and "list of Bar" be told apart:
//! ```
//! use jbcontent::content::json::JsonCodec;
//! use jbcontent::content::{downcast, Deserializer};
//! use jbcontent::types::{RawType, TypeDescriptor};
//!
//! #[derive(serde::Serialize, serde::Deserialize)]
//! struct Foo {
//!     id: u32,
//! }
//!
//! let list_of_foo = TypeDescriptor::generic(
//!     RawType::named("List"),
//!     vec![TypeDescriptor::of::<Foo>()],
//! );
//! let codec = JsonCodec::new()
//!     .with_type::<Foo>()
//!     .with_type_as::<Vec<Foo>>(list_of_foo.clone());
//!
//! let source = Box::new(std::io::Cursor::new(b"[{\"id\":1},{\"id\":2}]".to_vec()));
//! let foos: Vec<Foo> = downcast(codec.deserialize(source, &list_of_foo).unwrap()).unwrap();
//! assert_eq!(foos.len(), 2);
//! ```
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::io::prelude::*;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::content::{unsupported, CharSource, Deserializer, Serializer, Value};
use crate::error::{Error, Result};
use crate::types::TypeDescriptor;

type WriteJson = fn(Value, &TypeDescriptor, &mut dyn Write) -> Result<()>;
type ReadJson = fn(CharSource) -> Result<Value>;

#[derive(Clone, Copy)]
struct JsonBinding {
    write: WriteJson,
    read: ReadJson,
}

fn write_json<T: Serialize + Any>(
    value: Value,
    ty: &TypeDescriptor,
    sink: &mut dyn Write,
) -> Result<()> {
    match value.downcast::<T>() {
        Ok(value) => Ok(serde_json::to_writer(sink, &*value)?),
        Err(_) => Err(Error::Unsupported {
            codec: "json serializer",
            ty: ty.clone(),
            allowed: format!("a value of type {}", std::any::type_name::<T>()),
        }),
    }
}

fn read_json<T: DeserializeOwned + Any + Send>(source: CharSource) -> Result<Value> {
    let value: T = serde_json::from_reader(source)?;
    Ok(Box::new(value))
}

/// Serializer and deserializer for the serde types bound to it.
#[derive(Clone, Default)]
pub struct JsonCodec {
    bindings: HashMap<TypeDescriptor, JsonBinding>,
}

impl JsonCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `T` under its own descriptor.
    pub fn with_type<T>(self) -> Self
    where
        T: Serialize + DeserializeOwned + Any + Send,
    {
        self.with_type_as::<T>(TypeDescriptor::of::<T>())
    }

    /// Bind `T` under `descriptor`, typically a generic descriptor.
    pub fn with_type_as<T>(mut self, descriptor: TypeDescriptor) -> Self
    where
        T: Serialize + DeserializeOwned + Any + Send,
    {
        self.bindings.insert(
            descriptor,
            JsonBinding {
                write: write_json::<T>,
                read: read_json::<T>,
            },
        );
        self
    }

    pub fn supports(&self, ty: &TypeDescriptor) -> bool {
        self.bindings.contains_key(ty)
    }

    fn binding(&self, codec: &'static str, ty: &TypeDescriptor) -> Result<JsonBinding> {
        match self.bindings.get(ty) {
            Some(binding) => Ok(*binding),
            None => {
                let mut bound: Vec<String> = self.bindings.keys().map(|t| t.to_string()).collect();
                bound.sort();
                let bound: Vec<&str> = bound.iter().map(String::as_str).collect();
                Err(unsupported(codec, ty, &bound))
            }
        }
    }
}

impl fmt::Debug for JsonCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonCodec")
            .field("types", &self.bindings.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Serializer for JsonCodec {
    fn serialize(&self, value: Value, ty: &TypeDescriptor, sink: &mut dyn Write) -> Result<()> {
        let binding = self.binding("json serializer", ty)?;
        (binding.write)(value, ty, sink)
    }
}

impl Deserializer for JsonCodec {
    fn deserialize(&self, source: CharSource, ty: &TypeDescriptor) -> Result<Value> {
        let binding = self.binding("json deserializer", ty)?;
        (binding.read)(source)
    }
}
