//! Content type negotiation and body transforms for HTTP frameworks.
//! * Pluggable [codecs](crate::content) for bytes and text, with built-in
//!   [octet](crate::content::octet) and [text](crate::content::text) codecs
//! * [JSON de/serialization](crate::content::json) with [`serde_json`](serde_json)
//! * Content type [negotiation](crate::transforms::Transforms) with fallback types
//! * Charset and base64 [decoding](crate::media)
//! * [Generic type](crate::types::TypeDescriptor) aware dispatch, with a
//!   [type parameter resolver](crate::types::Hierarchy)
//! * Streaming of serialized bodies through a [pipe](crate::pipe::Plumber)
//!
//! # Example
//! ```
//! use std::io::{Read, Write};
//! use std::sync::Arc;
//! use jbcontent::prelude::*;
//!
//! let mut transforms = Transforms::default();
//! transforms.put_serializer("text/markdown", Arc::new(TextCodec)).unwrap();
//! transforms.put_extension_type("md", "text/markdown").unwrap();
//! let transforms = Arc::new(transforms);
//!
//! // Primitives negotiate to text/plain.
//! let mut body = vec![];
//! let content_type = transforms
//!     .write(None, value(42u32), &TypeDescriptor::of::<u32>(), &mut body)
//!     .unwrap();
//! assert_eq!((content_type.as_str(), body.as_slice()), (TEXT_PLAIN, &b"42"[..]));
//!
//! // Bodies are decoded with the charset of their content type.
//! let latin1: ByteSource = Box::new(&b"caf\xe9"[..]);
//! let text = transforms
//!     .read(Some("text/plain; charset=ISO-8859-1"), latin1, &TypeDescriptor::of::<String>())
//!     .unwrap();
//! assert_eq!(downcast::<String>(text).unwrap(), "caf\u{e9}");
//!
//! // Callbacks are streamed from another thread.
//! let callback = TextCallback::new(|sink| writeln!(sink, "# Title"));
//! let content_type = transforms.extension_type("md").map(str::to_string);
//! let (_, mut reader) = transforms
//!     .stream(content_type.as_deref(), value(callback), TypeDescriptor::named("Page"))
//!     .unwrap();
//! let mut out = String::new();
//! reader.read_to_string(&mut out).unwrap();
//! assert_eq!(out, "# Title\n");
//! ```
pub mod config;
pub mod content;
pub mod error;
pub mod io;
pub mod media;
pub mod pipe;
pub mod prelude;
pub mod runner;
pub mod transforms;
pub mod types;

pub use error::{Error, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
