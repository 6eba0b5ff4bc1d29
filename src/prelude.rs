pub use crate::config::TransformsConfig;
#[cfg(feature = "json")]
pub use crate::content::JsonCodec;
pub use crate::content::{
    downcast, value, Assembler, ByteCallback, ByteSource, CharSource, Deserializer,
    Disassembler, OctetCodec, Serializer, TextCallback, TextCodec, Value,
};
pub use crate::error::{Error, Result};
pub use crate::media::{MediaCoder, APPLICATION_JSON, APPLICATION_OCTET_STREAM, TEXT_PLAIN};
pub use crate::pipe::{PipeReader, Plumber};
pub use crate::transforms::Transforms;
pub use crate::types::{ClassDecl, Hierarchy, RawType, TypeDescriptor, TypeRef};
