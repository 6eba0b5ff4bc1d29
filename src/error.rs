//! Error taxonomy shared by the registry, the media coder and the codecs.
use std::fmt;
use std::io;

use crate::types::resolver::ResolveError;
use crate::types::TypeDescriptor;

/// The four independent codec registries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecKind {
    Assembler,
    Disassembler,
    Serializer,
    Deserializer,
}

impl fmt::Display for CodecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Assembler => "assembler",
            Self::Disassembler => "disassembler",
            Self::Serializer => "serializer",
            Self::Deserializer => "deserializer",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Registry misuse, or a fallback content type that is needed but missing.
    #[error("configuration error: {0}")]
    Config(String),
    #[error("no codec associated to {content_type}")]
    NoCodec {
        kind: CodecKind,
        content_type: String,
    },
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    /// The content type matched a codec but its `charset` parameter is unusable.
    #[error("unsupported charset: {0:?}")]
    Charset(String),
    /// A default codec was handed a value or type outside its shape set.
    #[error("{codec} does not support {ty}, expected one of: {allowed}")]
    Unsupported {
        codec: &'static str,
        ty: TypeDescriptor,
        allowed: String,
    },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[cfg(feature = "json")]
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn config(message: &str) -> Self {
        Self::Config(message.to_string())
    }
    pub(crate) fn no_codec(kind: CodecKind, content_type: &str) -> Self {
        Self::NoCodec {
            kind,
            content_type: content_type.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
