//! Declarative registry settings.
//!
//! Codecs are Rust values and are registered in code; everything else a
//! [`Transforms`](crate::transforms::Transforms) needs can come from a
//! configuration file:
//! ```json
//! {
//!     "default_charset": "ISO-8859-1",
//!     "fallback_type": "application/json",
//!     "binary_fallback_type": "application/octet-stream",
//!     "extensions": { "json": "application/json" },
//!     "pipe_threads": 4
//! }
//! ```
use std::collections::BTreeMap;
#[cfg(feature = "json")]
use std::io::Read;

use serde::{Deserialize, Serialize};

#[cfg(feature = "json")]
use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransformsConfig {
    /// Charset label used when a content type has no `charset` parameter.
    pub default_charset: Option<String>,
    pub fallback_type: Option<String>,
    pub binary_fallback_type: Option<String>,
    /// File extension to content type.
    pub extensions: BTreeMap<String, String>,
    /// Threads kept to serve [`Transforms::stream`](crate::transforms::Transforms::stream);
    /// 0 spawns a thread per stream. The pool grows while every thread is
    /// busy, so each stream still gets its own producer thread.
    pub pipe_threads: usize,
}

#[cfg(feature = "json")]
impl TransformsConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }
}
