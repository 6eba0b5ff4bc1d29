//! Content type negotiation and codec registry.
//!
//! A [`Transforms`] owns four independent registries, one per codec kind,
//! keyed by content type with parameters stripped. It also decides which
//! content type applies when none was declared, from the shape of the value
//! or the declared type and from the configured fallback types.
//!
//! Configuration methods take `&mut self` and request-time methods take
//! `&self`: once configured, share it behind an `Arc` and it is read-only.
//!
//! # Example
//! ```
//! use std::sync::Arc;
//! use jbcontent::content::{downcast, value, TextCodec};
//! use jbcontent::transforms::Transforms;
//! use jbcontent::types::TypeDescriptor;
//!
//! let mut transforms = Transforms::default();
//! transforms.put_serializer("text/markdown", Arc::new(TextCodec)).unwrap();
//! transforms.put_deserializer("text/markdown", Arc::new(TextCodec)).unwrap();
//! transforms.put_extension_type("md", "text/markdown").unwrap();
//! let transforms = Arc::new(transforms);
//!
//! let ty = TypeDescriptor::of::<String>();
//! let mut body = vec![];
//! let content_type = transforms
//!     .write(Some("text/markdown"), value("# Title".to_string()), &ty, &mut body)
//!     .unwrap();
//! assert_eq!(content_type, "text/markdown");
//!
//! let read = transforms
//!     .read(Some("text/markdown; charset=utf-8"), Box::new(std::io::Cursor::new(body)), &ty)
//!     .unwrap();
//! assert_eq!(downcast::<String>(read).unwrap(), "# Title");
//! assert_eq!(transforms.extension_type(".MD"), Some("text/markdown"));
//! ```
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::io;
use std::io::prelude::*;
use std::sync::Arc;

use encoding_rs::UTF_8;
use log::{debug, trace, warn};

use crate::config::TransformsConfig;
use crate::content::text::{is_textual, is_textual_type};
use crate::content::{
    Assembler, ByteCallback, ByteSource, CharSource, Deserializer, Disassembler, OctetCodec,
    Serializer, TextCodec, Value,
};
use crate::error::{CodecKind, Error, Result};
use crate::media::{self, MediaCoder, APPLICATION_OCTET_STREAM, TEXT_PLAIN};
use crate::pipe::{PipeReader, Plumber};
use crate::runner::Runner;
use crate::types::{Hierarchy, RawType, TypeDescriptor};

type Registry<C> = HashMap<String, Arc<C>>;

fn key(content_type: &str) -> Result<String> {
    media::strip(content_type)
        .map(str::to_string)
        .ok_or_else(|| Error::config("content type must not be blank"))
}

fn lookup<C: ?Sized>(
    registry: &Registry<C>,
    kind: CodecKind,
    content_type: &str,
) -> Result<Arc<C>> {
    media::strip(content_type)
        .and_then(|key| registry.get(key))
        .cloned()
        .ok_or_else(|| Error::no_codec(kind, content_type))
}

fn insert<C: ?Sized>(
    registry: &mut Registry<C>,
    kind: CodecKind,
    content_type: &str,
    codec: Arc<C>,
) -> Result<()> {
    let key = key(content_type)?;
    debug!("registering {} for {}", kind, &key);
    if registry.insert(key.clone(), codec).is_some() {
        warn!("replaced {} for {}", kind, &key);
    }
    Ok(())
}

fn remove<C: ?Sized>(
    registry: &mut Registry<C>,
    kind: CodecKind,
    content_type: &str,
) -> Result<Option<Arc<C>>> {
    let key = key(content_type)?;
    let removed = registry.remove(&key);
    if removed.is_some() {
        debug!("removed {} for {}", kind, &key);
    }
    Ok(removed)
}

fn normalize_extension(extension: &str) -> String {
    extension.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// Codec registry and content type negotiator.
pub struct Transforms {
    coder: MediaCoder,
    assemblers: Registry<dyn Assembler>,
    disassemblers: Registry<dyn Disassembler>,
    serializers: Registry<dyn Serializer>,
    deserializers: Registry<dyn Deserializer>,
    binary_types: HashSet<RawType>,
    binary_generic_types: HashSet<TypeDescriptor>,
    hierarchy: Hierarchy,
    fallback_type: Option<String>,
    binary_fallback_type: Option<String>,
    extensions: HashMap<String, String>,
    plumber: Plumber,
}

impl Default for Transforms {
    /// A registry with the built-in codecs: [`OctetCodec`] for
    /// `application/octet-stream`, [`TextCodec`] for `text/plain`, and the
    /// `txt` extension.
    fn default() -> Self {
        let mut transforms = Self::empty();
        let octet = Arc::new(OctetCodec);
        let text = Arc::new(TextCodec);
        transforms
            .assemblers
            .insert(APPLICATION_OCTET_STREAM.to_string(), octet.clone());
        transforms
            .disassemblers
            .insert(APPLICATION_OCTET_STREAM.to_string(), octet);
        transforms
            .serializers
            .insert(TEXT_PLAIN.to_string(), text.clone());
        transforms
            .deserializers
            .insert(TEXT_PLAIN.to_string(), text);
        transforms
            .extensions
            .insert("txt".to_string(), TEXT_PLAIN.to_string());
        for raw in [
            RawType::of::<Vec<u8>>(),
            RawType::of::<ByteSource>(),
            RawType::of::<ByteCallback>(),
        ] {
            transforms.binary_types.insert(raw);
        }
        transforms
    }
}

impl Transforms {
    /// A registry without any codec, binary type or extension.
    pub fn empty() -> Self {
        Self {
            coder: MediaCoder::default(),
            assemblers: HashMap::new(),
            disassemblers: HashMap::new(),
            serializers: HashMap::new(),
            deserializers: HashMap::new(),
            binary_types: HashSet::new(),
            binary_generic_types: HashSet::new(),
            hierarchy: Hierarchy::new(),
            fallback_type: None,
            binary_fallback_type: None,
            extensions: HashMap::new(),
            plumber: Plumber::default(),
        }
    }

    /// The built-in registry, configured by `config`.
    pub fn from_config(config: &TransformsConfig) -> Result<Self> {
        let mut transforms = Self::default();
        transforms.apply_config(config)?;
        Ok(transforms)
    }

    /// Apply `config` on top of the codecs registered so far. Extensions can
    /// only point at content types that already have a codec.
    ///
    /// The whole configuration is checked before anything changes: on error
    /// the registry is left as it was.
    pub fn apply_config(&mut self, config: &TransformsConfig) -> Result<()> {
        let coder = match &config.default_charset {
            Some(label) => MediaCoder::with_default_charset(label)?,
            None => self.coder,
        };
        let fallback_type = config.fallback_type.as_deref().map(key).transpose()?;
        let binary_fallback_type = config
            .binary_fallback_type
            .as_deref()
            .map(key)
            .transpose()?;
        let extensions = config
            .extensions
            .iter()
            .map(|(extension, content_type)| self.extension_entry(extension, content_type))
            .collect::<Result<Vec<_>>>()?;
        let runner =
            Runner::new(config.pipe_threads).map_err(|e| Error::Config(e.to_string()))?;

        self.coder = coder;
        if fallback_type.is_some() {
            self.fallback_type = fallback_type;
        }
        if binary_fallback_type.is_some() {
            self.binary_fallback_type = binary_fallback_type;
        }
        self.extensions.extend(extensions);
        self.plumber = Plumber::new(runner);
        debug!("applied configuration {:?}", config);
        Ok(())
    }

    pub fn coder(&self) -> &MediaCoder {
        &self.coder
    }

    pub fn set_coder(&mut self, coder: MediaCoder) {
        self.coder = coder;
    }

    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    /// Declared types, used to match raw binary types by assignability.
    pub fn hierarchy_mut(&mut self) -> &mut Hierarchy {
        &mut self.hierarchy
    }

    pub fn assembler(&self, content_type: &str) -> Result<Arc<dyn Assembler>> {
        lookup(&self.assemblers, CodecKind::Assembler, content_type)
    }

    pub fn disassembler(&self, content_type: &str) -> Result<Arc<dyn Disassembler>> {
        lookup(&self.disassemblers, CodecKind::Disassembler, content_type)
    }

    pub fn serializer(&self, content_type: &str) -> Result<Arc<dyn Serializer>> {
        lookup(&self.serializers, CodecKind::Serializer, content_type)
    }

    pub fn deserializer(&self, content_type: &str) -> Result<Arc<dyn Deserializer>> {
        lookup(&self.deserializers, CodecKind::Deserializer, content_type)
    }

    pub fn put_assembler(&mut self, content_type: &str, codec: Arc<dyn Assembler>) -> Result<()> {
        insert(&mut self.assemblers, CodecKind::Assembler, content_type, codec)
    }

    pub fn put_disassembler(
        &mut self,
        content_type: &str,
        codec: Arc<dyn Disassembler>,
    ) -> Result<()> {
        insert(
            &mut self.disassemblers,
            CodecKind::Disassembler,
            content_type,
            codec,
        )
    }

    pub fn put_serializer(&mut self, content_type: &str, codec: Arc<dyn Serializer>) -> Result<()> {
        insert(&mut self.serializers, CodecKind::Serializer, content_type, codec)
    }

    pub fn put_deserializer(
        &mut self,
        content_type: &str,
        codec: Arc<dyn Deserializer>,
    ) -> Result<()> {
        insert(
            &mut self.deserializers,
            CodecKind::Deserializer,
            content_type,
            codec,
        )
    }

    pub fn remove_assembler(&mut self, content_type: &str) -> Result<Option<Arc<dyn Assembler>>> {
        remove(&mut self.assemblers, CodecKind::Assembler, content_type)
    }

    pub fn remove_disassembler(
        &mut self,
        content_type: &str,
    ) -> Result<Option<Arc<dyn Disassembler>>> {
        remove(&mut self.disassemblers, CodecKind::Disassembler, content_type)
    }

    pub fn remove_serializer(&mut self, content_type: &str) -> Result<Option<Arc<dyn Serializer>>> {
        remove(&mut self.serializers, CodecKind::Serializer, content_type)
    }

    pub fn remove_deserializer(
        &mut self,
        content_type: &str,
    ) -> Result<Option<Arc<dyn Deserializer>>> {
        remove(&mut self.deserializers, CodecKind::Deserializer, content_type)
    }

    /// Remove every codec for `content_type`, and the extensions mapped to it.
    pub fn remove_content_type(&mut self, content_type: &str) -> Result<()> {
        let key = key(content_type)?;
        self.remove_assembler(&key)?;
        self.remove_disassembler(&key)?;
        self.remove_serializer(&key)?;
        self.remove_deserializer(&key)?;
        self.extensions.retain(|_, mapped| *mapped != key);
        Ok(())
    }

    /// Route values of type `ty` to byte codecs. Raw types match any type
    /// assignable to them; generic types only match exactly.
    pub fn add_binary(&mut self, ty: TypeDescriptor) {
        debug!("adding binary type {}", &ty);
        if ty.is_generic() {
            self.binary_generic_types.insert(ty);
        } else {
            self.binary_types.insert(ty.raw_type().clone());
        }
    }

    /// True if `from` is `to` or a declared subtype of it.
    pub fn is_assignable(&self, to: &RawType, from: &RawType) -> bool {
        self.hierarchy.is_assignable(to, from)
    }

    pub fn is_binary(&self, ty: &TypeDescriptor) -> bool {
        if ty.is_generic() {
            self.binary_generic_types.contains(ty)
        } else {
            self.binary_types
                .iter()
                .any(|binary| self.is_assignable(binary, ty.raw_type()))
        }
    }

    pub fn fallback_type(&self) -> Option<&str> {
        self.fallback_type.as_deref()
    }

    pub fn binary_fallback_type(&self) -> Option<&str> {
        self.binary_fallback_type.as_deref()
    }

    /// Text content type used when nothing else applies.
    pub fn set_fallback_type(&mut self, content_type: Option<&str>) -> Result<()> {
        self.fallback_type = content_type.map(key).transpose()?;
        debug!("fallback type set to {:?}", &self.fallback_type);
        Ok(())
    }

    /// Byte content type used when nothing else applies.
    pub fn set_binary_fallback_type(&mut self, content_type: Option<&str>) -> Result<()> {
        self.binary_fallback_type = content_type.map(key).transpose()?;
        debug!("binary fallback type set to {:?}", &self.binary_fallback_type);
        Ok(())
    }

    /// Map a file extension to a content type that has an assembler or a
    /// serializer.
    pub fn put_extension_type(&mut self, extension: &str, content_type: &str) -> Result<()> {
        let (extension, key) = self.extension_entry(extension, content_type)?;
        debug!("mapping extension {} to {}", &extension, &key);
        self.extensions.insert(extension, key);
        Ok(())
    }

    fn extension_entry(&self, extension: &str, content_type: &str) -> Result<(String, String)> {
        let extension = normalize_extension(extension);
        if extension.is_empty() {
            return Err(Error::config("extension must not be blank"));
        }
        let key = key(content_type)?;
        if !self.assemblers.contains_key(&key) && !self.serializers.contains_key(&key) {
            return Err(Error::Config(format!(
                "no assembler or serializer associated to {}",
                key
            )));
        }
        Ok((extension, key))
    }

    pub fn extension_type(&self, extension: &str) -> Option<&str> {
        self.extensions
            .get(&normalize_extension(extension))
            .map(String::as_str)
    }

    fn binary_fallback(&self, ty: &TypeDescriptor) -> Result<String> {
        self.binary_fallback_type.clone().ok_or_else(|| {
            Error::Config(format!(
                "no content type given for binary type {} and no binary fallback type configured",
                ty
            ))
        })
    }

    fn text_fallback(&self, ty: &TypeDescriptor) -> Result<String> {
        self.fallback_type.clone().ok_or_else(|| {
            Error::Config(format!(
                "no content type given for {} and no fallback type configured",
                ty
            ))
        })
    }

    /// Content type to write `value` with as bytes.
    pub fn assembler_type(
        &self,
        content_type: Option<&str>,
        value: &(dyn Any + Send),
        ty: &TypeDescriptor,
    ) -> Result<String> {
        if let Some(content_type) = content_type {
            return Ok(content_type.to_string());
        }
        let negotiated = if value.is::<Vec<u8>>()
            || value.is::<ByteSource>()
            || value.is::<ByteCallback>()
        {
            APPLICATION_OCTET_STREAM.to_string()
        } else {
            self.binary_fallback(ty)?
        };
        trace!("assembler type for {}: {}", ty, &negotiated);
        Ok(negotiated)
    }

    /// Content type to read a value of type `ty` with from bytes.
    pub fn disassembler_type(
        &self,
        content_type: Option<&str>,
        ty: &TypeDescriptor,
    ) -> Result<String> {
        if let Some(content_type) = content_type {
            return Ok(content_type.to_string());
        }
        let negotiated = if ty.is::<Vec<u8>>() || ty.is::<ByteSource>() {
            APPLICATION_OCTET_STREAM.to_string()
        } else {
            self.binary_fallback(ty)?
        };
        trace!("disassembler type for {}: {}", ty, &negotiated);
        Ok(negotiated)
    }

    /// Content type to write `value` with as text.
    pub fn serializer_type(
        &self,
        content_type: Option<&str>,
        value: &(dyn Any + Send),
        ty: &TypeDescriptor,
    ) -> Result<String> {
        if let Some(content_type) = content_type {
            return Ok(content_type.to_string());
        }
        let negotiated = if is_textual(value) {
            TEXT_PLAIN.to_string()
        } else {
            self.text_fallback(ty)?
        };
        trace!("serializer type for {}: {}", ty, &negotiated);
        Ok(negotiated)
    }

    /// Content type to read a value of type `ty` with from text.
    pub fn deserializer_type(
        &self,
        content_type: Option<&str>,
        ty: &TypeDescriptor,
    ) -> Result<String> {
        if let Some(content_type) = content_type {
            return Ok(content_type.to_string());
        }
        let negotiated = if is_textual_type(ty) {
            TEXT_PLAIN.to_string()
        } else {
            self.text_fallback(ty)?
        };
        trace!("deserializer type for {}: {}", ty, &negotiated);
        Ok(negotiated)
    }

    /// Read a body declared as `content_type` into a value of type `ty`.
    ///
    /// Base64 transfer encoding is undone first; text bodies are then
    /// decoded with the charset of the content type.
    pub fn read(
        &self,
        content_type: Option<&str>,
        source: ByteSource,
        ty: &TypeDescriptor,
    ) -> Result<Value> {
        let source = media::decode(source, content_type);
        if self.is_binary(ty) {
            let content_type = self.disassembler_type(content_type, ty)?;
            self.disassembler(&content_type)?.disassemble(source, ty)
        } else {
            let content_type = self.deserializer_type(content_type, ty)?;
            let deserializer = self.deserializer(&content_type)?;
            let chars: CharSource = self.coder.reader(source, Some(content_type.as_str()))?;
            deserializer.deserialize(chars, ty)
        }
    }

    /// Write `value` into `sink`, returning the content type it was written
    /// as. Text is encoded with the charset of the content type.
    pub fn write(
        &self,
        content_type: Option<&str>,
        value: Value,
        ty: &TypeDescriptor,
        sink: &mut dyn Write,
    ) -> Result<String> {
        if self.is_binary(ty) {
            let content_type = self.assembler_type(content_type, &*value, ty)?;
            self.assembler(&content_type)?.assemble(value, ty, sink)?;
            return Ok(content_type);
        }
        let content_type = self.serializer_type(content_type, &*value, ty)?;
        let serializer = self.serializer(&content_type)?;
        let charset = self.coder.charset(Some(content_type.as_str()))?;
        if charset == UTF_8 {
            serializer.serialize(value, ty, sink)?;
        } else {
            let mut utf8 = vec![];
            serializer.serialize(value, ty, &mut utf8)?;
            let text = String::from_utf8(utf8)
                .map_err(|e| Error::Io(io::Error::new(io::ErrorKind::InvalidData, e)))?;
            let (bytes, unmappable) = media::encode_text(charset, &text)?;
            if unmappable {
                warn!("replaced characters not representable in {}", charset.name());
            }
            sink.write_all(&bytes)?;
        }
        Ok(content_type)
    }

    /// Serialize `value` on another thread and return the content type with
    /// the read end of the text it produces.
    pub fn stream(
        &self,
        content_type: Option<&str>,
        value: Value,
        ty: TypeDescriptor,
    ) -> Result<(String, PipeReader)> {
        let content_type = self.serializer_type(content_type, &*value, &ty)?;
        let serializer = self.serializer(&content_type)?;
        let reader = self.plumber.connect(move |writer| {
            serializer.serialize(value, &ty, writer)?;
            Ok(())
        })?;
        Ok((content_type, reader))
    }
}
