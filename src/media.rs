//! Content type parsing, charset selection and stream draining.
use std::borrow::Cow;
use std::io::prelude::*;
use std::io::{self, BufReader};

use base64::engine::general_purpose::{GeneralPurpose, STANDARD};
use base64::read::DecoderReader;
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};
use encoding_rs_io::DecodeReaderBytesBuilder;
use log::trace;

use crate::error::{Error, Result};
use crate::io::{Base64Encoder, ByteSource, CharSource};

pub const APPLICATION_OCTET_STREAM: &str = "application/octet-stream";
pub const TEXT_PLAIN: &str = "text/plain";
pub const APPLICATION_JSON: &str = "application/json";

const READ_BUFFER_SIZE: usize = 8 * 1024;

static BASE64: GeneralPurpose = STANDARD;

/// Remove any `;parameter=...` suffix and surrounding whitespace.
/// Returns `None` if nothing is left.
///
/// ```
/// use jbcontent::media::strip;
///
/// assert_eq!(strip(" text/html; charset=UTF-8"), Some("text/html"));
/// assert_eq!(strip(" ; charset=UTF-8"), None);
/// ```
pub fn strip(content_type: &str) -> Option<&str> {
    let media_type = match content_type.split_once(';') {
        Some((media_type, _)) => media_type,
        None => content_type,
    };
    let media_type = media_type.trim();
    if media_type.is_empty() {
        None
    } else {
        Some(media_type)
    }
}

// Content-Type: text/html; charset=UTF-8
// Content-Type: text/plain; base64; charset="latin1"
fn parameters(content_type: &str) -> impl Iterator<Item = (&str, Option<&str>)> {
    content_type.split(';').skip(1).filter_map(|part| {
        let part = part.trim();
        if part.is_empty() {
            return None;
        }
        match part.split_once('=') {
            Some((key, value)) => Some((key.trim(), Some(value.trim().trim_matches('"')))),
            None => Some((part, None)),
        }
    })
}

/// True if the content type carries a `base64` transfer marker among its
/// parameters, either as a bare token or as a parameter value.
pub fn is_base64(content_type: &str) -> bool {
    parameters(content_type).any(|(key, value)| {
        key.eq_ignore_ascii_case("base64")
            || value.is_some_and(|v| v.eq_ignore_ascii_case("base64"))
    })
}

/// Wrap `source` in a Base64 decoder if the content type asks for it.
pub fn decode(source: ByteSource, content_type: Option<&str>) -> ByteSource {
    match content_type {
        Some(content_type) if is_base64(content_type) => {
            trace!("base64 decoding body of {}", content_type);
            Box::new(DecoderReader::new(source, &BASE64))
        }
        _ => source,
    }
}

/// Base64-encode `source` lazily, see [`Base64Encoder`].
pub fn encode<R: Read>(source: R) -> Base64Encoder<R> {
    Base64Encoder::new(source)
}

/// Drain `source` into memory, then drop it.
pub fn read_bytes<R: Read>(mut source: R) -> Result<Vec<u8>> {
    let mut buffer = [0u8; READ_BUFFER_SIZE];
    let mut out = vec![];
    loop {
        match source.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => out.extend_from_slice(&buffer[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(out)
}

/// Drain a character stream into a string, then drop it.
pub fn read_string<R: Read>(source: R) -> Result<String> {
    let bytes = read_bytes(source)?;
    String::from_utf8(bytes)
        .map_err(|e| Error::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
}

/// Charset selection and decoding, relative to a default charset.
#[derive(Debug, Clone, Copy)]
pub struct MediaCoder {
    default_charset: &'static Encoding,
}

impl Default for MediaCoder {
    fn default() -> Self {
        Self {
            default_charset: UTF_8,
        }
    }
}

impl MediaCoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `label` (like `"ISO-8859-1"`) when a content type has no charset.
    pub fn with_default_charset(label: &str) -> Result<Self> {
        Ok(Self {
            default_charset: lookup(label)?,
        })
    }

    pub fn default_charset(&self) -> &'static Encoding {
        self.default_charset
    }

    /// The charset named by the `charset` parameter of `content_type`, or the
    /// default charset if there is no content type or no such parameter.
    pub fn charset(&self, content_type: Option<&str>) -> Result<&'static Encoding> {
        let content_type = match content_type {
            Some(content_type) => content_type,
            None => return Ok(self.default_charset),
        };
        let label = parameters(content_type)
            .find(|(key, _)| key.eq_ignore_ascii_case("charset"))
            .map(|(_, value)| value.unwrap_or(""));
        match label {
            Some(label) => lookup(label),
            None => Ok(self.default_charset),
        }
    }

    /// Decode `source` as text in the charset selected by `content_type`.
    pub fn reader(&self, source: ByteSource, content_type: Option<&str>) -> Result<CharSource> {
        let charset = self.charset(content_type)?;
        trace!("reading body as {}", charset.name());
        let decoder = DecodeReaderBytesBuilder::new()
            .encoding(Some(charset))
            .build(source);
        Ok(Box::new(BufReader::new(decoder)))
    }
}

/// Encode `text` in `charset`. Characters the charset cannot represent are
/// written as numeric character references, and the returned flag is set.
/// Fails with [`Error::Charset`] for charsets that cannot be written.
pub fn encode_text<'a>(
    charset: &'static Encoding,
    text: &'a str,
) -> Result<(Cow<'a, [u8]>, bool)> {
    if charset == UTF_16LE || charset == UTF_16BE {
        let mut bytes = Vec::with_capacity(text.len() * 2);
        for unit in text.encode_utf16() {
            if charset == UTF_16LE {
                bytes.extend_from_slice(&unit.to_le_bytes());
            } else {
                bytes.extend_from_slice(&unit.to_be_bytes());
            }
        }
        return Ok((Cow::Owned(bytes), false));
    }
    // encoding_rs only writes UTF-8 for these.
    if charset.output_encoding() != charset {
        return Err(Error::Charset(charset.name().to_string()));
    }
    let (bytes, _, unmappable) = charset.encode(text);
    Ok((bytes, unmappable))
}

fn lookup(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| Error::Charset(label.to_string()))
}

#[cfg(test)]
mod test {
    use super::*;
    use base64::Engine;

    fn source(bytes: &[u8]) -> ByteSource {
        Box::new(io::Cursor::new(bytes.to_vec()))
    }

    #[test]
    fn test_encode_text() {
        let (bytes, unmappable) = encode_text(UTF_16LE, "hi").unwrap();
        assert_eq!(&bytes[..], &[104, 0, 105, 0]);
        assert!(!unmappable);
        let (bytes, _) = encode_text(UTF_16BE, "\u{e9}\u{1f600}").unwrap();
        assert_eq!(&bytes[..], &[0x00, 0xe9, 0xd8, 0x3d, 0xde, 0x00]);
        let (bytes, unmappable) = encode_text(encoding_rs::WINDOWS_1252, "\u{e9}\u{3b1}").unwrap();
        assert_eq!(&bytes[..], b"\xe9&#945;");
        assert!(unmappable);
        assert!(matches!(
            encode_text(encoding_rs::REPLACEMENT, "x"),
            Err(Error::Charset(_))
        ));
    }

    #[test]
    fn test_utf16_round_trip() {
        let coder = MediaCoder::default();
        for content_type in ["text/plain; charset=utf-16le", "text/plain; charset=UTF-16BE"] {
            let charset = coder.charset(Some(content_type)).unwrap();
            let (bytes, _) = encode_text(charset, "caf\u{e9} \u{1f600}").unwrap();
            let mut s = String::new();
            coder
                .reader(source(&bytes), Some(content_type))
                .unwrap()
                .read_to_string(&mut s)
                .unwrap();
            assert_eq!(s, "caf\u{e9} \u{1f600}");
        }
    }

    #[test]
    fn test_strip() {
        assert_eq!(strip("application/json"), Some("application/json"));
        assert_eq!(strip("  application/json ;charset=utf-8;q=1"), Some("application/json"));
        assert_eq!(strip(""), None);
        assert_eq!(strip("   "), None);
        assert_eq!(strip(";base64"), None);
    }

    #[test]
    fn test_charset() {
        let coder = MediaCoder::new();
        assert_eq!(coder.charset(None).unwrap(), UTF_8);
        assert_eq!(coder.charset(Some("text/plain")).unwrap(), UTF_8);
        assert_eq!(
            coder.charset(Some("text/plain;CHARSET = Shift_JIS ; q=0.5")).unwrap(),
            encoding_rs::SHIFT_JIS
        );
        assert_eq!(
            coder.charset(Some("text/plain; base64; charset=\"UTF-16LE\"")).unwrap(),
            encoding_rs::UTF_16LE
        );
        assert!(matches!(
            coder.charset(Some("text/plain; charset=bogus-charset")),
            Err(Error::Charset(_))
        ));
        assert!(matches!(
            coder.charset(Some("text/plain; charset=")),
            Err(Error::Charset(_))
        ));
    }

    #[test]
    fn test_default_charset() {
        let coder = MediaCoder::with_default_charset("iso-8859-2").unwrap();
        assert_eq!(coder.charset(None).unwrap(), encoding_rs::ISO_8859_2);
        assert!(MediaCoder::with_default_charset("nope").is_err());
    }

    #[test]
    fn test_reader() {
        let coder = MediaCoder::new();
        let text = coder
            .reader(source("h\u{e9}llo".as_bytes()), Some("text/plain; charset=UTF-8"))
            .unwrap();
        assert_eq!(read_string(text).unwrap(), "h\u{e9}llo");

        let text = coder
            .reader(source(&[b'h', 0xe9]), Some("text/plain; charset=windows-1252"))
            .unwrap();
        assert_eq!(read_string(text).unwrap(), "h\u{e9}");

        let text = coder.reader(source(b"plain"), None).unwrap();
        assert_eq!(read_string(text).unwrap(), "plain");

        assert!(coder
            .reader(source(b""), Some("text/plain; charset=bogus-charset"))
            .is_err());
    }

    #[test]
    fn test_read_bytes_large() {
        let data: Vec<u8> = (0..(READ_BUFFER_SIZE * 3 + 17)).map(|i| i as u8).collect();
        assert_eq!(read_bytes(&data[..]).unwrap(), data);
    }

    #[test]
    fn test_read_string_invalid_utf8() {
        assert!(matches!(read_string(&[0xffu8, 0xfe][..]), Err(Error::Io(_))));
    }

    #[test]
    fn test_is_base64() {
        assert!(is_base64("application/octet-stream;base64"));
        assert!(is_base64("text/plain; charset=utf-8; BASE64 ;q=1"));
        assert!(is_base64("text/plain; encoding=base64"));
        assert!(!is_base64("text/plain"));
        assert!(!is_base64("application/base64"));
        assert!(!is_base64("text/plain; charset=base64x"));
    }

    #[test]
    fn test_decode() {
        let encoded = STANDARD.encode(b"hello world");
        let decoded = decode(source(encoded.as_bytes()), Some("text/plain; base64"));
        assert_eq!(read_bytes(decoded).unwrap(), b"hello world");

        let untouched = decode(source(encoded.as_bytes()), Some("text/plain"));
        assert_eq!(read_bytes(untouched).unwrap(), encoded.as_bytes());

        let untouched = decode(source(b"raw"), None);
        assert_eq!(read_bytes(untouched).unwrap(), b"raw");
    }

    #[test]
    fn test_encode_then_decode_boundaries() {
        let chunk = crate::io::BASE64_CHUNK_SIZE;
        for len in [0, 1, chunk - 1, chunk, chunk + 1, 2 * chunk + 2] {
            let data: Vec<u8> = (0..len).map(|i| (i * 31) as u8).collect();
            let encoded: ByteSource = Box::new(encode(io::Cursor::new(data.clone())));
            let decoded = decode(encoded, Some("application/octet-stream; base64"));
            assert_eq!(read_bytes(decoded).unwrap(), data, "length {}", len);
        }
    }
}
