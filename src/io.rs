//! I/O utilities.
use std::io;
use std::io::prelude::*;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// A byte stream.
pub type ByteSource = Box<dyn Read + Send>;

/// A character stream: UTF-8 text, whatever the charset on the wire was.
pub type CharSource = Box<dyn BufRead + Send>;

/// Default number of raw bytes encoded per chunk by [`Base64Encoder`].
pub const BASE64_CHUNK_SIZE: usize = 12 * 1024;

/// Estimate of how many bytes can be read without blocking.
pub trait Available {
    fn available(&self) -> usize;
}

impl Available for &[u8] {
    fn available(&self) -> usize {
        self.len()
    }
}

impl<T: AsRef<[u8]>> Available for io::Cursor<T> {
    fn available(&self) -> usize {
        let len = self.get_ref().as_ref().len() as u64;
        len.saturating_sub(self.position()) as usize
    }
}

impl Available for io::Empty {
    fn available(&self) -> usize {
        0
    }
}

/// Base64-encodes the inner stream lazily, one chunk at a time.
///
/// Each refill reads up to one chunk of raw bytes, encodes it in memory and
/// serves it before touching the inner stream again, so memory use does not
/// depend on the length of the stream. Chunks are a multiple of 3 bytes, so
/// padding can only appear at the very end of the output.
pub struct Base64Encoder<R> {
    inner: Option<R>,
    chunk_size: usize,
    raw: Vec<u8>,
    encoded: Vec<u8>,
    position: usize,
    eof: bool,
}

impl<R> Base64Encoder<R> {
    pub fn new(inner: R) -> Self {
        Self::with_chunk_size(inner, BASE64_CHUNK_SIZE)
    }

    /// `chunk_size` is rounded up to the next multiple of 3.
    pub fn with_chunk_size(inner: R, chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1).div_ceil(3) * 3;
        Self {
            inner: Some(inner),
            chunk_size,
            raw: vec![],
            encoded: vec![],
            position: 0,
            eof: false,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Encoded bytes produced but not read yet.
    pub fn pending(&self) -> usize {
        self.encoded.len() - self.position
    }

    /// Drop the buffers and the inner stream; later reads return 0.
    pub fn close(&mut self) {
        self.inner = None;
        self.raw = vec![];
        self.encoded = vec![];
        self.position = 0;
        self.eof = true;
    }

    pub fn into_inner(self) -> Option<R> {
        self.inner
    }
}

impl<R: Read> Base64Encoder<R> {
    // Fill a whole chunk unless the inner stream ends first; a short chunk in
    // the middle of the stream would put padding in the middle of the output.
    fn refill(&mut self) -> io::Result<()> {
        let inner = match self.inner.as_mut() {
            Some(inner) => inner,
            None => {
                self.eof = true;
                return Ok(());
            }
        };
        self.raw.resize(self.chunk_size, 0);
        let mut filled = 0;
        while filled < self.chunk_size {
            match inner.read(&mut self.raw[filled..]) {
                Ok(0) => {
                    self.eof = true;
                    break;
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        self.encoded.clear();
        self.position = 0;
        if filled > 0 {
            let mut encoded = String::with_capacity(filled.div_ceil(3) * 4);
            STANDARD.encode_string(&self.raw[..filled], &mut encoded);
            self.encoded = encoded.into_bytes();
        }
        Ok(())
    }
}

impl<R: Read> Read for Base64Encoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.pending() == 0 {
            if self.eof {
                return Ok(0);
            }
            self.refill()?;
        }
        let n = self.pending().min(buf.len());
        buf[..n].copy_from_slice(&self.encoded[self.position..self.position + n]);
        self.position += n;
        Ok(n)
    }
}

impl<R: Available> Available for Base64Encoder<R> {
    fn available(&self) -> usize {
        let inner = self.inner.as_ref().map(|r| r.available()).unwrap_or(0);
        inner * 4 / 3 + self.pending()
    }
}
