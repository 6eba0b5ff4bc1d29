//! Push-to-pull adapter.
//!
//! [`Plumber::connect`] runs a producer that writes into a [`PipeWriter`] on
//! another thread and hands back the [`PipeReader`] end right away. The two
//! ends are joined by a bounded channel, so a producer that writes faster
//! than the consumer reads blocks until the consumer catches up.
use std::error::Error as StdError;
use std::io;
use std::io::prelude::*;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread;

use log::debug;

use crate::error::Result;
use crate::runner::Runner;

/// Error type returned by pipe producers.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Writes are buffered up to this size before they are handed to the reader.
pub const PIPE_CHUNK_SIZE: usize = 8 * 1024;

/// Number of chunks in flight before the producer blocks.
const PIPE_CAPACITY: usize = 4;

type Outcome = thread::Result<std::result::Result<(), BoxError>>;

/// Runs pipe producers on a [`Runner`].
///
/// # Example
/// ```
/// use std::io::{Read, Write};
/// use jbcontent::pipe::Plumber;
///
/// let plumber = Plumber::default();
/// let mut reader = plumber
///     .connect(|writer| {
///         writer.write_all(b"content")?;
///         Ok(())
///     })
///     .unwrap();
///
/// let mut out = String::new();
/// reader.read_to_string(&mut out).unwrap();
/// assert_eq!(out, "content");
/// ```
#[derive(Default)]
pub struct Plumber {
    runner: Runner,
}

impl Plumber {
    pub fn new(runner: Runner) -> Self {
        Self { runner }
    }

    /// Run `producer` on another thread and return the read end of its pipe.
    ///
    /// If the producer fails, the reader returns an error wrapping that
    /// failure once it has read everything written before it. If the
    /// producer panics, the panic resumes on the reading thread.
    pub fn connect<F>(&self, producer: F) -> Result<PipeReader>
    where
        F: FnOnce(&mut PipeWriter) -> std::result::Result<(), BoxError> + Send + 'static,
    {
        let (chunks_tx, chunks_rx) = mpsc::sync_channel(PIPE_CAPACITY);
        let (done_tx, done_rx) = mpsc::sync_channel::<Outcome>(1);
        self.runner
            .run(move || {
                let mut writer = PipeWriter {
                    sender: chunks_tx,
                    buffer: Vec::with_capacity(PIPE_CHUNK_SIZE),
                };
                let outcome: Outcome =
                    panic::catch_unwind(AssertUnwindSafe(|| produce(producer, &mut writer)));
                if let Ok(Err(e)) = &outcome {
                    debug!("pipe producer failed: {}", e);
                }
                // The reader must see end-of-data before the outcome.
                drop(writer);
                let _ = done_tx.send(outcome);
            })
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(PipeReader {
            chunks: chunks_rx,
            done: Some(done_rx),
            chunk: vec![],
            position: 0,
        })
    }
}

fn produce<F>(producer: F, writer: &mut PipeWriter) -> std::result::Result<(), BoxError>
where
    F: FnOnce(&mut PipeWriter) -> std::result::Result<(), BoxError>,
{
    producer(writer)?;
    writer.flush()?;
    Ok(())
}

/// Write end of a pipe, handed to the producer.
pub struct PipeWriter {
    sender: SyncSender<Vec<u8>>,
    buffer: Vec<u8>,
}

impl PipeWriter {
    fn send_buffer(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let chunk = mem::replace(&mut self.buffer, Vec::with_capacity(PIPE_CHUNK_SIZE));
        self.sender
            .send(chunk)
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "pipe reader closed"))
    }
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = buf.len().min(PIPE_CHUNK_SIZE - self.buffer.len());
        self.buffer.extend_from_slice(&buf[..n]);
        if self.buffer.len() >= PIPE_CHUNK_SIZE {
            self.send_buffer()?;
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.send_buffer()
    }
}

/// Read end of a pipe. Dropping it unblocks the producer, whose next write
/// fails with [`io::ErrorKind::BrokenPipe`].
pub struct PipeReader {
    chunks: Receiver<Vec<u8>>,
    done: Option<Receiver<Outcome>>,
    chunk: Vec<u8>,
    position: usize,
}

impl PipeReader {
    // Called once the producer has hung up.
    fn finish(&mut self) -> io::Result<()> {
        let done = match self.done.take() {
            Some(done) => done,
            None => return Ok(()),
        };
        match done.recv() {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(e))) => Err(io::Error::new(io::ErrorKind::Other, e)),
            Ok(Err(payload)) => panic::resume_unwind(payload),
            Err(_) => panic!("pipe producer was dropped before it completed"),
        }
    }
}

impl BufRead for PipeReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        while self.position >= self.chunk.len() {
            if self.done.is_none() {
                return Ok(&[]);
            }
            match self.chunks.recv() {
                Ok(chunk) => {
                    self.chunk = chunk;
                    self.position = 0;
                }
                Err(_) => {
                    self.chunk.clear();
                    self.position = 0;
                    self.finish()?;
                }
            }
        }
        Ok(&self.chunk[self.position..])
    }

    fn consume(&mut self, amt: usize) {
        self.position = (self.position + amt).min(self.chunk.len());
    }
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::mpsc::channel;

    #[test]
    fn test_content_then_eof() {
        let mut reader = Plumber::default()
            .connect(|writer| {
                write!(writer, "content")?;
                Ok(())
            })
            .unwrap();
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "content");
        assert_eq!(reader.read(&mut [0u8; 4]).unwrap(), 0);
    }

    #[test]
    fn test_failure_before_any_write() {
        let mut reader = Plumber::default()
            .connect(|_| Err("producer failed".into()))
            .unwrap();
        let err = reader.read(&mut [0u8; 16]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
        assert_eq!(err.to_string(), "producer failed");
        assert_eq!(
            err.into_inner().unwrap().to_string(),
            "producer failed"
        );
    }

    #[test]
    fn test_failure_after_writes() {
        let mut reader = Plumber::default()
            .connect(|writer| {
                writer.write_all(b"partial")?;
                writer.flush()?;
                Err("then failed".into())
            })
            .unwrap();
        let mut out = vec![];
        let err = reader.read_to_end(&mut out).unwrap_err();
        assert_eq!(out, b"partial");
        assert_eq!(err.to_string(), "then failed");
    }

    #[test]
    fn test_large_payload_in_order() {
        let data: Vec<u8> = (0..(PIPE_CHUNK_SIZE * PIPE_CAPACITY * 3 + 5))
            .map(|i| (i % 251) as u8)
            .collect();
        let expected = data.clone();
        let mut reader = Plumber::new(Runner::new(2).unwrap())
            .connect(move |writer| {
                for part in data.chunks(1000) {
                    writer.write_all(part)?;
                }
                Ok(())
            })
            .unwrap();
        let mut out = vec![];
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, expected);
    }

    #[test]
    fn test_dropping_reader_unblocks_producer() {
        let (tx, rx) = channel();
        let reader = Plumber::default()
            .connect(move |writer| {
                let result = loop {
                    if let Err(e) = writer.write_all(&[0u8; PIPE_CHUNK_SIZE]) {
                        break e;
                    }
                };
                tx.send(result.kind()).unwrap();
                Ok(())
            })
            .unwrap();
        drop(reader);
        assert_eq!(rx.recv().unwrap(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    #[should_panic(expected = "producer panicked")]
    fn test_panic_resumes_on_reader() {
        let mut reader = Plumber::default()
            .connect(|_| panic!("producer panicked"))
            .unwrap();
        let _ = reader.read(&mut [0u8; 1]);
    }
}
