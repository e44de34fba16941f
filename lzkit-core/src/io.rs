//! Byte-oriented source and sink collaborators.
//!
//! Container sessions read and write through these two traits rather than
//! `std::io` directly, which keeps the session code independent of files and
//! lets tests inject short writes and read errors.

use crate::error::{CodecError, Result};
use std::io::{self, Read, Seek, SeekFrom, Write};

/// A byte-oriented input.
pub trait Source {
    /// Read up to `buf.len()` bytes. `Ok(0)` means end of input.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Number of bytes left in the source, when it can tell cheaply.
    fn len_hint(&mut self) -> Option<u64> {
        None
    }
}

/// A byte-oriented output.
pub trait Sink {
    /// Write `buf`, returning how many bytes were accepted.
    ///
    /// Accepting fewer bytes than offered is treated as a short write by
    /// every caller in this workspace.
    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Flush buffered output.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Read from `source` until `buf` is full or the source ends.
///
/// Returns the number of bytes read.
pub fn read_full(source: &mut dyn Source, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = source.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Offer `buf` to `sink` in one call, failing on a short write.
pub fn write_all(sink: &mut dyn Sink, buf: &[u8]) -> Result<()> {
    if buf.is_empty() {
        return Ok(());
    }
    let accepted = sink.write(buf)?;
    if accepted != buf.len() {
        return Err(CodecError::short_write(buf.len(), accepted));
    }
    Ok(())
}

/// [`Source`] over any [`Read`] implementation.
#[derive(Debug)]
pub struct IoSource<R> {
    inner: R,
    remaining: Option<u64>,
}

impl<R: Read> IoSource<R> {
    /// Wrap a reader whose length is unknown.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            remaining: None,
        }
    }

    /// Wrap a reader that is known to hold `len` bytes.
    pub fn with_len(inner: R, len: u64) -> Self {
        Self {
            inner,
            remaining: Some(len),
        }
    }

    /// Consume the adapter, returning the reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read + Seek> IoSource<R> {
    /// Wrap a seekable reader, measuring its length by seeking to the end
    /// and back to the current position.
    pub fn seekable(mut inner: R) -> Result<Self> {
        let start = inner.stream_position().map_err(CodecError::ReadFailure)?;
        let end = inner
            .seek(SeekFrom::End(0))
            .map_err(CodecError::ReadFailure)?;
        inner
            .seek(SeekFrom::Start(start))
            .map_err(CodecError::ReadFailure)?;
        Ok(Self::with_len(inner, end.saturating_sub(start)))
    }
}

impl<R: Read> Source for IoSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        loop {
            match self.inner.read(buf) {
                Ok(n) => {
                    if let Some(remaining) = self.remaining.as_mut() {
                        *remaining = remaining.saturating_sub(n as u64);
                    }
                    return Ok(n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(CodecError::ReadFailure(e)),
            }
        }
    }

    fn len_hint(&mut self) -> Option<u64> {
        self.remaining
    }
}

impl Source for &[u8] {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = buf.len().min(self.len());
        let (head, tail) = self.split_at(n);
        buf[..n].copy_from_slice(head);
        *self = tail;
        Ok(n)
    }

    fn len_hint(&mut self) -> Option<u64> {
        Some(self.len() as u64)
    }
}

/// [`Sink`] over any [`Write`] implementation.
///
/// Each call hands the whole buffer to [`Write::write_all`], so a writer
/// that stops accepting data surfaces as [`CodecError::WriteFailure`].
#[derive(Debug)]
pub struct IoSink<W> {
    inner: W,
}

impl<W: Write> IoSink<W> {
    /// Wrap a writer.
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Consume the adapter, returning the writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Sink for IoSink<W> {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.inner.write_all(buf).map_err(CodecError::WriteFailure)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush().map_err(CodecError::WriteFailure)
    }
}

impl Sink for Vec<u8> {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.extend_from_slice(buf);
        Ok(buf.len())
    }
}

/// [`Sink`] that discards everything and counts the bytes it was given.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink {
    written: u64,
}

impl NullSink {
    /// Create a new discarding sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total bytes accepted so far.
    pub fn written(&self) -> u64 {
        self.written
    }
}

impl Sink for NullSink {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.written += buf.len() as u64;
        Ok(buf.len())
    }
}
