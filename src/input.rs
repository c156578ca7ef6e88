//! Pull-based buffered input over a `std::io::Read` byte source.

use crate::error::{Result, WpilogError};
use std::io::{ErrorKind, Read};

/// Default number of bytes pulled from the source per refill.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Buffer bookkeeping shared by the sync and async input streams; only the
/// source read differs between them.
#[derive(Debug)]
pub(crate) struct ChunkBuffer {
    buffer: Vec<u8>,
    start: usize,
    filled: usize,
    chunk_size: usize,
    exhausted: bool,
}

impl ChunkBuffer {
    pub(crate) fn new(chunk_size: usize) -> Self {
        Self {
            buffer: Vec::new(),
            start: 0,
            filled: 0,
            chunk_size: chunk_size.max(1),
            exhausted: false,
        }
    }

    fn available(&self) -> usize {
        self.buffer.len() - self.start
    }

    /// Consumes `len` bytes if that many are buffered.
    ///
    /// `Ok(None)` means a refill is needed; once the source has ended a short
    /// buffer is [`WpilogError::StreamExhausted`] and nothing is consumed.
    pub(crate) fn take(&mut self, len: usize) -> Result<Option<Vec<u8>>> {
        if self.available() >= len {
            let bytes = self.buffer[self.start..self.start + len].to_vec();
            self.start += len;
            return Ok(Some(bytes));
        }
        if self.exhausted {
            return Err(WpilogError::StreamExhausted {
                requested: len,
                read: self.available(),
            });
        }
        Ok(None)
    }

    /// Drops consumed bytes and returns a `chunk_size` region for the next read.
    pub(crate) fn spare(&mut self) -> &mut [u8] {
        if self.start > 0 {
            self.buffer.drain(..self.start);
            self.start = 0;
        }
        self.filled = self.buffer.len();
        self.buffer.resize(self.filled + self.chunk_size, 0);
        &mut self.buffer[self.filled..]
    }

    /// Keeps the first `read` bytes of the region handed out by `spare`.
    pub(crate) fn commit(&mut self, read: usize) {
        self.buffer.truncate(self.filled + read);
        if read == 0 {
            self.exhausted = true;
        }
    }

    /// Forgets the region handed out by `spare` after a failed read.
    pub(crate) fn discard(&mut self) {
        self.buffer.truncate(self.filled);
    }
}

/// Buffers bytes from an underlying source and hands them out in exact-size reads.
///
/// Leftover bytes from a refill stay buffered for the next call, so record
/// boundaries never need to line up with source chunk boundaries.
pub struct InputStream<R> {
    source: R,
    chunks: ChunkBuffer,
}

impl<R: Read> InputStream<R> {
    pub fn new(source: R) -> Self {
        Self::with_chunk_size(source, DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(source: R, chunk_size: usize) -> Self {
        Self {
            source,
            chunks: ChunkBuffer::new(chunk_size),
        }
    }

    /// Returns exactly `len` bytes, pulling more chunks from the source as needed.
    ///
    /// Fails with [`WpilogError::StreamExhausted`] if the source ends first; in
    /// that case nothing is consumed and the error carries how many bytes were
    /// available.
    pub fn read_exactly(&mut self, len: usize) -> Result<Vec<u8>> {
        loop {
            if let Some(bytes) = self.chunks.take(len)? {
                return Ok(bytes);
            }
            self.fill()?;
        }
    }

    fn fill(&mut self) -> Result<()> {
        let spare = self.chunks.spare();
        let read = loop {
            match self.source.read(spare) {
                Ok(n) => break n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.chunks.discard();
                    return Err(e.into());
                }
            }
        };
        self.chunks.commit(read);
        Ok(())
    }
}
