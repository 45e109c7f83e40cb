//! In-memory byte storage for archive sessions.
//!
//! [`ByteSink`] is the append-only buffer the archiver writes into, and
//! [`ByteSource`] is the sequential cursor the unarchiver reads from. Neither
//! touches files or streams; callers move the bytes wherever they need them.

use crate::error::{GraphCodeError, Result};

/// An append-only growable buffer that tracks the current offset.
#[derive(Debug, Default, Clone)]
pub struct ByteSink {
    buffer: Vec<u8>,
}

impl ByteSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Appends a complete buffer.
    /// Returns the offset where the writing started.
    pub fn append(&mut self, bytes: &[u8]) -> usize {
        let start_offset = self.buffer.len();
        self.buffer.extend_from_slice(bytes);
        start_offset
    }

    /// Appends a single byte.
    pub fn push(&mut self, byte: u8) {
        self.buffer.push(byte);
    }

    /// Returns the current write position.
    pub fn current_offset(&self) -> usize {
        self.buffer.len()
    }

    /// Returns the bytes written so far.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Consumes the sink and returns its buffer.
    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }
}

/// A sequential reader over a borrowed byte slice.
#[derive(Debug, Clone)]
pub struct ByteSource<'a> {
    data: &'a [u8],
    cursor: usize,
}

impl<'a> ByteSource<'a> {
    /// Creates a source positioned at the first byte.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, cursor: 0 }
    }

    /// Reads exactly `n` bytes and advances the cursor.
    ///
    /// # Errors
    /// Returns `GraphCodeError::Format` if fewer than `n` bytes remain.
    pub fn read(&mut self, n: usize) -> Result<&'a [u8]> {
        let available = self.remaining();
        if n > available {
            return Err(GraphCodeError::truncated(n, self.cursor, available));
        }
        let start = self.cursor;
        self.cursor += n;
        Ok(&self.data[start..self.cursor])
    }

    /// Reads a fixed-size array.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.read(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    /// Reads one byte.
    pub fn read_byte(&mut self) -> Result<u8> {
        let [byte] = self.read_array::<1>()?;
        Ok(byte)
    }

    /// Returns the current cursor position.
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Returns the number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.cursor
    }

    /// Returns true when every byte has been consumed.
    pub fn is_at_end(&self) -> bool {
        self.cursor >= self.data.len()
    }
}
