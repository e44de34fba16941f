//! Dictionary window (sliding history) for LZ-style decoding.
//!
//! The window keeps the most recent `capacity` output bytes so that matches
//! can refer back into them. Unlike a power-of-two ring, the capacity here
//! is whatever the container header asks for (clamped by the caller), and
//! the storage is a [`Scratch`] buffer taken from the session's allocator.

use crate::alloc::{Scratch, ScratchAllocator};
use crate::error::{CodecError, Result};

/// Smallest window the decoder ever allocates.
pub const MIN_WINDOW: usize = 4096;

/// A sliding history window backed by scratch storage.
#[derive(Debug)]
pub struct Window<'a> {
    buffer: Scratch<'a>,
    /// Next write position.
    position: usize,
    /// Bytes currently held (up to capacity).
    size: usize,
    /// Bytes ever written.
    total: u64,
}

impl<'a> Window<'a> {
    /// Allocate a window holding up to `capacity` bytes.
    pub fn new(allocator: &'a dyn ScratchAllocator, capacity: usize) -> Result<Self> {
        let buffer = Scratch::new(allocator, capacity.max(1))?;
        Ok(Self {
            buffer,
            position: 0,
            size: 0,
            total: 0,
        })
    }

    /// Maximum number of bytes the window holds.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Number of bytes currently available for back-references.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Check if nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Total bytes written since creation.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Append a byte.
    pub fn push(&mut self, byte: u8) {
        self.buffer[self.position] = byte;
        self.position += 1;
        if self.position == self.buffer.len() {
            self.position = 0;
        }
        if self.size < self.buffer.len() {
            self.size += 1;
        }
        self.total += 1;
    }

    /// Byte at `distance` back from the write position (1 is the newest).
    pub fn read_at_distance(&self, distance: usize) -> Result<u8> {
        if distance == 0 || distance > self.size {
            return Err(self.bad_distance(distance));
        }
        Ok(self.buffer[self.index_back(distance)])
    }

    /// Byte at `distance`, or `default` when the history is too short.
    pub fn peek(&self, distance: usize, default: u8) -> u8 {
        self.read_at_distance(distance).unwrap_or(default)
    }

    /// Check that `distance` refers into the history.
    pub fn check_distance(&self, distance: usize) -> Result<()> {
        if distance == 0 || distance > self.size {
            return Err(self.bad_distance(distance));
        }
        Ok(())
    }

    /// Copy up to `length` bytes from `distance` back, appending them to the
    /// window and to `output`.
    ///
    /// Overlapping copies (length greater than distance) repeat the pattern.
    /// At most `output.len()` bytes are copied. Returns the count.
    pub fn copy_match(&mut self, distance: usize, length: usize, output: &mut [u8]) -> Result<usize> {
        self.check_distance(distance)?;

        let count = length.min(output.len());
        let mut src = self.index_back(distance);
        for slot in output.iter_mut().take(count) {
            let byte = self.buffer[src];
            *slot = byte;
            self.push(byte);
            src += 1;
            if src == self.buffer.len() {
                src = 0;
            }
        }

        Ok(count)
    }

    fn index_back(&self, distance: usize) -> usize {
        if distance <= self.position {
            self.position - distance
        } else {
            self.buffer.len() - (distance - self.position)
        }
    }

    fn bad_distance(&self, distance: usize) -> CodecError {
        CodecError::decode_failure(
            self.total,
            format!(
                "match distance {distance} exceeds history of {} bytes",
                self.size
            ),
        )
    }
}
