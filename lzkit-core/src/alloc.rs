//! Injected scratch allocation.
//!
//! Sessions and decoders never allocate their working buffers directly. They
//! ask a [`ScratchAllocator`] for zero-filled storage and hold it in a
//! [`Scratch`] guard, which hands the storage back when dropped. A failing
//! allocator therefore surfaces as [`CodecError::OutOfMemory`] and every
//! buffer taken so far is returned, whichever path the session leaves by.

use crate::error::{CodecError, Result};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};

/// A source of zero-filled scratch buffers.
pub trait ScratchAllocator {
    /// Allocate `size` zero bytes, or `None` if the request is refused.
    fn alloc(&self, size: usize) -> Option<Vec<u8>>;

    /// Return a buffer obtained from [`ScratchAllocator::alloc`].
    fn free(&self, buffer: Vec<u8>);
}

/// Allocator backed by the global heap.
///
/// Allocation failure is reported instead of aborting the process.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemAllocator;

impl ScratchAllocator for SystemAllocator {
    fn alloc(&self, size: usize) -> Option<Vec<u8>> {
        let mut buffer = Vec::new();
        buffer.try_reserve_exact(size).ok()?;
        buffer.resize(size, 0);
        Some(buffer)
    }

    fn free(&self, buffer: Vec<u8>) {
        drop(buffer);
    }
}

/// Allocator with a byte budget and live-buffer accounting.
///
/// Requests that would push the bytes currently handed out above the limit
/// are refused. The counters are atomic, so one instance can be shared by
/// sessions on several threads.
#[derive(Debug, Default)]
pub struct LimitedAllocator {
    limit: usize,
    in_use: AtomicUsize,
    peak: AtomicUsize,
    live: AtomicUsize,
    refused: AtomicUsize,
}

impl LimitedAllocator {
    /// Create an allocator that hands out at most `limit` bytes at a time.
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    /// The configured byte budget.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Bytes currently handed out.
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Acquire)
    }

    /// Highest value [`LimitedAllocator::in_use`] has reached.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Acquire)
    }

    /// Buffers currently handed out and not yet freed.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Number of refused requests.
    pub fn refused(&self) -> usize {
        self.refused.load(Ordering::Acquire)
    }
}

impl ScratchAllocator for LimitedAllocator {
    fn alloc(&self, size: usize) -> Option<Vec<u8>> {
        let reserved = self
            .in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current
                    .checked_add(size)
                    .filter(|&total| total <= self.limit)
            });

        let previous = match reserved {
            Ok(previous) => previous,
            Err(_) => {
                self.refused.fetch_add(1, Ordering::AcqRel);
                return None;
            }
        };

        match SystemAllocator.alloc(size) {
            Some(buffer) => {
                self.live.fetch_add(1, Ordering::AcqRel);
                self.peak.fetch_max(previous + size, Ordering::AcqRel);
                Some(buffer)
            }
            None => {
                self.in_use.fetch_sub(size, Ordering::AcqRel);
                self.refused.fetch_add(1, Ordering::AcqRel);
                None
            }
        }
    }

    fn free(&self, buffer: Vec<u8>) {
        self.in_use.fetch_sub(buffer.len(), Ordering::AcqRel);
        self.live.fetch_sub(1, Ordering::AcqRel);
    }
}

/// A buffer borrowed from a [`ScratchAllocator`].
///
/// Derefs to a fixed-length byte slice. The storage goes back to the
/// allocator when the guard is dropped.
pub struct Scratch<'a> {
    buffer: Vec<u8>,
    allocator: &'a dyn ScratchAllocator,
}

impl<'a> Scratch<'a> {
    /// Take `size` zero bytes from `allocator`.
    pub fn new(allocator: &'a dyn ScratchAllocator, size: usize) -> Result<Self> {
        let buffer = allocator
            .alloc(size)
            .ok_or_else(|| CodecError::out_of_memory(size))?;

        if buffer.len() != size {
            allocator.free(buffer);
            return Err(CodecError::out_of_memory(size));
        }

        Ok(Self { buffer, allocator })
    }

    /// Take a larger buffer from the same allocator and copy the first
    /// `keep` bytes across. The old storage is released on success.
    pub fn grow(self, size: usize, keep: usize) -> Result<Self> {
        let mut larger = Scratch::new(self.allocator, size)?;
        let keep = keep.min(self.len()).min(size);
        larger[..keep].copy_from_slice(&self[..keep]);
        Ok(larger)
    }

    /// The allocator this buffer came from.
    pub fn allocator(&self) -> &'a dyn ScratchAllocator {
        self.allocator
    }
}

impl Deref for Scratch<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.buffer
    }
}

impl DerefMut for Scratch<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.buffer
    }
}

impl Drop for Scratch<'_> {
    fn drop(&mut self) {
        let buffer = std::mem::take(&mut self.buffer);
        self.allocator.free(buffer);
    }
}

impl fmt::Debug for Scratch<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scratch")
            .field("len", &self.buffer.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_allocator_zero_filled() {
        let scratch = Scratch::new(&SystemAllocator, 64).unwrap();
        assert_eq!(scratch.len(), 64);
        assert!(scratch.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_limited_allocator_budget() {
        let alloc = LimitedAllocator::new(100);

        let a = Scratch::new(&alloc, 60).unwrap();
        assert_eq!(alloc.in_use(), 60);
        assert_eq!(alloc.live(), 1);

        let err = Scratch::new(&alloc, 60).unwrap_err();
        assert!(matches!(err, CodecError::OutOfMemory { requested: 60 }));
        assert_eq!(alloc.refused(), 1);

        drop(a);
        assert_eq!(alloc.in_use(), 0);
        assert_eq!(alloc.live(), 0);

        let _b = Scratch::new(&alloc, 100).unwrap();
        assert_eq!(alloc.peak(), 100);
    }

    #[test]
    fn test_grow_preserves_prefix_and_releases_old() {
        let alloc = LimitedAllocator::new(1 << 20);
        let mut small = Scratch::new(&alloc, 4).unwrap();
        small.copy_from_slice(b"abcd");

        let large = small.grow(16, 3).unwrap();
        assert_eq!(&large[..3], b"abc");
        assert_eq!(&large[3..], &[0u8; 13]);
        assert_eq!(alloc.live(), 1);
        assert_eq!(alloc.in_use(), 16);
        assert_eq!(alloc.peak(), 20);
    }

    #[test]
    fn test_grow_failure_releases_everything() {
        let alloc = LimitedAllocator::new(10);
        let small = Scratch::new(&alloc, 8).unwrap();
        assert!(small.grow(64, 8).is_err());
        assert_eq!(alloc.live(), 0);
        assert_eq!(alloc.in_use(), 0);
    }
}
