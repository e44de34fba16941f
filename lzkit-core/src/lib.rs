//! # lzkit Core
//!
//! Core components shared by the lzkit crates.
//!
//! - [`error`]: Error types
//! - [`io`]: Byte source/sink traits and adapters
//! - [`alloc`]: Injected scratch allocation with RAII release
//! - [`window`]: Dictionary window for LZ decoding
//! - [`traits`]: Chunked decoder interface
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ L3: CLI                                                 │
//! │     lzkit, lzkit-info                                   │
//! ├─────────────────────────────────────────────────────────┤
//! │ L2: Container                                           │
//! │     13-byte header, streaming compress/decompress      │
//! ├─────────────────────────────────────────────────────────┤
//! │ L1: Codec                                               │
//! │     LZMA range coder, encoder, chunk decoder           │
//! ├─────────────────────────────────────────────────────────┤
//! │ L0: Core (this crate)                                   │
//! │     Source/Sink, ScratchAllocator, Window, errors      │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use lzkit_core::alloc::{LimitedAllocator, Scratch};
//! use lzkit_core::io::{Sink, Source, write_all};
//!
//! let alloc = LimitedAllocator::new(1024);
//! let mut buf = Scratch::new(&alloc, 5).unwrap();
//!
//! let mut input: &[u8] = b"hello";
//! let n = input.read(&mut buf).unwrap();
//!
//! let mut output = Vec::new();
//! write_all(&mut output, &buf[..n]).unwrap();
//! assert_eq!(output, b"hello");
//!
//! drop(buf);
//! assert_eq!(alloc.live(), 0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod alloc;
pub mod error;
pub mod io;
pub mod traits;
pub mod window;

// Re-exports for convenience
pub use alloc::{LimitedAllocator, Scratch, ScratchAllocator, SystemAllocator};
pub use error::{CodecError, ErrorKind, Result};
pub use io::{IoSink, IoSource, NullSink, Sink, Source};
pub use traits::{ChunkDecoder, ChunkProgress, DecodeStatus, FinishMode};
pub use window::Window;
