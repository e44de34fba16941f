//! # lzkit container
//!
//! The `.lzma` container: a 13-byte header followed by a raw LZMA payload.
//!
//! ```text
//! offset 0  : 5 bytes  codec properties (byte0 < 225, bytes1..4 dict size LE)
//! offset 5  : 8 bytes  uncompressed size (u64 LE, u64::MAX = unknown)
//! offset 13 : N bytes  LZMA payload (optional end marker)
//! ```
//!
//! ## Operations
//!
//! - [`compress`]: buffer the whole input, encode it once, write header then
//!   payload
//! - [`decompress`]: drive the chunk decoder through fixed-size staging
//!   buffers, checking the output against the declared size
//! - [`inspect`]: read and describe the header only
//!
//! Every buffer comes from a caller-supplied
//! [`ScratchAllocator`](lzkit_core::ScratchAllocator) and is returned to it
//! whichever way the operation ends.
//!
//! ## Example
//!
//! ```rust
//! use lzkit_container::{Config, compress, decompress, inspect};
//! use lzkit_core::SystemAllocator;
//!
//! let data = b"Hello, container! Hello, container!";
//!
//! let mut container = Vec::new();
//! compress(&mut &data[..], &mut container, &Config::DEFAULT, &SystemAllocator).unwrap();
//!
//! let info = inspect(&mut &container[..]).unwrap();
//! assert_eq!(info.original_size, Some(data.len() as u64));
//!
//! let mut restored = Vec::new();
//! decompress(&mut &container[..], &mut restored, &Config::DEFAULT, &SystemAllocator).unwrap();
//! assert_eq!(restored, data);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod compress;
pub mod config;
pub mod decompress;
pub mod header;
pub mod info;

// Re-exports
pub use compress::{CompressSummary, compress};
pub use config::{Config, DEFAULT_BUFFER_SIZE};
pub use decompress::{DecodeSession, DecompressSummary, decompress};
pub use header::{
    ContainerHeader, HEADER_SIZE, LcLpPb, UNKNOWN_SIZE, decode_dictionary_size, decode_header,
    decode_lc_lp_pb, encode_header,
};
pub use info::{ContainerInfo, inspect};
