//! # lzkit LZMA
//!
//! LZMA (Lempel-Ziv-Markov chain Algorithm) codec engine for lzkit.
//!
//! ## Features
//!
//! - **Pure Rust** range coder and probability models
//! - **One-shot encoder** with a greedy hash-chain match finder
//! - **Resumable chunk decoder** that works on caller-owned buffers of any
//!   size, down to a single byte of input and output per call
//!
//! ## Usage
//!
//! ```rust
//! use lzkit_core::{ChunkDecoder, FinishMode, SystemAllocator};
//! use lzkit_lzma::{EncoderPreset, LzmaChunkDecoder, LzmaEncoder, LzmaProperties};
//!
//! let data = b"Hello, World! Hello, World!";
//! let block = LzmaEncoder::with_preset(EncoderPreset::DEFAULT)
//!     .encode_all(data)
//!     .unwrap();
//!
//! let props = LzmaProperties::from_byte(block.properties[0]).unwrap();
//! let mut decoder =
//!     LzmaChunkDecoder::new(props, 1 << 16, Some(data.len() as u64), &SystemAllocator).unwrap();
//!
//! let mut out = vec![0u8; data.len()];
//! let progress = decoder
//!     .decode_chunk(&block.payload, &mut out, FinishMode::End)
//!     .unwrap();
//! assert_eq!(progress.produced, data.len());
//! assert!(progress.status.is_final());
//! assert_eq!(&out[..], &data[..]);
//! ```
//!
//! ## Stream layout
//!
//! The payload is a single LZMA range-coded stream. It starts with a zero
//! byte and four bytes of initial code, and optionally ends with an end
//! marker: a match whose distance is `0xFFFF_FFFF`. Framing (properties,
//! dictionary size, uncompressed size) is the container's job.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod decoder;
pub mod encoder;
pub mod model;
pub mod range_coder;

// Re-exports
pub use decoder::{LzmaChunkDecoder, REQUIRED_INPUT_MAX, window_capacity};
pub use encoder::{EncodedBlock, LzmaEncoder, ScratchBlock};
pub use model::{LzmaModel, LzmaProperties, State};
pub use range_coder::{RangeDecoder, RangeEncoder};

/// Smallest dictionary size the codec works with.
pub const DICT_SIZE_MIN: u32 = 4096;

/// LZMA compression level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LzmaLevel(u8);

impl LzmaLevel {
    /// Fastest compression (level 0).
    pub const FAST: Self = Self(0);
    /// Default compression (level 6).
    pub const DEFAULT: Self = Self(6);
    /// Best compression (level 9).
    pub const BEST: Self = Self(9);

    /// Create a new compression level.
    pub fn new(level: u8) -> Self {
        Self(level.min(9))
    }

    /// Get the level value.
    pub fn level(&self) -> u8 {
        self.0
    }
}

impl Default for LzmaLevel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// The encoder preset: level, dictionary size, end marker and lc/lp/pb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderPreset {
    /// Match-finder effort.
    pub level: LzmaLevel,
    /// Dictionary size written to the properties block.
    pub dict_size: u32,
    /// Whether to terminate the payload with an end marker.
    pub end_marker: bool,
    /// Literal/position context bits.
    pub properties: LzmaProperties,
}

impl EncoderPreset {
    /// Level 9, 64 KiB dictionary, end marker, lc=3 lp=0 pb=2.
    pub const DEFAULT: Self = Self {
        level: LzmaLevel::BEST,
        dict_size: 1 << 16,
        end_marker: true,
        properties: LzmaProperties {
            lc: model::LC_DEFAULT,
            lp: model::LP_DEFAULT,
            pb: model::PB_DEFAULT,
        },
    };

    /// Set the compression level.
    pub fn with_level(mut self, level: LzmaLevel) -> Self {
        self.level = level;
        self
    }

    /// Set the dictionary size. [`normalized`](Self::normalized) raises it to at least 4096.
    pub fn with_dict_size(mut self, dict_size: u32) -> Self {
        self.dict_size = dict_size;
        self
    }

    /// Enable or disable the end marker.
    pub fn with_end_marker(mut self, end_marker: bool) -> Self {
        self.end_marker = end_marker;
        self
    }

    /// Set lc/lp/pb.
    pub fn with_properties(mut self, properties: LzmaProperties) -> Self {
        self.properties = properties;
        self
    }

    /// The preset with every field brought into range.
    pub fn normalized(self) -> Self {
        let properties = if self.properties.is_valid() {
            self.properties
        } else {
            LzmaProperties::default()
        };

        Self {
            level: LzmaLevel::new(self.level.level()),
            dict_size: self.dict_size.max(DICT_SIZE_MIN),
            end_marker: self.end_marker,
            properties,
        }
    }

    /// The 5-byte properties block: lc/lp/pb byte, then dictionary size LE.
    pub fn properties_block(&self) -> [u8; 5] {
        let dict = self.dict_size.max(DICT_SIZE_MIN).to_le_bytes();
        [
            self.properties.to_byte(),
            dict[0],
            dict[1],
            dict[2],
            dict[3],
        ]
    }
}

impl Default for EncoderPreset {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level() {
        assert_eq!(LzmaLevel::FAST.level(), 0);
        assert_eq!(LzmaLevel::DEFAULT.level(), 6);
        assert_eq!(LzmaLevel::BEST.level(), 9);
        assert_eq!(LzmaLevel::new(100).level(), 9);
    }

    #[test]
    fn test_default_preset() {
        let preset = EncoderPreset::default();
        assert_eq!(preset.level, LzmaLevel::BEST);
        assert_eq!(preset.dict_size, 65536);
        assert!(preset.end_marker);
        assert_eq!(preset.properties, LzmaProperties::new(3, 0, 2));
        assert_eq!(preset.properties_block(), [0x5D, 0x00, 0x00, 0x01, 0x00]);
    }

    #[test]
    fn test_preset_builders_and_normalize() {
        let preset = EncoderPreset::DEFAULT
            .with_dict_size(10)
            .with_end_marker(false)
            .with_properties(LzmaProperties::new(9, 0, 0))
            .normalized();

        assert_eq!(preset.dict_size, DICT_SIZE_MIN);
        assert!(!preset.end_marker);
        assert_eq!(preset.properties, LzmaProperties::default());
    }

    #[test]
    fn test_properties_block_little_endian() {
        let preset = EncoderPreset::DEFAULT.with_dict_size(0x0102_0304);
        assert_eq!(preset.properties_block()[1..], [0x04, 0x03, 0x02, 0x01]);
    }
}
