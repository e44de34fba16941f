//! Session configuration.

use lzkit_lzma::EncoderPreset;

/// Default size of each staging buffer.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Settings shared by compress and decompress sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Capacity of the input staging buffer.
    pub in_buffer_size: usize,
    /// Capacity of the output staging buffer.
    pub out_buffer_size: usize,
    /// Encoder preset used when compressing.
    pub preset: EncoderPreset,
    /// After the declared size is reached, check whatever follows is a
    /// valid end marker.
    pub verify_end_marker: bool,
}

impl Config {
    /// 4 KiB staging buffers, the default preset, end marker verification on.
    pub const DEFAULT: Self = Self {
        in_buffer_size: DEFAULT_BUFFER_SIZE,
        out_buffer_size: DEFAULT_BUFFER_SIZE,
        preset: EncoderPreset::DEFAULT,
        verify_end_marker: true,
    };

    /// Set both staging buffer sizes.
    pub fn with_buffer_size(self, size: usize) -> Self {
        self.with_in_buffer_size(size).with_out_buffer_size(size)
    }

    /// Set the input staging buffer size. Zero is raised to one.
    pub fn with_in_buffer_size(mut self, size: usize) -> Self {
        self.in_buffer_size = size.max(1);
        self
    }

    /// Set the output staging buffer size. Zero is raised to one.
    pub fn with_out_buffer_size(mut self, size: usize) -> Self {
        self.out_buffer_size = size.max(1);
        self
    }

    /// Set the encoder preset.
    pub fn with_preset(mut self, preset: EncoderPreset) -> Self {
        self.preset = preset;
        self
    }

    /// Set the preset's dictionary size.
    pub fn with_dictionary_size(mut self, dict_size: u32) -> Self {
        self.preset = self.preset.with_dict_size(dict_size);
        self
    }

    /// Enable or disable the end marker in compressed output.
    pub fn with_end_marker(mut self, end_marker: bool) -> Self {
        self.preset = self.preset.with_end_marker(end_marker);
        self
    }

    /// Enable or disable trailing end marker verification.
    pub fn with_verify_end_marker(mut self, verify: bool) -> Self {
        self.verify_end_marker = verify;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::DEFAULT
    }
}
