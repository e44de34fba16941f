//! Streaming compressor.
//!
//! The encoder runs once over the whole input, so the input is drained into
//! a scratch buffer first. The encoder's match-finder tables and the payload
//! come from the same allocator. The header goes out before any payload
//! bytes.

use crate::config::Config;
use crate::header::{HEADER_SIZE, encode_header};
use lzkit_core::alloc::{Scratch, ScratchAllocator};
use lzkit_core::error::{CodecError, Result};
use lzkit_core::io::{Sink, Source, write_all};
use lzkit_lzma::LzmaEncoder;

/// Sizes of a finished compress session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressSummary {
    /// Bytes read from the source.
    pub input_size: u64,
    /// Bytes written to the sink, header included.
    pub output_size: u64,
}

impl CompressSummary {
    /// Output size as a fraction of the input size.
    pub fn ratio(&self) -> f64 {
        if self.input_size == 0 {
            return 0.0;
        }
        self.output_size as f64 / self.input_size as f64
    }
}

/// Read `input` to the end into a scratch buffer.
///
/// The buffer starts at the source's length hint and grows when the source
/// turns out to be longer. Returns the buffer and the number of bytes read.
fn drain<'a>(
    input: &mut dyn Source,
    config: &Config,
    allocator: &'a dyn ScratchAllocator,
) -> Result<(Scratch<'a>, usize)> {
    let initial = match input.len_hint() {
        Some(len) => usize::try_from(len).map_err(|_| CodecError::out_of_memory(usize::MAX))?,
        None => config.in_buffer_size,
    };

    let mut data = Scratch::new(allocator, initial)?;
    let mut staging = Scratch::new(allocator, config.in_buffer_size)?;
    let mut filled = 0;

    loop {
        if filled < data.len() {
            let n = input.read(&mut data[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
            continue;
        }

        // Full: any further bytes mean the hint was short.
        let n = input.read(&mut staging)?;
        if n == 0 {
            break;
        }

        let needed = filled
            .checked_add(n)
            .ok_or_else(|| CodecError::out_of_memory(usize::MAX))?;
        let size = needed.max(filled.saturating_mul(2));
        log::debug!("input longer than expected, growing buffer to {} bytes", size);

        data = data.grow(size, filled)?;
        data[filled..needed].copy_from_slice(&staging[..n]);
        filled = needed;
    }

    Ok((data, filled))
}

/// Compress `input` into a container written to `output`.
pub fn compress(
    input: &mut dyn Source,
    output: &mut dyn Sink,
    config: &Config,
    allocator: &dyn ScratchAllocator,
) -> Result<CompressSummary> {
    let preset = config.preset.normalized();
    log::debug!(
        "compress: level {}, dictionary {} bytes, end marker {}",
        preset.level.level(),
        preset.dict_size,
        preset.end_marker
    );

    let (data, len) = drain(input, config, allocator)?;
    let block = LzmaEncoder::with_preset(preset).encode_in(&data[..len], allocator)?;
    drop(data);

    let header = encode_header(block.properties, len as u64);
    write_all(output, &header)?;
    write_all(output, block.payload())?;
    output.flush()?;

    let summary = CompressSummary {
        input_size: len as u64,
        output_size: (HEADER_SIZE + block.payload().len()) as u64,
    };
    log::debug!(
        "compress: {} -> {} bytes",
        summary.input_size,
        summary.output_size
    );

    Ok(summary)
}
