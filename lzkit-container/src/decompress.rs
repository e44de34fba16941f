//! Streaming decompressor.
//!
//! A [`DecodeSession`] owns two fixed-size staging buffers and drives a
//! [`ChunkDecoder`] through them: refill the input buffer when it runs dry,
//! hand the decoder as much output room as the declared size still allows,
//! and write whatever comes out straight to the sink.

use crate::config::Config;
use crate::header::{ContainerHeader, HEADER_SIZE};
use lzkit_core::alloc::{Scratch, ScratchAllocator};
use lzkit_core::error::{CodecError, Result};
use lzkit_core::io::{Sink, Source, write_all};
use lzkit_core::traits::{ChunkDecoder, ChunkProgress, DecodeStatus, FinishMode};
use lzkit_lzma::LzmaChunkDecoder;

/// Sizes of a finished decompress session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecompressSummary {
    /// Container bytes used, header included.
    pub input_size: u64,
    /// Bytes written to the sink.
    pub output_size: u64,
    /// Whether the payload ended with an end marker.
    pub end_marker: bool,
}

/// Buffers and counters for one decompression.
#[derive(Debug)]
pub struct DecodeSession<'a, D> {
    decoder: D,
    in_buf: Scratch<'a>,
    out_buf: Scratch<'a>,
    /// Start of unconsumed bytes in `in_buf`.
    in_pos: usize,
    /// End of valid bytes in `in_buf`.
    in_len: usize,
    /// The source returned zero bytes.
    exhausted: bool,
    /// Bytes still to produce, `None` when decoding to the end marker.
    remaining: Option<u64>,
    consumed: u64,
    produced: u64,
    verify_end_marker: bool,
}

impl<'a, D: ChunkDecoder> DecodeSession<'a, D> {
    /// Take the staging buffers from `allocator` and wrap `decoder`.
    pub fn new(
        decoder: D,
        declared_size: Option<u64>,
        config: &Config,
        allocator: &'a dyn ScratchAllocator,
    ) -> Result<Self> {
        let in_buf = Scratch::new(allocator, config.in_buffer_size.max(1))?;
        let out_buf = Scratch::new(allocator, config.out_buffer_size.max(1))?;

        Ok(Self {
            decoder,
            in_buf,
            out_buf,
            in_pos: 0,
            in_len: 0,
            exhausted: false,
            remaining: declared_size,
            consumed: 0,
            produced: 0,
            verify_end_marker: config.verify_end_marker,
        })
    }

    /// Bytes still expected, `None` if the size is unknown.
    pub fn remaining(&self) -> Option<u64> {
        self.remaining
    }

    /// Bytes written so far.
    pub fn produced(&self) -> u64 {
        self.produced
    }

    /// Give back the decoder. The staging buffers are released.
    pub fn into_decoder(self) -> D {
        self.decoder
    }

    fn refill(&mut self, input: &mut dyn Source) -> Result<()> {
        if self.in_pos < self.in_len || self.exhausted {
            return Ok(());
        }

        let n = input.read(&mut self.in_buf)?;
        self.in_pos = 0;
        self.in_len = n;
        if n == 0 {
            self.exhausted = true;
        }
        Ok(())
    }

    /// Output room for the next call, and whether that room ends the
    /// stream.
    fn budget(&self) -> (usize, FinishMode) {
        let capacity = self.out_buf.len();
        match self.remaining {
            Some(remaining) if remaining <= capacity as u64 => (remaining as usize, FinishMode::End),
            _ => (capacity, FinishMode::Any),
        }
    }

    fn step(&mut self, budget: usize, finish: FinishMode) -> Result<ChunkProgress> {
        let available = self.in_len - self.in_pos;
        let progress = self.decoder.decode_chunk(
            &self.in_buf[self.in_pos..self.in_len],
            &mut self.out_buf[..budget],
            finish,
        )?;

        if progress.consumed > available || progress.produced > budget {
            return Err(CodecError::corrupt(
                self.produced,
                "decoder reported more bytes than it was given",
            ));
        }

        self.in_pos += progress.consumed;
        self.consumed += progress.consumed as u64;
        Ok(progress)
    }

    /// Decode everything from `input` into `output`.
    pub fn run(&mut self, input: &mut dyn Source, output: &mut dyn Sink) -> Result<DecompressSummary> {
        let mut status = DecodeStatus::NotFinished;

        while self.remaining != Some(0) {
            self.refill(input)?;
            let (budget, finish) = self.budget();
            let progress = self.step(budget, finish)?;
            status = progress.status;

            if progress.produced > 0 {
                write_all(output, &self.out_buf[..progress.produced])?;
                self.produced += progress.produced as u64;
                if let Some(remaining) = self.remaining.as_mut() {
                    *remaining -= progress.produced as u64;
                }
            }

            match self.remaining {
                Some(0) => break,
                None if status == DecodeStatus::FinishedWithMark => break,
                Some(remaining) if status == DecodeStatus::FinishedWithMark => {
                    return Err(CodecError::corrupt(
                        self.produced,
                        format!("end marker with {} bytes still declared", remaining),
                    ));
                }
                _ => {}
            }

            if progress.is_stall() {
                if self.exhausted {
                    return Err(CodecError::truncated(self.remaining));
                }
                return Err(CodecError::corrupt(self.produced, "decoder made no progress"));
            }
        }

        let end_marker = if status.is_final() || !self.verify_end_marker {
            status == DecodeStatus::FinishedWithMark
        } else {
            self.check_trailer(input)?
        };

        output.flush()?;

        Ok(DecompressSummary {
            input_size: self.consumed,
            output_size: self.produced,
            end_marker,
        })
    }

    /// Look past the declared size for an end marker.
    ///
    /// Returns whether one was found. Missing input means no marker, which
    /// is accepted. Any other symbol is a decode failure.
    fn check_trailer(&mut self, input: &mut dyn Source) -> Result<bool> {
        loop {
            self.refill(input)?;
            let progress = self.step(0, FinishMode::End)?;

            match progress.status {
                DecodeStatus::FinishedWithMark => return Ok(true),
                DecodeStatus::MaybeFinishedWithoutMark => return Ok(false),
                DecodeStatus::NeedsMoreInput if self.exhausted => {
                    log::debug!("no end marker after {} bytes", self.produced);
                    return Ok(false);
                }
                DecodeStatus::NeedsMoreInput if progress.is_stall() && self.in_pos < self.in_len => {
                    return Err(CodecError::corrupt(self.produced, "decoder made no progress"));
                }
                DecodeStatus::NeedsMoreInput => {}
                DecodeStatus::NotFinished => {
                    return Err(CodecError::decode_failure(
                        self.produced,
                        "data continues past the declared size",
                    ));
                }
            }
        }
    }
}

/// Decompress the container read from `input` into `output`.
pub fn decompress(
    input: &mut dyn Source,
    output: &mut dyn Sink,
    config: &Config,
    allocator: &dyn ScratchAllocator,
) -> Result<DecompressSummary> {
    let header = ContainerHeader::read_from(input)?;
    let properties = header.lzma_properties()?;
    let dictionary_size = header.dictionary_size();
    let declared_size = header.declared_size();

    log::debug!(
        "decompress: declared size {:?}, dictionary {} bytes, buffers {}/{}",
        declared_size,
        dictionary_size,
        config.in_buffer_size,
        config.out_buffer_size
    );

    let decoder = LzmaChunkDecoder::new(properties, dictionary_size, declared_size, allocator)?;
    let mut session = DecodeSession::new(decoder, declared_size, config, allocator)?;
    let mut summary = session.run(input, output)?;
    summary.input_size += HEADER_SIZE as u64;

    log::debug!(
        "decompress: {} -> {} bytes, end marker {}",
        summary.input_size,
        summary.output_size,
        summary.end_marker
    );

    Ok(summary)
}
