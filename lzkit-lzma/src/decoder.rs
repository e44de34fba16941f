//! LZMA chunk decoder.
//!
//! [`LzmaChunkDecoder`] decodes a range-coded LZMA payload in pieces. The
//! caller offers whatever input and output space it has, and the decoder
//! returns how much of each it used. Between calls it keeps:
//!
//! - the range coder registers and all probability tables,
//! - the dictionary window,
//! - up to [`REQUIRED_INPUT_MAX`] bytes of input that were not yet enough
//!   for a whole symbol,
//! - the unwritten tail of a match that did not fit in the output.
//!
//! A symbol is never half-applied. When fewer than [`REQUIRED_INPUT_MAX`]
//! bytes are at hand the decoder first decodes the symbol without touching
//! the probabilities, and only commits once it knows the symbol fits.

use crate::model::{
    DIST_ALIGN_BITS, END_MARKER_DISTANCE, END_POS_MODEL_INDEX, LEN_HIGH_BITS, LEN_LOW_BITS,
    LEN_MID_BITS, LengthModel, LzmaModel, LzmaProperties, MATCH_LEN_MIN, State, len_state,
    special_offset,
};
use crate::range_coder::{INIT_BYTES, RangeDecoder, RangeState, Step};
use crate::DICT_SIZE_MIN;
use lzkit_core::alloc::ScratchAllocator;
use lzkit_core::error::{CodecError, Result};
use lzkit_core::traits::{ChunkDecoder, ChunkProgress, DecodeStatus, FinishMode};
use lzkit_core::window::Window;

/// Most input bytes a single symbol (plus the trailing normalization) can
/// occupy.
pub const REQUIRED_INPUT_MAX: usize = 20;

/// Window capacity for a stream: the dictionary size, but no more than the
/// declared output size, and never below 4096 bytes.
pub fn window_capacity(dict_size: u32, declared_size: Option<u64>) -> usize {
    let dict = dict_size.max(DICT_SIZE_MIN) as u64;
    let capacity = match declared_size {
        Some(size) => dict.min(size),
        None => dict,
    };
    capacity.max(DICT_SIZE_MIN as u64) as usize
}

/// One decoded packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Symbol {
    Literal(u8),
    Match { len: u32, dist: u32 },
    ShortRep,
    Rep { index: usize, len: u32 },
    EndMarker,
}

/// Decode a length.
fn decode_length(
    rc: &mut RangeDecoder<'_>,
    len_model: &mut LengthModel,
    pos_state: usize,
) -> Step<u32> {
    if rc.decode_bit(&mut len_model.choice)? == 0 {
        // Low length (2-9)
        let len = rc.decode_bit_tree(&mut len_model.low[pos_state], LEN_LOW_BITS)?;
        Ok(len + MATCH_LEN_MIN as u32)
    } else if rc.decode_bit(&mut len_model.choice2)? == 0 {
        // Mid length (10-17)
        let len = rc.decode_bit_tree(&mut len_model.mid[pos_state], LEN_MID_BITS)?;
        Ok(len + MATCH_LEN_MIN as u32 + (1 << LEN_LOW_BITS))
    } else {
        // High length (18-273)
        let len = rc.decode_bit_tree(&mut len_model.high, LEN_HIGH_BITS)?;
        Ok(len + MATCH_LEN_MIN as u32 + (1 << LEN_LOW_BITS) + (1 << LEN_MID_BITS))
    }
}

/// Resumable LZMA decoder over caller-supplied buffers.
#[derive(Debug)]
pub struct LzmaChunkDecoder<'a> {
    /// LZMA model.
    model: LzmaModel,
    /// Dictionary window.
    window: Window<'a>,
    /// Range coder registers, once the five init bytes have arrived.
    range: Option<RangeState>,
    /// Input carried over from the previous call.
    pending: [u8; REQUIRED_INPUT_MAX],
    pending_len: usize,
    /// Current state.
    state: State,
    /// Rep distances (zero-based).
    rep: [u32; 4],
    /// Bytes of the current match still to be written.
    match_remaining: usize,
    /// End marker decoded.
    finished: bool,
}

impl<'a> LzmaChunkDecoder<'a> {
    /// Create a decoder.
    ///
    /// The window is taken from `allocator`; its size comes from
    /// [`window_capacity`].
    pub fn new(
        props: LzmaProperties,
        dict_size: u32,
        declared_size: Option<u64>,
        allocator: &'a dyn ScratchAllocator,
    ) -> Result<Self> {
        if !props.is_valid() {
            return Err(CodecError::not_a_container(props.to_byte()));
        }

        let window = Window::new(allocator, window_capacity(dict_size, declared_size))?;

        Ok(Self {
            model: LzmaModel::new(props),
            window,
            range: None,
            pending: [0; REQUIRED_INPUT_MAX],
            pending_len: 0,
            state: State::new(),
            rep: [0; 4],
            match_remaining: 0,
            finished: false,
        })
    }

    /// Capacity of the dictionary window.
    pub fn window_size(&self) -> usize {
        self.window.capacity()
    }

    /// Check if the end marker has been decoded.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Input bytes held back from earlier calls.
    pub fn pending_input(&self) -> usize {
        self.pending_len
    }

    fn error(&self, message: impl Into<String>) -> CodecError {
        CodecError::decode_failure(self.window.total(), message)
    }

    /// Decode a literal byte.
    fn read_literal(&mut self, rc: &mut RangeDecoder<'_>) -> Step<u8> {
        let prev_byte = self.window.peek(1, 0);
        let lit_state = self.model.props.literal_state(self.window.total(), prev_byte);
        let probs = &mut self.model.literal.probs[lit_state];

        if self.state.is_literal() {
            return Ok(rc.decode_bit_tree(probs, 8)? as u8);
        }

        let mut match_byte = self.window.peek(self.rep[0] as usize + 1, 0) as usize;
        let mut symbol = 1usize;

        while symbol < 0x100 {
            let match_bit = (match_byte >> 7) & 1;
            match_byte <<= 1;

            let bit = rc.decode_bit(&mut probs[0x100 + (match_bit << 8) + symbol])? as usize;
            symbol = (symbol << 1) | bit;

            if bit != match_bit {
                // Mismatch, continue without match context
                while symbol < 0x100 {
                    symbol = (symbol << 1) | rc.decode_bit(&mut probs[symbol])? as usize;
                }
                break;
            }
        }

        Ok((symbol - 0x100) as u8)
    }

    /// Decode a zero-based distance.
    fn read_distance(&mut self, rc: &mut RangeDecoder<'_>, len: u32) -> Step<u32> {
        let distance = &mut self.model.distance;
        let slot = rc.decode_bit_tree(&mut distance.slot[len_state(len)], 6)?;

        if slot < 4 {
            return Ok(slot);
        }

        let num_direct_bits = (slot >> 1) - 1;
        let base = (2 | (slot & 1)) << num_direct_bits;

        if slot < END_POS_MODEL_INDEX as u32 {
            let offset = special_offset(slot);
            return Ok(base + rc.decode_bit_tree_reverse(&mut distance.special, offset, num_direct_bits)?);
        }

        let direct = rc.decode_direct_bits(num_direct_bits - DIST_ALIGN_BITS)?;
        let align = rc.decode_bit_tree_reverse(&mut distance.align, 1, DIST_ALIGN_BITS)?;
        Ok(base + (direct << DIST_ALIGN_BITS) + align)
    }

    /// Decode the next packet. Nothing outside the probability tables
    /// changes here.
    fn read_symbol(&mut self, rc: &mut RangeDecoder<'_>) -> Step<Symbol> {
        let pos_state = (self.window.total() & self.model.props.pos_mask()) as usize;
        let state_idx = self.state.value();

        if rc.decode_bit(&mut self.model.is_match[state_idx][pos_state])? == 0 {
            return Ok(Symbol::Literal(self.read_literal(rc)?));
        }

        if rc.decode_bit(&mut self.model.is_rep[state_idx])? == 0 {
            let len = decode_length(rc, &mut self.model.match_len, pos_state)?;
            let dist = self.read_distance(rc, len)?;
            if dist == END_MARKER_DISTANCE {
                return Ok(Symbol::EndMarker);
            }
            return Ok(Symbol::Match { len, dist });
        }

        let index = if rc.decode_bit(&mut self.model.is_rep0[state_idx])? == 0 {
            if rc.decode_bit(&mut self.model.is_rep0_long[state_idx][pos_state])? == 0 {
                return Ok(Symbol::ShortRep);
            }
            0
        } else if rc.decode_bit(&mut self.model.is_rep1[state_idx])? == 0 {
            1
        } else if rc.decode_bit(&mut self.model.is_rep2[state_idx])? == 0 {
            2
        } else {
            3
        };

        let len = decode_length(rc, &mut self.model.rep_len, pos_state)?;
        Ok(Symbol::Rep { index, len })
    }

    /// Decode one symbol from `input` and normalize after it.
    ///
    /// With `commit` false the probabilities and registers are left as they
    /// were, so a failed attempt can be retried once more input arrives.
    fn run_symbol(&mut self, range: RangeState, input: &[u8], commit: bool) -> Step<(Symbol, usize)> {
        let mut rc = RangeDecoder::resume(range, input, commit);
        let symbol = self.read_symbol(&mut rc)?;
        rc.normalize()?;

        if commit {
            self.range = Some(rc.state());
        }
        Ok((symbol, rc.consumed()))
    }

    /// Write as much of the pending match as fits.
    fn flush_match(&mut self, output: &mut [u8]) -> Result<usize> {
        if self.match_remaining == 0 || output.is_empty() {
            return Ok(0);
        }

        let written = self
            .window
            .copy_match(self.rep[0] as usize + 1, self.match_remaining, output)?;
        self.match_remaining -= written;
        Ok(written)
    }

    /// Apply a decoded symbol to the window and output.
    fn apply(&mut self, symbol: Symbol, output: &mut [u8]) -> Result<usize> {
        match symbol {
            Symbol::Literal(byte) => {
                self.window.push(byte);
                output[0] = byte;
                self.state.update_literal();
                return Ok(1);
            }
            Symbol::EndMarker => {
                self.finished = true;
                if self.range.is_some_and(|r| r.code != 0) {
                    return Err(self.error("range coder not drained after end marker"));
                }
                return Ok(0);
            }
            Symbol::Match { len, dist } => {
                self.rep.copy_within(0..3, 1);
                self.rep[0] = dist;
                self.state.update_match();
                self.match_remaining = len as usize;
            }
            Symbol::ShortRep => {
                self.state.update_short_rep();
                self.match_remaining = 1;
            }
            Symbol::Rep { index, len } => {
                if index > 0 {
                    let dist = self.rep[index];
                    self.rep.copy_within(0..index, 1);
                    self.rep[0] = dist;
                }
                self.state.update_long_rep();
                self.match_remaining = len as usize;
            }
        }

        self.window.check_distance(self.rep[0] as usize + 1)?;
        self.flush_match(output)
    }

    fn progress(consumed: usize, produced: usize, status: DecodeStatus) -> Result<ChunkProgress> {
        Ok(ChunkProgress {
            consumed,
            produced,
            status,
        })
    }
}

impl ChunkDecoder for LzmaChunkDecoder<'_> {
    fn decode_chunk(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        finish: FinishMode,
    ) -> Result<ChunkProgress> {
        let mut consumed = 0;
        let mut produced = 0;

        if self.finished {
            return Self::progress(0, 0, DecodeStatus::FinishedWithMark);
        }

        let range = match self.range {
            Some(range) => range,
            None => {
                let take = (INIT_BYTES - self.pending_len).min(input.len());
                self.pending[self.pending_len..self.pending_len + take]
                    .copy_from_slice(&input[..take]);
                self.pending_len += take;
                consumed += take;

                if self.pending_len < INIT_BYTES {
                    return Self::progress(consumed, 0, DecodeStatus::NeedsMoreInput);
                }

                let mut head = [0u8; INIT_BYTES];
                head.copy_from_slice(&self.pending[..INIT_BYTES]);
                self.pending_len = 0;
                let range = RangeState::init(head)
                    .ok_or_else(|| self.error("payload does not start with a zero byte"))?;
                self.range = Some(range);
                range
            }
        };
        let mut range = range;

        loop {
            produced += self.flush_match(&mut output[produced..])?;

            if self.match_remaining > 0 {
                if finish == FinishMode::End {
                    return Err(self.error("match runs past the end of the stream"));
                }
                return Self::progress(consumed, produced, DecodeStatus::NotFinished);
            }

            let at_limit = produced == output.len();
            if at_limit {
                if range.code == 0 {
                    return Self::progress(
                        consumed,
                        produced,
                        DecodeStatus::MaybeFinishedWithoutMark,
                    );
                }
                if finish == FinishMode::Any {
                    return Self::progress(consumed, produced, DecodeStatus::NotFinished);
                }
            }

            let fresh = &input[consumed..];
            let symbol = if self.pending_len == 0 && fresh.len() >= REQUIRED_INPUT_MAX {
                let (symbol, used) = self
                    .run_symbol(range, fresh, true)
                    .map_err(|_| self.error("symbol longer than the maximum input span"))?;
                consumed += used;
                symbol
            } else {
                let carried = self.pending_len;
                let extra = (REQUIRED_INPUT_MAX - carried).min(fresh.len());
                let mut look = self.pending;
                look[carried..carried + extra].copy_from_slice(&fresh[..extra]);
                let look_len = carried + extra;

                if self.run_symbol(range, &look[..look_len], false).is_err() {
                    if look_len >= REQUIRED_INPUT_MAX {
                        return Err(self.error("symbol longer than the maximum input span"));
                    }
                    self.pending = look;
                    self.pending_len = look_len;
                    consumed += extra;
                    return Self::progress(consumed, produced, DecodeStatus::NeedsMoreInput);
                }

                let (symbol, used) = self
                    .run_symbol(range, &look[..look_len], true)
                    .map_err(|_| self.error("symbol longer than the maximum input span"))?;
                if used < carried {
                    return Err(self.error("carried input was not consumed"));
                }
                self.pending_len = 0;
                consumed += used - carried;
                symbol
            };

            if let Some(next) = self.range {
                range = next;
            }

            if at_limit && symbol != Symbol::EndMarker {
                return Err(self.error("data continues past the end of the stream"));
            }

            produced += self.apply(symbol, &mut output[produced..])?;

            if self.finished {
                return Self::progress(consumed, produced, DecodeStatus::FinishedWithMark);
            }
        }
    }

    fn total_out(&self) -> u64 {
        self.window.total()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EncoderPreset, LzmaEncoder};
    use lzkit_core::alloc::{LimitedAllocator, SystemAllocator};

    fn encode(data: &[u8], end_marker: bool) -> Vec<u8> {
        LzmaEncoder::with_preset(EncoderPreset::DEFAULT.with_end_marker(end_marker))
            .encode_all(data)
            .unwrap()
            .payload
    }

    /// Drive the decoder with fixed-size chunks, the way a container
    /// session does.
    fn decode_chunked(payload: &[u8], size: usize, in_chunk: usize, out_chunk: usize) -> Vec<u8> {
        let mut decoder =
            LzmaChunkDecoder::new(LzmaProperties::default(), 1 << 16, Some(size as u64), &SystemAllocator)
                .unwrap();
        let mut result = Vec::new();
        let mut out = vec![0u8; out_chunk];
        let mut pos = 0;

        while result.len() < size {
            let end = (pos + in_chunk).min(payload.len());
            let remaining = size - result.len();
            let (budget, finish) = if remaining <= out_chunk {
                (remaining, FinishMode::End)
            } else {
                (out_chunk, FinishMode::Any)
            };
            let progress = decoder
                .decode_chunk(&payload[pos..end], &mut out[..budget], finish)
                .unwrap();
            pos += progress.consumed;
            result.extend_from_slice(&out[..progress.produced]);
            assert!(!progress.is_stall(), "decoder stalled at {}", result.len());
        }

        result
    }

    #[test]
    fn test_window_capacity() {
        assert_eq!(window_capacity(1 << 16, Some(10)), 4096);
        assert_eq!(window_capacity(1 << 16, Some(100_000)), 1 << 16);
        assert_eq!(window_capacity(1 << 16, None), 1 << 16);
        assert_eq!(window_capacity(0, None), 4096);
        assert_eq!(window_capacity(u32::MAX, Some(5000)), 5000);
    }

    #[test]
    fn test_single_call_decode() {
        let data = b"abracadabra abracadabra abracadabra";
        let payload = encode(data, true);
        assert_eq!(decode_chunked(&payload, data.len(), payload.len(), 4096), data);
    }

    #[test]
    fn test_one_byte_chunks() {
        let data: Vec<u8> = b"one byte at a time, one byte at a time. "
            .iter()
            .cycle()
            .take(2000)
            .copied()
            .collect();

        for end_marker in [true, false] {
            let payload = encode(&data, end_marker);
            assert_eq!(decode_chunked(&payload, data.len(), 1, 1), data);
            assert_eq!(decode_chunked(&payload, data.len(), 3, 7), data);
            assert_eq!(decode_chunked(&payload, data.len(), 64, 1), data);
        }
    }

    #[test]
    fn test_end_marker_reported() {
        let data = b"end marker";
        let payload = encode(data, true);
        let mut decoder =
            LzmaChunkDecoder::new(LzmaProperties::default(), 1 << 16, None, &SystemAllocator).unwrap();
        let mut out = vec![0u8; 64];

        let progress = decoder
            .decode_chunk(&payload, &mut out, FinishMode::Any)
            .unwrap();
        assert_eq!(progress.status, DecodeStatus::FinishedWithMark);
        assert_eq!(progress.consumed, payload.len());
        assert_eq!(&out[..progress.produced], data);
        assert!(decoder.is_finished());
        assert_eq!(decoder.total_out(), data.len() as u64);

        let again = decoder.decode_chunk(&[], &mut out, FinishMode::Any).unwrap();
        assert!(again.is_stall());
        assert_eq!(again.status, DecodeStatus::FinishedWithMark);
    }

    #[test]
    fn test_needs_more_input() {
        let data = b"needs more input, needs more input";
        let payload = encode(data, true);
        let mut decoder =
            LzmaChunkDecoder::new(LzmaProperties::default(), 1 << 16, None, &SystemAllocator).unwrap();
        let mut out = vec![0u8; 64];

        let progress = decoder
            .decode_chunk(&payload[..3], &mut out, FinishMode::Any)
            .unwrap();
        assert_eq!(progress.consumed, 3);
        assert_eq!(progress.produced, 0);
        assert_eq!(progress.status, DecodeStatus::NeedsMoreInput);
        assert_eq!(decoder.pending_input(), 3);
    }

    #[test]
    fn test_bad_first_byte() {
        let mut decoder =
            LzmaChunkDecoder::new(LzmaProperties::default(), 1 << 16, None, &SystemAllocator).unwrap();
        let mut out = [0u8; 8];
        let err = decoder
            .decode_chunk(&[1, 2, 3, 4, 5, 6], &mut out, FinishMode::Any)
            .unwrap_err();
        assert!(matches!(err, CodecError::DecodeFailure { offset: 0, .. }));
    }

    #[test]
    fn test_data_past_declared_end() {
        let data = b"0123456789 0123456789 0123456789";
        let payload = encode(data, true);
        let mut decoder =
            LzmaChunkDecoder::new(LzmaProperties::default(), 1 << 16, Some(10), &SystemAllocator).unwrap();
        let mut out = vec![0u8; 10];

        let result = decoder.decode_chunk(&payload, &mut out, FinishMode::End);
        assert!(matches!(result, Err(CodecError::DecodeFailure { .. })));
    }

    #[test]
    fn test_end_mode_with_empty_budget_finds_marker() {
        let data = b"marker after the last byte";
        let payload = encode(data, true);
        let mut decoder = LzmaChunkDecoder::new(
            LzmaProperties::default(),
            1 << 16,
            Some(data.len() as u64),
            &SystemAllocator,
        )
        .unwrap();

        let mut out = vec![0u8; data.len()];
        let first = decoder
            .decode_chunk(&payload, &mut out, FinishMode::Any)
            .unwrap();
        assert_eq!(first.produced, data.len());

        let rest = &payload[first.consumed..];
        let second = decoder.decode_chunk(rest, &mut [], FinishMode::End).unwrap();
        assert!(second.status.is_final());
    }

    #[test]
    fn test_match_distance_in_every_slot() {
        let mut seed = 0x2545_F491u32;
        let mut noise = move || {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            seed as u8
        };

        // Noise with a 12-byte copy at the first and last distance of
        // each reverse-tree slot.
        let mut data: Vec<u8> = (0..256).map(|_| noise()).collect();
        for slot in 4..END_POS_MODEL_INDEX as u32 {
            let bits = (slot >> 1) - 1;
            let base = (2 | (slot & 1)) << bits;
            for dist in [base, base + (1 << bits) - 1] {
                data.extend((0..5).map(|_| noise()));
                let start = data.len() - dist as usize - 1;
                for i in 0..12 {
                    let byte = data[start + i];
                    data.push(byte);
                }
            }
        }

        for end_marker in [true, false] {
            let payload = encode(&data, end_marker);
            assert_eq!(decode_chunked(&payload, data.len(), payload.len(), 4096), data);
            assert_eq!(decode_chunked(&payload, data.len(), 7, 5), data);
        }
    }

    #[test]
    fn test_window_from_allocator() {
        let alloc = LimitedAllocator::new(1 << 20);
        {
            let decoder =
                LzmaChunkDecoder::new(LzmaProperties::default(), 1 << 16, Some(100), &alloc).unwrap();
            assert_eq!(decoder.window_size(), 4096);
            assert_eq!(alloc.in_use(), 4096);
        }
        assert_eq!(alloc.live(), 0);

        let tiny = LimitedAllocator::new(1024);
        let err = LzmaChunkDecoder::new(LzmaProperties::default(), 1 << 16, None, &tiny).unwrap_err();
        assert!(matches!(err, CodecError::OutOfMemory { requested: 65536 }));
    }

    #[test]
    fn test_rejects_distance_beyond_history() {
        // A match as the very first packet refers to nothing.
        let mut rc = crate::range_coder::RangeEncoder::new();
        let mut model = LzmaModel::new(LzmaProperties::default());
        rc.encode_bit(&mut model.is_match[0][0], 1);
        rc.encode_bit(&mut model.is_rep[0], 0);
        rc.encode_bit(&mut model.match_len.choice, 0);
        rc.encode_bit_tree(&mut model.match_len.low[0], LEN_LOW_BITS, 0);
        rc.encode_bit_tree(&mut model.distance.slot[0], 6, 0);
        let payload = rc.finish();

        let mut decoder =
            LzmaChunkDecoder::new(LzmaProperties::default(), 1 << 16, None, &SystemAllocator).unwrap();
        let mut out = [0u8; 16];
        let err = decoder
            .decode_chunk(&payload, &mut out, FinishMode::Any)
            .unwrap_err();
        assert!(err.to_string().contains("exceeds history"));
    }
}
