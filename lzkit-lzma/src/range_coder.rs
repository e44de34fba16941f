//! Range coder for LZMA compression.
//!
//! The range coder is an entropy coding method similar to arithmetic coding.
//! LZMA uses a specific variant with:
//! - 32-bit range tracking
//! - Normalization when range drops below 2^24
//! - 11-bit probability model (2048 = 100%)
//!
//! The decoder side works over a borrowed slice and can run in a dry mode
//! that leaves the probabilities untouched. The chunk decoder uses that to
//! find out whether a symbol fits in the input it has before committing to
//! it.

/// Number of bits in probability model.
pub const PROB_BITS: u32 = 11;

/// Initial probability (50%).
pub const PROB_INIT: u16 = 1 << (PROB_BITS - 1);

/// Maximum probability value.
pub const PROB_MAX: u16 = 1 << PROB_BITS;

/// Number of bits to shift for probability update.
pub const MOVE_BITS: u32 = 5;

/// Top value for range normalization.
const TOP_VALUE: u32 = 1 << 24;

/// Bytes consumed by range decoder initialization.
pub const INIT_BYTES: usize = 5;

/// The decoder ran out of input in the middle of a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputExhausted;

/// Result of a decoder step that may run out of input.
pub type Step<T> = std::result::Result<T, InputExhausted>;

/// Saved range decoder registers, carried between input slices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeState {
    /// Current range.
    pub range: u32,
    /// Current code value.
    pub code: u32,
}

impl RangeState {
    /// Initialize from the first five payload bytes.
    ///
    /// Returns `None` if the leading byte is not zero.
    pub fn init(bytes: [u8; INIT_BYTES]) -> Option<Self> {
        if bytes[0] != 0x00 {
            return None;
        }

        Some(Self {
            range: 0xFFFF_FFFF,
            code: u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]),
        })
    }
}

/// Range decoder over a borrowed input slice.
#[derive(Debug)]
pub struct RangeDecoder<'a> {
    input: &'a [u8],
    pos: usize,
    range: u32,
    code: u32,
    commit: bool,
}

impl<'a> RangeDecoder<'a> {
    /// Resume decoding from `state` over `input`.
    ///
    /// When `commit` is false the probabilities passed to
    /// [`RangeDecoder::decode_bit`] are left unchanged.
    pub fn resume(state: RangeState, input: &'a [u8], commit: bool) -> Self {
        Self {
            input,
            pos: 0,
            range: state.range,
            code: state.code,
            commit,
        }
    }

    /// Registers to carry into the next slice.
    pub fn state(&self) -> RangeState {
        RangeState {
            range: self.range,
            code: self.code,
        }
    }

    /// Bytes of the slice consumed so far.
    pub fn consumed(&self) -> usize {
        self.pos
    }

    /// Normalize the range (refill when range gets small).
    pub fn normalize(&mut self) -> Step<()> {
        if self.range < TOP_VALUE {
            let byte = *self.input.get(self.pos).ok_or(InputExhausted)?;
            self.pos += 1;
            self.range <<= 8;
            self.code = (self.code << 8) | byte as u32;
        }
        Ok(())
    }

    /// Decode a single bit with the given probability.
    pub fn decode_bit(&mut self, prob: &mut u16) -> Step<u32> {
        self.normalize()?;

        let bound = (self.range >> PROB_BITS) * (*prob as u32);

        if self.code < bound {
            self.range = bound;
            if self.commit {
                *prob += (PROB_MAX - *prob) >> MOVE_BITS;
            }
            Ok(0)
        } else {
            self.range -= bound;
            self.code -= bound;
            if self.commit {
                *prob -= *prob >> MOVE_BITS;
            }
            Ok(1)
        }
    }

    /// Decode a bit with fixed 50% probability.
    pub fn decode_direct_bit(&mut self) -> Step<u32> {
        self.normalize()?;

        self.range >>= 1;
        self.code = self.code.wrapping_sub(self.range);

        let bit = if (self.code as i32) < 0 {
            self.code = self.code.wrapping_add(self.range);
            0
        } else {
            1
        };

        Ok(bit)
    }

    /// Decode multiple bits with fixed probability.
    pub fn decode_direct_bits(&mut self, count: u32) -> Step<u32> {
        let mut result = 0u32;
        for _ in 0..count {
            result = (result << 1) | self.decode_direct_bit()?;
        }
        Ok(result)
    }

    /// Decode a bit tree (normal order).
    pub fn decode_bit_tree(&mut self, probs: &mut [u16], num_bits: u32) -> Step<u32> {
        let mut index = 1usize;

        for _ in 0..num_bits {
            let bit = self.decode_bit(&mut probs[index])?;
            index = (index << 1) | bit as usize;
        }

        Ok((index as u32) - (1 << num_bits))
    }

    /// Decode a bit tree (reverse order). The tree's node 1 sits at
    /// `probs[offset]`.
    pub fn decode_bit_tree_reverse(
        &mut self,
        probs: &mut [u16],
        offset: usize,
        num_bits: u32,
    ) -> Step<u32> {
        let mut result = 0u32;
        let mut index = 1usize;

        for i in 0..num_bits {
            let bit = self.decode_bit(&mut probs[offset + index - 1])?;
            index = (index << 1) | bit as usize;
            result |= bit << i;
        }

        Ok(result)
    }
}

/// Range encoder for LZMA compression.
#[derive(Debug)]
pub struct RangeEncoder {
    /// Output buffer.
    buffer: Vec<u8>,
    /// Current range.
    range: u32,
    /// Low value.
    low: u64,
    /// Cache byte.
    cache: u8,
    /// Cache size.
    cache_size: u64,
}

impl RangeEncoder {
    /// Create a new range encoder.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create a range encoder with an output capacity hint.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            range: 0xFFFF_FFFF,
            low: 0,
            cache: 0,
            cache_size: 1,
        }
    }

    /// Shift low and write bytes.
    ///
    /// `low` is a 64-bit accumulator whose bit 32 carries into the pending
    /// cache bytes.
    fn shift_low(&mut self) {
        if self.low < 0xFF00_0000 || self.low > 0xFFFF_FFFF {
            let carry = (self.low >> 32) as u8;
            let mut tmp = self.cache;

            loop {
                self.buffer.push(tmp.wrapping_add(carry));
                tmp = 0xFF;
                self.cache_size -= 1;
                if self.cache_size == 0 {
                    break;
                }
            }

            self.cache = (self.low >> 24) as u8;
        }

        self.cache_size += 1;
        self.low = (self.low << 8) & 0xFFFF_FFFF;
    }

    /// Normalize the range.
    fn normalize(&mut self) {
        if self.range < TOP_VALUE {
            self.range <<= 8;
            self.shift_low();
        }
    }

    /// Encode a single bit with the given probability.
    pub fn encode_bit(&mut self, prob: &mut u16, bit: u32) {
        let bound = (self.range >> PROB_BITS) * (*prob as u32);

        if bit == 0 {
            self.range = bound;
            *prob += (PROB_MAX - *prob) >> MOVE_BITS;
        } else {
            self.low += bound as u64;
            self.range -= bound;
            *prob -= *prob >> MOVE_BITS;
        }

        self.normalize();
    }

    /// Encode a bit with fixed 50% probability.
    pub fn encode_direct_bit(&mut self, bit: u32) {
        self.range >>= 1;
        if bit != 0 {
            self.low += self.range as u64;
        }
        self.normalize();
    }

    /// Encode multiple bits with fixed probability, most significant first.
    pub fn encode_direct_bits(&mut self, value: u32, count: u32) {
        for i in (0..count).rev() {
            self.encode_direct_bit((value >> i) & 1);
        }
    }

    /// Encode a bit tree (normal order).
    pub fn encode_bit_tree(&mut self, probs: &mut [u16], num_bits: u32, value: u32) {
        let mut index = 1usize;

        for i in (0..num_bits).rev() {
            let bit = (value >> i) & 1;
            self.encode_bit(&mut probs[index], bit);
            index = (index << 1) | bit as usize;
        }
    }

    /// Encode a bit tree (reverse order). The tree's node 1 sits at
    /// `probs[offset]`.
    pub fn encode_bit_tree_reverse(
        &mut self,
        probs: &mut [u16],
        offset: usize,
        num_bits: u32,
        value: u32,
    ) {
        let mut index = 1usize;

        for i in 0..num_bits {
            let bit = (value >> i) & 1;
            self.encode_bit(&mut probs[offset + index - 1], bit);
            index = (index << 1) | bit as usize;
        }
    }

    /// Bytes emitted and not yet taken, not counting pending cache bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if no emitted bytes are waiting.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Emitted bytes not yet taken.
    pub fn output(&self) -> &[u8] {
        &self.buffer
    }

    /// Drop the bytes returned by [`RangeEncoder::output`]. The encoder's
    /// state is unaffected, so later bytes continue the same stream.
    pub fn clear_output(&mut self) {
        self.buffer.clear();
    }

    /// Push out the low register and pending cache bytes. Only valid as the
    /// last operation on the stream.
    pub fn flush(&mut self) {
        for _ in 0..5 {
            self.shift_low();
        }
    }

    /// Flush pending state and return the encoded bytes.
    pub fn finish(mut self) -> Vec<u8> {
        self.flush();
        self.buffer
    }
}

impl Default for RangeEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_state(encoded: &[u8]) -> RangeState {
        let mut head = [0u8; INIT_BYTES];
        head.copy_from_slice(&encoded[..INIT_BYTES]);
        RangeState::init(head).unwrap()
    }

    #[test]
    fn test_prob_constants() {
        assert_eq!(PROB_INIT, 1024);
        assert_eq!(PROB_MAX, 2048);
    }

    #[test]
    fn test_init_rejects_nonzero_lead() {
        assert!(RangeState::init([1, 0, 0, 0, 0]).is_none());
        let state = RangeState::init([0, 0x12, 0x34, 0x56, 0x78]).unwrap();
        assert_eq!(state.code, 0x1234_5678);
        assert_eq!(state.range, 0xFFFF_FFFF);
    }

    #[test]
    fn test_encode_decode_bits() {
        let bits = [0u32, 1, 0, 1, 1, 1, 0, 0, 1, 0];

        let mut encoder = RangeEncoder::new();
        let mut prob = PROB_INIT;
        for &bit in &bits {
            encoder.encode_bit(&mut prob, bit);
        }
        encoder.encode_direct_bits(0b1011_0110, 8);
        let encoded = encoder.finish();
        assert_eq!(encoded[0], 0);

        let mut decoder = RangeDecoder::resume(init_state(&encoded), &encoded[INIT_BYTES..], true);
        let mut prob = PROB_INIT;
        for &bit in &bits {
            assert_eq!(decoder.decode_bit(&mut prob).unwrap(), bit);
        }
        assert_eq!(decoder.decode_direct_bits(8).unwrap(), 0b1011_0110);
    }

    #[test]
    fn test_bit_trees_roundtrip() {
        let mut enc_probs = [PROB_INIT; 64];
        let mut encoder = RangeEncoder::new();
        encoder.encode_bit_tree(&mut enc_probs, 6, 45);
        encoder.encode_bit_tree_reverse(&mut enc_probs, 16, 4, 0b1101);
        let encoded = encoder.finish();

        let mut dec_probs = [PROB_INIT; 64];
        let mut decoder = RangeDecoder::resume(init_state(&encoded), &encoded[INIT_BYTES..], true);
        assert_eq!(decoder.decode_bit_tree(&mut dec_probs, 6).unwrap(), 45);
        assert_eq!(
            decoder.decode_bit_tree_reverse(&mut dec_probs, 16, 4).unwrap(),
            0b1101
        );
        assert_eq!(enc_probs, dec_probs);
    }

    #[test]
    fn test_dry_run_leaves_probabilities() {
        let mut encoder = RangeEncoder::new();
        let mut prob = PROB_INIT;
        for _ in 0..200 {
            encoder.encode_bit(&mut prob, 1);
        }
        let encoded = encoder.finish();
        let state = init_state(&encoded);

        let mut prob = PROB_INIT;
        let mut dry = RangeDecoder::resume(state, &encoded[INIT_BYTES..], false);
        assert_eq!(dry.decode_bit(&mut prob).unwrap(), 1);
        assert_eq!(prob, PROB_INIT);

        let mut live = RangeDecoder::resume(state, &encoded[INIT_BYTES..], true);
        assert_eq!(live.decode_bit(&mut prob).unwrap(), 1);
        assert!(prob < PROB_INIT);
    }

    #[test]
    fn test_decoder_reports_exhaustion() {
        let state = RangeState {
            range: 1,
            code: 0,
        };
        let mut decoder = RangeDecoder::resume(state, &[], true);
        let mut prob = PROB_INIT;
        assert_eq!(decoder.decode_bit(&mut prob), Err(InputExhausted));
        assert_eq!(decoder.consumed(), 0);
    }

    #[test]
    fn test_output_taken_in_pieces() {
        let values: Vec<u32> = (0..3000u32).map(|i| i.wrapping_mul(40503) % 64).collect();

        let mut whole = RangeEncoder::new();
        let mut pieces = RangeEncoder::new();
        let mut whole_probs = [PROB_INIT; 64];
        let mut piece_probs = [PROB_INIT; 64];
        let mut taken = Vec::new();

        for &value in &values {
            whole.encode_bit_tree(&mut whole_probs, 6, value);
            pieces.encode_bit_tree(&mut piece_probs, 6, value);
            if pieces.len() >= 100 {
                taken.extend_from_slice(pieces.output());
                pieces.clear_output();
                assert!(pieces.is_empty());
            }
        }
        pieces.flush();
        taken.extend_from_slice(pieces.output());

        assert_eq!(taken, whole.finish());
    }
}
