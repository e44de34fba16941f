//! LZMA compression.
//!
//! A greedy encoder: at each position it takes the longest rep match or the
//! longest hash-chain match, whichever the heuristic below prefers, and
//! falls back to a literal. The search depth grows with the preset level.
//!
//! The match-finder tables and the payload live in [`Scratch`] buffers, so
//! [`LzmaEncoder::encode_in`] stays within whatever the caller's allocator
//! grants and reports a refusal as `OutOfMemory`.

use crate::model::{
    DIST_ALIGN_BITS, END_MARKER_DISTANCE, END_POS_MODEL_INDEX, LEN_HIGH_BITS, LEN_LOW_BITS,
    LEN_MID_BITS, LengthModel, LzmaModel, MATCH_LEN_MAX, MATCH_LEN_MIN, State, dist_slot,
    len_state, special_offset,
};
use crate::range_coder::RangeEncoder;
use crate::{EncoderPreset, LzmaLevel};
use lzkit_core::alloc::{Scratch, ScratchAllocator, SystemAllocator};
use lzkit_core::error::{CodecError, Result};

/// Hash table size (64K entries).
const HASH_SIZE: usize = 1 << 16;

/// Empty hash slot / end of chain.
const NIL: u32 = u32::MAX;

/// Range coder output is moved into the payload once this much is pending.
const OUTPUT_CHUNK: usize = 4096;

/// Maximum chain depth per compression level.
const CHAIN_DEPTH: [usize; 10] = [
    0,    // Level 0: literals and rep matches only
    4,    // Level 1: Very fast
    8,    // Level 2: Fast
    16,   // Level 3: Fast
    32,   // Level 4: Normal
    64,   // Level 5: Normal
    128,  // Level 6: Normal
    256,  // Level 7: Maximum
    512,  // Level 8: High
    1024, // Level 9: Best
];

/// Output of a one-shot encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBlock {
    /// Properties byte followed by the dictionary size (LE).
    pub properties: [u8; 5],
    /// Range-coded payload.
    pub payload: Vec<u8>,
}

/// Output of [`LzmaEncoder::encode_in`]. The payload stays in scratch
/// memory until the block is dropped.
#[derive(Debug)]
pub struct ScratchBlock<'a> {
    /// Properties byte followed by the dictionary size (LE).
    pub properties: [u8; 5],
    payload: Scratch<'a>,
    len: usize,
}

impl ScratchBlock<'_> {
    /// Range-coded payload.
    pub fn payload(&self) -> &[u8] {
        &self.payload[..self.len]
    }
}

/// Append `bytes` to the first `*len` bytes of `buffer`, growing it
/// through its allocator when full.
fn append<'a>(buffer: Scratch<'a>, len: &mut usize, bytes: &[u8]) -> Result<Scratch<'a>> {
    let needed = len
        .checked_add(bytes.len())
        .ok_or_else(|| CodecError::out_of_memory(usize::MAX))?;

    let mut buffer = if needed > buffer.len() {
        let size = needed.max(buffer.len().saturating_mul(2));
        buffer.grow(size, *len)?
    } else {
        buffer
    };

    buffer[*len..needed].copy_from_slice(bytes);
    *len = needed;
    Ok(buffer)
}

/// FNV-1a over three bytes, folded to the hash table size.
fn hash3(data: &[u8]) -> usize {
    let mut h = 2166136261u32;
    h ^= data[0] as u32;
    h = h.wrapping_mul(16777619);
    h ^= data[1] as u32;
    h = h.wrapping_mul(16777619);
    h ^= data[2] as u32;
    h = h.wrapping_mul(16777619);
    (h as usize) & (HASH_SIZE - 1)
}

/// Hash-chain match finder.
///
/// Both tables hold native-endian `u32` positions in scratch memory: `head`
/// has one entry per hash, `chain` one per input byte.
struct MatchFinder<'a> {
    head: Scratch<'a>,
    chain: Scratch<'a>,
    depth: usize,
    dict_size: usize,
}

impl<'a> MatchFinder<'a> {
    fn new(
        allocator: &'a dyn ScratchAllocator,
        input_len: usize,
        depth: usize,
        dict_size: usize,
    ) -> Result<Self> {
        let chain_bytes = input_len
            .checked_mul(4)
            .ok_or_else(|| CodecError::out_of_memory(usize::MAX))?;

        let mut head = Scratch::new(allocator, HASH_SIZE * 4)?;
        let mut chain = Scratch::new(allocator, chain_bytes)?;
        // All ones is NIL in every slot.
        head.fill(0xFF);
        chain.fill(0xFF);

        Ok(Self {
            head,
            chain,
            depth,
            dict_size,
        })
    }

    fn get(table: &[u8], index: usize) -> u32 {
        let at = index * 4;
        u32::from_ne_bytes([table[at], table[at + 1], table[at + 2], table[at + 3]])
    }

    fn set(table: &mut [u8], index: usize, value: u32) {
        let at = index * 4;
        table[at..at + 4].copy_from_slice(&value.to_ne_bytes());
    }

    /// Find the best match at `pos`.
    ///
    /// Returns the zero-based distance and the length.
    fn find(&self, data: &[u8], pos: usize) -> Option<(u32, u32)> {
        if pos + 3 > data.len() || self.depth == 0 {
            return None;
        }

        let mut match_pos = Self::get(&self.head, hash3(&data[pos..]));
        let max_len = (data.len() - pos).min(MATCH_LEN_MAX);
        let mut best_len = 0usize;
        let mut best_dist = 0usize;
        let mut chain_count = 0;

        while match_pos != NIL && (match_pos as usize) < pos && chain_count < self.depth {
            let candidate = match_pos as usize;
            let dist = pos - candidate;
            if dist > self.dict_size {
                break;
            }

            if data[pos..pos + 3] == data[candidate..candidate + 3] {
                let mut len = 3usize;
                while len < max_len && data[pos + len] == data[candidate + len] {
                    len += 1;
                }

                // Longer wins; on a tie the nearer one.
                if len > best_len || (len == best_len && dist < best_dist) {
                    best_len = len;
                    best_dist = dist;

                    if best_len >= max_len {
                        break;
                    }
                }
            }

            let next = Self::get(&self.chain, candidate);
            if next >= match_pos {
                break;
            }
            match_pos = next;
            chain_count += 1;
        }

        if best_len < MATCH_LEN_MIN {
            return None;
        }

        Some(((best_dist - 1) as u32, best_len as u32))
    }

    /// Link `pos` into its hash chain.
    fn insert(&mut self, data: &[u8], pos: usize) {
        if pos + 3 > data.len() {
            return;
        }

        let hash = hash3(&data[pos..]);
        let previous = Self::get(&self.head, hash);
        Self::set(&mut self.chain, pos, previous);
        Self::set(&mut self.head, hash, pos as u32);
    }
}

/// Encode a length.
fn encode_length(rc: &mut RangeEncoder, len_model: &mut LengthModel, len: u32, pos_state: usize) {
    let len = len - MATCH_LEN_MIN as u32;

    if len < (1 << LEN_LOW_BITS) {
        rc.encode_bit(&mut len_model.choice, 0);
        rc.encode_bit_tree(&mut len_model.low[pos_state], LEN_LOW_BITS, len);
    } else if len < (1 << LEN_LOW_BITS) + (1 << LEN_MID_BITS) {
        rc.encode_bit(&mut len_model.choice, 1);
        rc.encode_bit(&mut len_model.choice2, 0);
        rc.encode_bit_tree(
            &mut len_model.mid[pos_state],
            LEN_MID_BITS,
            len - (1 << LEN_LOW_BITS),
        );
    } else {
        rc.encode_bit(&mut len_model.choice, 1);
        rc.encode_bit(&mut len_model.choice2, 1);
        rc.encode_bit_tree(
            &mut len_model.high,
            LEN_HIGH_BITS,
            len - (1 << LEN_LOW_BITS) - (1 << LEN_MID_BITS),
        );
    }
}

/// What to emit at the current position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Packet {
    Literal,
    Rep { index: usize, len: u32 },
    Match { dist: u32, len: u32 },
}

/// LZMA encoder.
pub struct LzmaEncoder {
    /// Range encoder.
    rc: RangeEncoder,
    /// LZMA model.
    model: LzmaModel,
    /// Dictionary size.
    dict_size: usize,
    /// Current state.
    state: State,
    /// Rep distances (zero-based).
    rep: [u32; 4],
    /// Maximum chain depth (based on compression level).
    chain_depth: usize,
    /// Preset the encoder was built from.
    preset: EncoderPreset,
    /// Bytes encoded.
    bytes_encoded: u64,
}

impl LzmaEncoder {
    /// Create an encoder for `preset`.
    pub fn with_preset(preset: EncoderPreset) -> Self {
        let preset = preset.normalized();
        let chain_depth = CHAIN_DEPTH[preset.level.level() as usize];

        Self {
            rc: RangeEncoder::with_capacity(OUTPUT_CHUNK * 2),
            model: LzmaModel::new(preset.properties),
            dict_size: preset.dict_size as usize,
            state: State::new(),
            rep: [0; 4],
            chain_depth,
            preset,
            bytes_encoded: 0,
        }
    }

    /// Create an encoder for a level with default properties.
    pub fn new(level: LzmaLevel, dict_size: u32) -> Self {
        Self::with_preset(
            EncoderPreset::DEFAULT
                .with_level(level)
                .with_dict_size(dict_size),
        )
    }

    /// The preset in use, after clamping.
    pub fn preset(&self) -> EncoderPreset {
        self.preset
    }

    /// Get the dictionary size.
    pub fn dict_size(&self) -> u32 {
        self.dict_size as u32
    }

    /// Length of the rep match at `pos` for rep slot `rep_idx`.
    fn check_rep_match(&self, data: &[u8], pos: usize, rep_idx: usize) -> u32 {
        let dist = self.rep[rep_idx] as usize;

        if dist >= pos {
            return 0;
        }

        let match_pos = pos - dist - 1;
        let max_len = (data.len() - pos).min(MATCH_LEN_MAX);
        let mut len = 0usize;

        while len < max_len && data[pos + len] == data[match_pos + len] {
            len += 1;
        }

        len as u32
    }

    /// Pick the packet for `pos`.
    fn choose_packet(&self, finder: &MatchFinder<'_>, data: &[u8], pos: usize) -> Packet {
        let mut best_rep: Option<(usize, u32)> = None;
        for rep_idx in 0..4 {
            let len = self.check_rep_match(data, pos, rep_idx);
            if len >= MATCH_LEN_MIN as u32 && best_rep.is_none_or(|(_, l)| len > l) {
                best_rep = Some((rep_idx, len));
            }
        }

        match (best_rep, finder.find(data, pos)) {
            (Some((index, rep_len)), Some((_, len)))
                if rep_len >= len || (rep_len >= 3 && index == 0) =>
            {
                Packet::Rep {
                    index,
                    len: rep_len,
                }
            }
            (_, Some((dist, len))) => Packet::Match { dist, len },
            (Some((index, len)), None) => Packet::Rep { index, len },
            (None, None) => Packet::Literal,
        }
    }

    /// Encode a literal byte.
    fn encode_literal(&mut self, byte: u8, prev_byte: u8, match_byte: u8) {
        let lit_state = self.model.props.literal_state(self.bytes_encoded, prev_byte);

        if self.state.is_literal() {
            self.rc.encode_bit_tree(
                &mut self.model.literal.probs[lit_state],
                8,
                byte as u32,
            );
        } else {
            self.encode_literal_matched(lit_state, byte, match_byte);
        }
    }

    /// Encode a literal with match context.
    fn encode_literal_matched(&mut self, lit_state: usize, byte: u8, match_byte: u8) {
        let probs = &mut self.model.literal.probs[lit_state];
        let mut symbol = (byte as usize) | 0x100;
        let mut match_symbol = (match_byte as usize) << 1;
        let mut context = 1usize;

        loop {
            let match_bit = (match_symbol >> 8) & 1;
            match_symbol <<= 1;

            let bit = (symbol >> 7) & 1;
            symbol <<= 1;

            self.rc
                .encode_bit(&mut probs[0x100 + (match_bit << 8) + context], bit as u32);
            context = (context << 1) | bit;

            if context >= 0x100 {
                break;
            }

            if bit != match_bit {
                // Mismatch, continue without match context
                while context < 0x100 {
                    let bit = (symbol >> 7) & 1;
                    symbol <<= 1;
                    self.rc.encode_bit(&mut probs[context], bit as u32);
                    context = (context << 1) | bit;
                }
                break;
            }
        }
    }

    /// Encode a zero-based distance.
    fn encode_distance(&mut self, dist: u32, len: u32) {
        let slot = dist_slot(dist);
        self.rc
            .encode_bit_tree(&mut self.model.distance.slot[len_state(len)], 6, slot);

        if slot < 4 {
            return;
        }

        let num_direct_bits = (slot >> 1) - 1;
        let base = (2 | (slot & 1)) << num_direct_bits;
        let dist_reduced = dist - base;

        if slot < END_POS_MODEL_INDEX as u32 {
            self.rc.encode_bit_tree_reverse(
                &mut self.model.distance.special,
                special_offset(slot),
                num_direct_bits,
                dist_reduced,
            );
        } else {
            self.rc.encode_direct_bits(
                dist_reduced >> DIST_ALIGN_BITS,
                num_direct_bits - DIST_ALIGN_BITS,
            );
            self.rc.encode_bit_tree_reverse(
                &mut self.model.distance.align,
                1,
                DIST_ALIGN_BITS,
                dist_reduced & ((1 << DIST_ALIGN_BITS) - 1),
            );
        }
    }

    fn pos_state(&self) -> usize {
        (self.bytes_encoded & self.model.props.pos_mask()) as usize
    }

    fn emit_literal(&mut self, data: &[u8], pos: usize) {
        let pos_state = self.pos_state();
        let state_idx = self.state.value();
        self.rc
            .encode_bit(&mut self.model.is_match[state_idx][pos_state], 0);

        let prev_byte = if pos > 0 { data[pos - 1] } else { 0 };
        let match_byte = if !self.state.is_literal() && (self.rep[0] as usize) < pos {
            data[pos - self.rep[0] as usize - 1]
        } else {
            0
        };

        self.encode_literal(data[pos], prev_byte, match_byte);
        self.state.update_literal();
        self.bytes_encoded += 1;
    }

    fn emit_rep(&mut self, index: usize, len: u32) {
        let pos_state = self.pos_state();
        let state_idx = self.state.value();
        self.rc
            .encode_bit(&mut self.model.is_match[state_idx][pos_state], 1);
        self.rc.encode_bit(&mut self.model.is_rep[state_idx], 1);

        if index == 0 {
            self.rc.encode_bit(&mut self.model.is_rep0[state_idx], 0);
            self.rc
                .encode_bit(&mut self.model.is_rep0_long[state_idx][pos_state], 1);
        } else {
            self.rc.encode_bit(&mut self.model.is_rep0[state_idx], 1);
            if index == 1 {
                self.rc.encode_bit(&mut self.model.is_rep1[state_idx], 0);
            } else {
                self.rc.encode_bit(&mut self.model.is_rep1[state_idx], 1);
                self.rc
                    .encode_bit(&mut self.model.is_rep2[state_idx], (index == 3) as u32);
            }

            let dist = self.rep[index];
            self.rep.copy_within(0..index, 1);
            self.rep[0] = dist;
        }

        encode_length(&mut self.rc, &mut self.model.rep_len, len, pos_state);
        self.state.update_long_rep();
        self.bytes_encoded += len as u64;
    }

    fn emit_match(&mut self, dist: u32, len: u32) {
        let pos_state = self.pos_state();
        let state_idx = self.state.value();
        self.rc
            .encode_bit(&mut self.model.is_match[state_idx][pos_state], 1);
        self.rc.encode_bit(&mut self.model.is_rep[state_idx], 0);

        encode_length(&mut self.rc, &mut self.model.match_len, len, pos_state);
        self.encode_distance(dist, len);

        self.rep.copy_within(0..3, 1);
        self.rep[0] = dist;
        self.state.update_match();
        self.bytes_encoded += len as u64;
    }

    fn emit_end_marker(&mut self) {
        let pos_state = self.pos_state();
        let state_idx = self.state.value();
        self.rc
            .encode_bit(&mut self.model.is_match[state_idx][pos_state], 1);
        self.rc.encode_bit(&mut self.model.is_rep[state_idx], 0);

        let len = MATCH_LEN_MIN as u32;
        encode_length(&mut self.rc, &mut self.model.match_len, len, pos_state);
        self.encode_distance(END_MARKER_DISTANCE, len);
    }

    /// Encode `data` in one pass, with every working buffer and the
    /// payload taken from `allocator`.
    pub fn encode_in<'a>(
        mut self,
        data: &[u8],
        allocator: &'a dyn ScratchAllocator,
    ) -> Result<ScratchBlock<'a>> {
        if data.len() >= NIL as usize {
            return Err(CodecError::encode_failure(format!(
                "input of {} bytes exceeds the encoder's 4 GiB position range",
                data.len()
            )));
        }

        let mut finder = MatchFinder::new(allocator, data.len(), self.chain_depth, self.dict_size)?;
        let mut payload = Scratch::new(allocator, (data.len() / 2).max(OUTPUT_CHUNK))?;
        let mut payload_len = 0;

        let mut i = 0;
        while i < data.len() {
            let advance = match self.choose_packet(&finder, data, i) {
                Packet::Literal => {
                    self.emit_literal(data, i);
                    1
                }
                Packet::Rep { index, len } => {
                    self.emit_rep(index, len);
                    len as usize
                }
                Packet::Match { dist, len } => {
                    self.emit_match(dist, len);
                    len as usize
                }
            };

            for j in i..i + advance {
                finder.insert(data, j);
            }
            i += advance;

            if self.rc.len() >= OUTPUT_CHUNK {
                payload = append(payload, &mut payload_len, self.rc.output())?;
                self.rc.clear_output();
            }
        }
        drop(finder);

        if self.bytes_encoded != data.len() as u64 {
            return Err(CodecError::encode_failure(format!(
                "encoded {} bytes of a {}-byte input",
                self.bytes_encoded,
                data.len()
            )));
        }

        if self.preset.end_marker {
            self.emit_end_marker();
        }
        self.rc.flush();
        payload = append(payload, &mut payload_len, self.rc.output())?;

        Ok(ScratchBlock {
            properties: self.preset.properties_block(),
            payload,
            len: payload_len,
        })
    }

    /// Encode `data` in one pass into an owned payload.
    pub fn encode_all(self, data: &[u8]) -> Result<EncodedBlock> {
        let block = self.encode_in(data, &SystemAllocator)?;
        Ok(EncodedBlock {
            properties: block.properties,
            payload: block.payload().to_vec(),
        })
    }
}
