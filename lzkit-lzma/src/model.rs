//! Adaptive probability tables and the packet state machine.
//!
//! The range coder only ever codes single bits, each against a 16-bit
//! probability that adapts as it is used. [`LzmaModel`] owns every one of
//! those probabilities. They are grouped by the part of a packet they code:
//! the packet kind, literal bytes, lengths, and distances.

use crate::range_coder::PROB_INIT;

/// `lc` of the usual `0x5D` properties byte.
pub const LC_DEFAULT: u32 = 3;
/// `lp` of the usual `0x5D` properties byte.
pub const LP_DEFAULT: u32 = 0;
/// `pb` of the usual `0x5D` properties byte.
pub const PB_DEFAULT: u32 = 2;

/// First properties byte value that no `lc`/`lp`/`pb` triple produces.
pub const PROPERTIES_BYTE_LIMIT: u8 = 9 * 5 * 5;

/// Upper bound on `1 << pb`.
pub const POS_STATES_MAX: usize = 1 << 4;

/// Size of the packet-kind state machine.
pub const NUM_STATES: usize = 12;

// Lengths are coded in three ranges: 8 short, 8 medium, then 256 long.
/// Tree depth for the short range.
pub const LEN_LOW_BITS: u32 = 3;
/// Tree depth for the medium range.
pub const LEN_MID_BITS: u32 = 3;
/// Tree depth for the long range.
pub const LEN_HIGH_BITS: u32 = 8;
/// Lengths in the short range.
pub const LEN_LOW_SYMBOLS: usize = 1 << LEN_LOW_BITS;
/// Lengths in the medium range.
pub const LEN_MID_SYMBOLS: usize = 1 << LEN_MID_BITS;
/// Lengths in the long range.
pub const LEN_HIGH_SYMBOLS: usize = 1 << LEN_HIGH_BITS;

/// Shortest length a match or rep packet can carry.
pub const MATCH_LEN_MIN: usize = 2;

/// Longest length a match or rep packet can carry (273).
pub const MATCH_LEN_MAX: usize = MATCH_LEN_MIN + LEN_LOW_SYMBOLS + LEN_MID_SYMBOLS + LEN_HIGH_SYMBOLS - 1;

/// Match lengths 2, 3, 4 and 5+ each get their own slot table.
pub const LEN_TO_POS_STATES: usize = 4;

/// Slots cover the full 32-bit distance range, two per power of two.
pub const DIST_SLOTS: usize = 64;

/// Low bits of a large distance coded through the align tree.
pub const DIST_ALIGN_BITS: u32 = 4;
/// Entries in [`DistanceModel::align`].
pub const DIST_ALIGN_SIZE: usize = 1 << DIST_ALIGN_BITS;

/// Distances below this are coded entirely with modelled bits.
pub const FULL_DISTANCES: usize = 128;

/// First distance slot that uses direct bits plus the align table.
pub const END_POS_MODEL_INDEX: usize = 14;

/// Distance value of the end-of-stream marker.
pub const END_MARKER_DISTANCE: u32 = 0xFFFF_FFFF;

/// Next state after a literal, indexed by the current state.
const AFTER_LITERAL: [u8; NUM_STATES] = [0, 0, 0, 0, 1, 2, 3, 4, 5, 6, 4, 5];

/// Which kinds of packet came last, folded into one of twelve states.
///
/// States below 7 mean the previous packet was a literal. The state picks
/// the probability used for every packet-kind bit that follows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct State(u8);

impl State {
    /// The state at the start of a stream.
    pub const fn new() -> Self {
        Self(0)
    }

    /// Index into the per-state tables.
    pub fn value(self) -> usize {
        self.0 as usize
    }

    /// Check if the previous packet was a literal.
    pub fn is_literal(self) -> bool {
        self.0 < 7
    }

    /// Advance past a literal.
    pub fn update_literal(&mut self) {
        self.0 = AFTER_LITERAL[self.value()];
    }

    /// Advance past a match with a new distance.
    pub fn update_match(&mut self) {
        self.0 = self.next(7, 10);
    }

    /// Advance past a one-byte rep 0.
    pub fn update_short_rep(&mut self) {
        self.0 = self.next(9, 11);
    }

    /// Advance past any other rep.
    pub fn update_long_rep(&mut self) {
        self.0 = self.next(8, 11);
    }

    fn next(self, after_literal: u8, after_match: u8) -> u8 {
        if self.is_literal() {
            after_literal
        } else {
            after_match
        }
    }
}

/// The `lc`/`lp`/`pb` context parameters of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LzmaProperties {
    /// High bits of the previous byte used as literal context (0-8).
    pub lc: u32,
    /// Low bits of the position used as literal context (0-4).
    pub lp: u32,
    /// Low bits of the position used as packet context (0-4).
    pub pb: u32,
}

impl LzmaProperties {
    /// Properties from the three fields, unchecked.
    pub fn new(lc: u32, lp: u32, pb: u32) -> Self {
        Self { lc, lp, pb }
    }

    /// Split a properties byte, `(pb * 5 + lp) * 9 + lc`.
    ///
    /// Returns `None` for bytes at or above [`PROPERTIES_BYTE_LIMIT`].
    pub fn from_byte(byte: u8) -> Option<Self> {
        if byte >= PROPERTIES_BYTE_LIMIT {
            return None;
        }

        let byte = u32::from(byte);
        Some(Self::new(byte % 9, byte / 9 % 5, byte / 45))
    }

    /// Pack into a properties byte.
    pub fn to_byte(&self) -> u8 {
        (self.lc + 9 * self.lp + 45 * self.pb) as u8
    }

    /// Check that every field is in range.
    pub fn is_valid(&self) -> bool {
        self.lc <= 8 && self.lp <= 4 && self.pb <= 4
    }

    /// Number of literal coders, one per `lc`/`lp` context.
    pub fn literal_states(&self) -> usize {
        1 << (self.lc + self.lp)
    }

    /// Number of `pb` contexts.
    pub fn pos_states(&self) -> usize {
        1 << self.pb
    }

    /// Mask selecting the position-state bits of a stream position.
    pub fn pos_mask(&self) -> u64 {
        (1u64 << self.pb) - 1
    }

    /// Literal coder for the byte at `pos`, given the byte before it.
    pub fn literal_state(&self, pos: u64, prev_byte: u8) -> usize {
        let low_pos = (pos & ((1u64 << self.lp) - 1)) as usize;
        let high_prev = usize::from(prev_byte) >> (8 - self.lc);
        (low_pos << self.lc) | high_prev
    }
}

impl Default for LzmaProperties {
    fn default() -> Self {
        Self::new(LC_DEFAULT, LP_DEFAULT, PB_DEFAULT)
    }
}

/// Probabilities for one length coder.
///
/// `choice` picks the short range, `choice2` then picks medium over long.
/// The short and medium trees are kept per position state.
#[derive(Debug, Clone)]
pub struct LengthModel {
    /// Short range or not.
    pub choice: u16,
    /// Medium range or long.
    pub choice2: u16,
    /// Short-range trees.
    pub low: Vec<[u16; LEN_LOW_SYMBOLS]>,
    /// Medium-range trees.
    pub mid: Vec<[u16; LEN_MID_SYMBOLS]>,
    /// Long-range tree, shared by all position states.
    pub high: [u16; LEN_HIGH_SYMBOLS],
}

impl LengthModel {
    /// Fresh tables for `pos_states` position states.
    pub fn new(pos_states: usize) -> Self {
        Self {
            choice: PROB_INIT,
            choice2: PROB_INIT,
            low: vec![[PROB_INIT; LEN_LOW_SYMBOLS]; pos_states],
            mid: vec![[PROB_INIT; LEN_MID_SYMBOLS]; pos_states],
            high: [PROB_INIT; LEN_HIGH_SYMBOLS],
        }
    }
}

/// Probabilities for literal bytes.
#[derive(Debug, Clone)]
pub struct LiteralModel {
    /// One table per literal state. Entries 1..0x100 code a plain byte,
    /// 0x100..0x300 code a byte against the match byte.
    pub probs: Vec<[u16; 0x300]>,
}

impl LiteralModel {
    /// Fresh tables for `literal_states` coders.
    pub fn new(literal_states: usize) -> Self {
        Self {
            probs: vec![[PROB_INIT; 0x300]; literal_states],
        }
    }
}

/// Probabilities for match distances.
#[derive(Debug, Clone)]
pub struct DistanceModel {
    /// Six-bit slot trees, one per [`len_state`].
    pub slot: [[u16; DIST_SLOTS]; LEN_TO_POS_STATES],
    /// Reverse bit-tree probabilities for slots 4-13, laid out flat.
    ///
    /// Node 1 of the tree for `slot` sits at `base - slot`, `base` being
    /// the slot's smallest distance. The ten trees tile the table.
    pub special: [u16; FULL_DISTANCES - END_POS_MODEL_INDEX],
    /// Reverse tree for the low bits of slots 14 and up.
    pub align: [u16; DIST_ALIGN_SIZE],
}

impl Default for DistanceModel {
    fn default() -> Self {
        Self {
            slot: [[PROB_INIT; DIST_SLOTS]; LEN_TO_POS_STATES],
            special: [PROB_INIT; FULL_DISTANCES - END_POS_MODEL_INDEX],
            align: [PROB_INIT; DIST_ALIGN_SIZE],
        }
    }
}

/// Every probability an encoder or decoder adapts, at its initial value.
///
/// The `is_*` tables code the packet kind: literal or match, then match
/// or rep, then which of the four rep distances, and for rep 0 whether
/// it is a one-byte short rep.
#[derive(Debug, Clone)]
pub struct LzmaModel {
    /// Context parameters the tables are sized for.
    pub props: LzmaProperties,

    /// Literal or match, per state and position state.
    pub is_match: [[u16; POS_STATES_MAX]; NUM_STATES],
    /// New distance or rep.
    pub is_rep: [u16; NUM_STATES],
    /// Rep 0 or a later rep.
    pub is_rep0: [u16; NUM_STATES],
    /// Rep 1 or a later rep.
    pub is_rep1: [u16; NUM_STATES],
    /// Rep 2 or rep 3.
    pub is_rep2: [u16; NUM_STATES],
    /// Short rep or a rep 0 with a coded length.
    pub is_rep0_long: [[u16; POS_STATES_MAX]; NUM_STATES],

    /// Lengths of matches with a new distance.
    pub match_len: LengthModel,
    /// Lengths of reps.
    pub rep_len: LengthModel,
    /// Literal byte trees.
    pub literal: LiteralModel,
    /// Slot, special and align trees.
    pub distance: DistanceModel,
}

impl LzmaModel {
    /// A model with every probability at its starting value.
    pub fn new(props: LzmaProperties) -> Self {
        let kind = [PROB_INIT; NUM_STATES];
        let kind_by_pos = [[PROB_INIT; POS_STATES_MAX]; NUM_STATES];

        Self {
            props,
            is_match: kind_by_pos,
            is_rep: kind,
            is_rep0: kind,
            is_rep1: kind,
            is_rep2: kind,
            is_rep0_long: kind_by_pos,
            match_len: LengthModel::new(props.pos_states()),
            rep_len: LengthModel::new(props.pos_states()),
            literal: LiteralModel::new(props.literal_states()),
            distance: DistanceModel::default(),
        }
    }
}

/// Distance slot for a zero-based match distance.
///
/// Slots 0-3 are the distance itself. Above that, the slot is twice the
/// bit length minus two, plus the bit below the top one.
pub fn dist_slot(dist: u32) -> u32 {
    if dist < 4 {
        return dist;
    }

    let top = 31 - dist.leading_zeros();
    (top << 1) | ((dist >> (top - 1)) & 1)
}

/// Position of node 1 of the reverse tree for `slot` (4..14) in
/// [`DistanceModel::special`].
pub fn special_offset(slot: u32) -> usize {
    let base = (2 | (slot & 1)) << ((slot >> 1) - 1);
    (base - slot) as usize
}

/// Slot table for a match of `len` bytes.
pub fn len_state(len: u32) -> usize {
    ((len - MATCH_LEN_MIN as u32) as usize).min(LEN_TO_POS_STATES - 1)
}
