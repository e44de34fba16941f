//! Core traits for chunked decoding.
//!
//! A [`ChunkDecoder`] is driven by a caller that owns fixed-size input and
//! output buffers. Each call consumes some prefix of the offered input and
//! fills some prefix of the offered output, and reports why it stopped.

use crate::error::Result;

/// How a decode call may stop once its output buffer is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FinishMode {
    /// Stopping at the output limit is fine; more output may follow.
    #[default]
    Any,
    /// The output limit is the end of the stream. Anything other than a
    /// clean end there is an error.
    End,
}

/// Why a decode call returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStatus {
    /// All offered input was used and more is required to continue.
    NeedsMoreInput,
    /// The output buffer filled before the stream ended.
    NotFinished,
    /// The end marker was decoded.
    FinishedWithMark,
    /// The output limit was reached and the range coder is drained, so the
    /// stream may legitimately end here without a marker.
    MaybeFinishedWithoutMark,
}

impl DecodeStatus {
    /// Check if the decoder reached a state where the stream may end.
    pub fn is_final(self) -> bool {
        matches!(self, Self::FinishedWithMark | Self::MaybeFinishedWithoutMark)
    }
}

/// Outcome of a single [`ChunkDecoder::decode_chunk`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkProgress {
    /// Bytes consumed from the input slice.
    pub consumed: usize,
    /// Bytes written to the output slice.
    pub produced: usize,
    /// Why the call returned.
    pub status: DecodeStatus,
}

impl ChunkProgress {
    /// Check if the call neither consumed nor produced anything.
    pub fn is_stall(&self) -> bool {
        self.consumed == 0 && self.produced == 0
    }
}

/// A resumable decoder that works on caller-supplied buffers.
pub trait ChunkDecoder {
    /// Decode from `input` into `output`.
    ///
    /// `output.len()` is the output budget for this call. With
    /// [`FinishMode::End`] the budget is the exact number of bytes left in
    /// the stream.
    fn decode_chunk(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        finish: FinishMode,
    ) -> Result<ChunkProgress>;

    /// Total bytes produced since creation.
    fn total_out(&self) -> u64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_mode_default() {
        assert_eq!(FinishMode::default(), FinishMode::Any);
    }

    #[test]
    fn test_status_is_final() {
        assert!(DecodeStatus::FinishedWithMark.is_final());
        assert!(DecodeStatus::MaybeFinishedWithoutMark.is_final());
        assert!(!DecodeStatus::NeedsMoreInput.is_final());
        assert!(!DecodeStatus::NotFinished.is_final());
    }

    #[test]
    fn test_stall_detection() {
        let progress = ChunkProgress {
            consumed: 0,
            produced: 0,
            status: DecodeStatus::NeedsMoreInput,
        };
        assert!(progress.is_stall());

        let progress = ChunkProgress {
            consumed: 3,
            ..progress
        };
        assert!(!progress.is_stall());
    }
}
