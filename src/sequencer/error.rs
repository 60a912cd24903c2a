//! Error and status types emitted by the sequencer.

use thiserror::Error;

use super::{FlowHash, FragmentSequence};

/// Result of feeding a fragment or a length hint into a
/// [`Sequencer`](crate::sequencer::Sequencer).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AddOutcome {
    /// The sequence is still waiting for data or for its last fragment.
    Pending,
    /// The fragment repeated an existing member and was ignored.
    Duplicate,
    /// The sequence completed and left the active set.
    Complete(FragmentSequence),
}

impl AddOutcome {
    /// Whether the call completed the sequence.
    #[must_use]
    pub const fn is_complete(&self) -> bool { matches!(self, Self::Complete(_)) }

    /// Take the completed sequence, if any.
    #[must_use]
    pub fn into_complete(self) -> Option<FragmentSequence> {
        match self {
            Self::Complete(sequence) => Some(sequence),
            _ => None,
        }
    }
}

/// Errors produced while accumulating or reassembling a sequence.
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SequenceError {
    /// The fragment would extend the sequence beyond its known or permitted
    /// length.
    #[error("sequence {hash}: fragment ending at {end} exceeds limit {limit}")]
    LengthOverrun {
        hash: FlowHash,
        end: usize,
        limit: usize,
    },
    /// A second, different total length was announced.
    #[error("sequence {hash}: total length {proposed} conflicts with {existing}")]
    TotalLengthConflict {
        hash: FlowHash,
        existing: usize,
        proposed: usize,
    },
    /// Reassembly found bytes missing at `offset`.
    #[error("sequence {hash}: no data covers offset {offset}")]
    Gap { hash: FlowHash, offset: usize },
    /// A member was tracked without its payload bytes.
    #[error("sequence {hash}: frame {frame_number} carries no payload bytes")]
    MissingPayload { hash: FlowHash, frame_number: u64 },
}
