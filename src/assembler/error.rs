//! Errors reported to flow readers.

use thiserror::Error;

/// Why a tracked flow ended without yielding all of its bytes.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum FlowError {
    /// The underlying sequence reached its flow-time deadline.
    #[error("flow timed out before it completed")]
    TimedOut,
    /// The assembler shut down while the flow was in flight.
    #[error("flow abandoned at shutdown")]
    Abandoned,
    /// The flow was reset or could not be laid out contiguously.
    #[error("flow ended with bytes missing")]
    Incomplete,
}
