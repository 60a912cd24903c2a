//! Metric helpers for `flowframe`.
//!
//! This module defines metric names and simple helper functions
//! wrapping the [`metrics`](https://docs.rs/metrics) crate. Without the
//! `metrics` feature every helper is a no-op.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Name of the counter tracking frames moving through the pipeline.
pub const FRAMES_PROCESSED: &str = "flowframe_frames_processed_total";
/// Name of the counter tracking failed or panicking analyzer invocations.
pub const ANALYZER_FAILURES: &str = "flowframe_analyzer_failures_total";
/// Name of the counter tracking finished fragment sequences.
pub const SEQUENCES_TOTAL: &str = "flowframe_sequences_total";
/// Name of the gauge tracking bytes waiting in the outbound ordering stage.
pub const OUTBOUND_BUFFERED_BYTES: &str = "flowframe_outbound_buffered_bytes";

/// Pipeline stage a frame has passed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    /// Frame was handed to the controller.
    Ingested,
    /// Frame went through analyzer dispatch.
    Analyzed,
    /// Frame was delivered to subscribers.
    Dispatched,
    /// Frame was withheld by the delivery filter.
    Filtered,
}

impl Stage {
    #[cfg_attr(not(feature = "metrics"), allow(dead_code))]
    fn as_str(self) -> &'static str {
        match self {
            Stage::Ingested => "ingested",
            Stage::Analyzed => "analyzed",
            Stage::Dispatched => "dispatched",
            Stage::Filtered => "filtered",
        }
    }
}

/// How a fragment sequence left the active set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SequenceOutcome {
    Complete,
    Timeout,
    Abandoned,
}

impl SequenceOutcome {
    #[cfg_attr(not(feature = "metrics"), allow(dead_code))]
    fn as_str(self) -> &'static str {
        match self {
            SequenceOutcome::Complete => "complete",
            SequenceOutcome::Timeout => "timeout",
            SequenceOutcome::Abandoned => "abandoned",
        }
    }
}

/// Record a frame passing `stage`.
pub fn inc_frames(stage: Stage) {
    #[cfg(feature = "metrics")]
    counter!(FRAMES_PROCESSED, "stage" => stage.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = stage;
}

/// Record a failed analyzer invocation.
pub fn inc_analyzer_failures() {
    #[cfg(feature = "metrics")]
    counter!(ANALYZER_FAILURES).increment(1);
}

/// Record `count` sequences finishing with `outcome`.
pub fn inc_sequences(outcome: SequenceOutcome, count: u64) {
    #[cfg(feature = "metrics")]
    counter!(SEQUENCES_TOTAL, "outcome" => outcome.as_str()).increment(count);
    #[cfg(not(feature = "metrics"))]
    let _ = (outcome, count);
}

/// Publish the number of bytes held in the outbound stage.
pub fn set_outbound_bytes(bytes: usize) {
    #[cfg(feature = "metrics")]
    #[expect(
        clippy::cast_precision_loss,
        reason = "gauge values are approximate by nature"
    )]
    gauge!(OUTBOUND_BUFFERED_BYTES).set(bytes as f64);
    #[cfg(not(feature = "metrics"))]
    let _ = bytes;
}
