//! Helpers for asserting on metrics captured by a
//! [`DebuggingRecorder`](metrics_util::debugging::DebuggingRecorder).
//!
//! Reading a snapshot resets the recorder's counters, so take one snapshot
//! per test and look every value up in it.

use metrics_util::{
    CompositeKey,
    debugging::{DebugValue, Snapshotter},
};

/// One entry of a `Snapshot::into_vec` result.
pub type SnapshotEntry = (
    CompositeKey,
    Option<::metrics::Unit>,
    Option<::metrics::SharedString>,
    DebugValue,
);

/// Take a single snapshot of everything recorded so far.
#[must_use]
pub fn snapshot(snapshotter: &Snapshotter) -> Vec<SnapshotEntry> {
    snapshotter.snapshot().into_vec()
}

/// Sum of counters named `name` whose labels include every pair in `labels`.
#[must_use]
pub fn counter_value(snapshot: &[SnapshotEntry], name: &str, labels: &[(&str, &str)]) -> u64 {
    snapshot
        .iter()
        .filter(|(key, ..)| key.key().name() == name)
        .filter(|(key, ..)| {
            labels.iter().all(|(label, value)| {
                key.key()
                    .labels()
                    .any(|l| l.key() == *label && l.value() == *value)
            })
        })
        .map(|(.., value)| match value {
            DebugValue::Counter(count) => *count,
            _ => 0,
        })
        .sum()
}
