//! Logical clock driven by capture timestamps.

use crate::frame::Timestamp;

/// Monotonically non-decreasing processing time.
///
/// The clock only moves when a frame timestamp is observed, so replaying a
/// capture reproduces the same evictions as the live run did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProcessingClock {
    now: Timestamp,
}

impl ProcessingClock {
    /// Clock starting at `start`.
    #[must_use]
    pub const fn starting_at(start: Timestamp) -> Self { Self { now: start } }

    /// Current processing time.
    #[must_use]
    pub const fn now(&self) -> Timestamp { self.now }

    /// Move to `max(now, observed)` and return the new time.
    pub fn advance(&mut self, observed: Timestamp) -> Timestamp {
        self.now = self.now.max(observed);
        self.now
    }
}
