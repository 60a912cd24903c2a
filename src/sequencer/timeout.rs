//! Deadline-ordered index over live sequences.

use std::collections::BTreeSet;

use super::FlowHash;
use crate::frame::Timestamp;

/// Key under which a sequence sits in the [`TimeoutQueue`].
///
/// The generation disambiguates sequences that reuse a hash after an
/// earlier one with the same hash left the active set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct TimeoutKey {
    pub deadline: Timestamp,
    pub generation: u64,
    pub hash: FlowHash,
}

/// Live sequences ordered by deadline, then creation order.
#[derive(Debug, Default)]
pub(crate) struct TimeoutQueue {
    keys: BTreeSet<TimeoutKey>,
}

impl TimeoutQueue {
    pub fn insert(&mut self, key: TimeoutKey) -> bool { self.keys.insert(key) }

    pub fn remove(&mut self, key: &TimeoutKey) -> bool { self.keys.remove(key) }

    /// Pop the earliest key whose deadline is at or before `now`.
    pub fn pop_expired(&mut self, now: Timestamp) -> Option<TimeoutKey> {
        let first = *self.keys.first()?;
        if first.deadline > now {
            return None;
        }
        self.keys.pop_first()
    }

    pub fn len(&self) -> usize { self.keys.len() }

    pub fn clear(&mut self) { self.keys.clear(); }
}
