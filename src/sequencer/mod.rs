//! Generic reassembly engine keyed by flow hash.
//!
//! A [`Sequencer`] owns every live [`FragmentSequence`] together with the
//! deadline index used to expire them. It is driven from a single place
//! (the analyzer that wraps it), so completion and timeout are decided under
//! one `&mut self` and a sequence can never leave the active set twice.
//!
//! Time only advances through [`Sequencer::advance_time`], fed by capture
//! timestamps, never by the wall clock.

pub mod clock;
pub mod error;
pub mod listener;
pub mod sequence;
mod timeout;

use std::collections::HashMap;

pub use clock::ProcessingClock;
pub use error::{AddOutcome, SequenceError};
pub use listener::{EventLog, SequenceEvent, SequenceListener};
use log::{debug, warn};
pub use sequence::{FlowHash, Fragment, FragmentSequence, SequenceFlags};
use timeout::{TimeoutKey, TimeoutQueue};

use crate::{
    config::SequencerConfig,
    frame::Timestamp,
    metrics::{self, SequenceOutcome},
};

/// Tracks in-flight sequences and expires them in flow time.
pub struct Sequencer {
    config: SequencerConfig,
    clock: ProcessingClock,
    active: HashMap<FlowHash, FragmentSequence>,
    timeouts: TimeoutQueue,
    listeners: Vec<Box<dyn SequenceListener>>,
    next_generation: u64,
}

impl Sequencer {
    /// Create an empty sequencer.
    #[must_use]
    pub fn new(config: SequencerConfig) -> Self {
        Self {
            config,
            clock: ProcessingClock::default(),
            active: HashMap::new(),
            timeouts: TimeoutQueue::default(),
            listeners: Vec::new(),
            next_generation: 0,
        }
    }

    /// Builder-style variant of [`add_listener`](Self::add_listener).
    #[must_use]
    pub fn with_listener(mut self, listener: impl SequenceListener + 'static) -> Self {
        self.add_listener(listener);
        self
    }

    /// Register a lifecycle listener.
    pub fn add_listener(&mut self, listener: impl SequenceListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Configuration in effect.
    #[must_use]
    pub const fn config(&self) -> &SequencerConfig { &self.config }

    /// Current processing time.
    #[must_use]
    pub const fn now(&self) -> Timestamp { self.clock.now() }

    /// Number of live sequences.
    #[must_use]
    pub fn len(&self) -> usize { self.active.len() }

    /// Whether no sequence is live.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.active.is_empty() }

    /// Whether a sequence for `hash` is live.
    #[must_use]
    pub fn contains(&self, hash: FlowHash) -> bool { self.active.contains_key(&hash) }

    /// Live sequence for `hash`.
    #[must_use]
    pub fn get(&self, hash: FlowHash) -> Option<&FragmentSequence> { self.active.get(&hash) }

    /// Live sequence for `hash`, created with a deadline of
    /// `now + timeout` if absent. Creation notifies `on_sequence_start`.
    pub fn get_or_create(&mut self, hash: FlowHash) -> &FragmentSequence {
        if !self.active.contains_key(&hash) {
            let now = self.clock.now();
            let generation = self.next_generation;
            self.next_generation += 1;
            let sequence = FragmentSequence::new(
                hash,
                generation,
                now,
                now.saturating_add(self.config.timeout),
            );
            self.timeouts.insert(Self::key_of(&sequence));
            for listener in &mut self.listeners {
                listener.on_sequence_start(&sequence);
            }
            self.active.insert(hash, sequence);
        }
        &self.active[&hash]
    }

    /// Append `fragment` to the sequence for `hash`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`SequenceError::LengthOverrun`] when the fragment would grow
    /// the sequence past its known total or the configured byte cap, and
    /// [`SequenceError::TotalLengthConflict`] when a last fragment announces
    /// a different total. The sequence is left unchanged in both cases.
    pub fn add_fragment(
        &mut self,
        hash: FlowHash,
        fragment: Fragment,
    ) -> Result<AddOutcome, SequenceError> {
        self.get_or_create(hash);
        let limit = self.config.max_sequence_bytes;
        let Some(sequence) = self.active.get_mut(&hash) else {
            return Ok(AddOutcome::Pending);
        };
        if sequence.is_duplicate(&fragment) {
            debug!(
                "sequence {hash}: ignoring duplicate fragment at offset {} (frame {})",
                fragment.offset, fragment.frame_number
            );
            return Ok(AddOutcome::Duplicate);
        }
        if let Err(err) = sequence.check_fits(&fragment, limit) {
            warn!("rejected fragment from frame {}: {err}", fragment.frame_number);
            return Err(err);
        }

        let member = fragment.clone();
        sequence.push(fragment);
        for listener in &mut self.listeners {
            listener.on_sequence_new_member(sequence, &member);
        }
        Ok(self.complete_if_ready(hash))
    }

    /// Announce the expected total length without marking the last
    /// fragment as seen.
    ///
    /// # Errors
    ///
    /// Returns [`SequenceError::TotalLengthConflict`] when a different total
    /// is already known and [`SequenceError::LengthOverrun`] when a member
    /// already ends past `total`.
    pub fn set_total_length(
        &mut self,
        hash: FlowHash,
        total: usize,
    ) -> Result<AddOutcome, SequenceError> {
        self.update_total(hash, total, false)
    }

    /// Announce the total length and mark the last fragment as seen.
    ///
    /// # Errors
    ///
    /// As for [`set_total_length`](Self::set_total_length).
    pub fn mark_last(&mut self, hash: FlowHash, total: usize) -> Result<AddOutcome, SequenceError> {
        self.update_total(hash, total, true)
    }

    fn update_total(
        &mut self,
        hash: FlowHash,
        total: usize,
        last: bool,
    ) -> Result<AddOutcome, SequenceError> {
        self.get_or_create(hash);
        let Some(sequence) = self.active.get_mut(&hash) else {
            return Ok(AddOutcome::Pending);
        };
        sequence.check_total(total)?;
        sequence.set_total(total, last);
        Ok(self.complete_if_ready(hash))
    }

    /// Single exit path for completion, shared by every mutating call.
    fn complete_if_ready(&mut self, hash: FlowHash) -> AddOutcome {
        if !self.active.get(&hash).is_some_and(FragmentSequence::is_complete) {
            return AddOutcome::Pending;
        }
        let Some(sequence) = self.remove_live(hash) else {
            return AddOutcome::Pending;
        };
        for listener in &mut self.listeners {
            listener.on_sequence_complete(&sequence);
        }
        metrics::inc_sequences(SequenceOutcome::Complete, 1);
        AddOutcome::Complete(sequence)
    }

    /// Move processing time to `max(now, observed)` and evict every
    /// sequence whose deadline is at or before it.
    ///
    /// Evicted sequences are returned in deadline order after
    /// `on_sequence_timeout` has fired for each.
    pub fn advance_time(&mut self, observed: Timestamp) -> Vec<FragmentSequence> {
        let now = self.clock.advance(observed);
        let mut evicted = Vec::new();
        while let Some(key) = self.timeouts.pop_expired(now) {
            let Some(sequence) = self.active.remove(&key.hash) else {
                continue;
            };
            debug!(
                "sequence {} timed out at {now} with {} of {:?} bytes",
                key.hash,
                sequence.accumulated(),
                sequence.total_length()
            );
            for listener in &mut self.listeners {
                listener.on_sequence_timeout(&sequence);
            }
            evicted.push(sequence);
        }
        if !evicted.is_empty() {
            metrics::inc_sequences(SequenceOutcome::Timeout, evicted.len() as u64);
        }
        evicted
    }

    /// Drop every live sequence without firing events.
    ///
    /// Returns the number of sequences abandoned.
    pub fn abandon_all(&mut self) -> usize {
        let count = self.active.len();
        self.active.clear();
        self.timeouts.clear();
        if count > 0 {
            debug!("abandoned {count} in-flight sequences");
            metrics::inc_sequences(SequenceOutcome::Abandoned, count as u64);
        }
        count
    }

    /// Remove the sequence for `hash` silently, e.g. after a connection reset.
    pub fn discard(&mut self, hash: FlowHash) -> Option<FragmentSequence> { self.remove_live(hash) }

    /// Remove from both the active map and the deadline index.
    fn remove_live(&mut self, hash: FlowHash) -> Option<FragmentSequence> {
        let sequence = self.active.remove(&hash)?;
        self.timeouts.remove(&Self::key_of(&sequence));
        Some(sequence)
    }

    fn key_of(sequence: &FragmentSequence) -> TimeoutKey {
        TimeoutKey {
            deadline: sequence.deadline(),
            generation: sequence.generation(),
            hash: sequence.hash(),
        }
    }
}

impl std::fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequencer")
            .field("config", &self.config)
            .field("now", &self.clock.now())
            .field("active", &self.active.len())
            .field("pending_deadlines", &self.timeouts.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
