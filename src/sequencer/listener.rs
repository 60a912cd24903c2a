//! Lifecycle callbacks for fragment sequences.

use std::sync::{Arc, Mutex};

use super::{Fragment, FragmentSequence};

/// Observer of sequence lifecycle events.
///
/// Every method has an empty default so listeners implement only what they
/// need. `on_sequence_complete` and `on_sequence_timeout` are mutually
/// exclusive for a given sequence and each fires at most once.
pub trait SequenceListener: Send {
    /// A new sequence was created.
    fn on_sequence_start(&mut self, _sequence: &FragmentSequence) {}

    /// `member` was appended to `sequence`.
    fn on_sequence_new_member(&mut self, _sequence: &FragmentSequence, _member: &Fragment) {}

    /// The sequence completed and left the active set.
    fn on_sequence_complete(&mut self, _sequence: &FragmentSequence) {}

    /// The sequence expired and left the active set.
    fn on_sequence_timeout(&mut self, _sequence: &FragmentSequence) {}
}

/// Shared listener, so the owner can inspect it after handing a clone to
/// the sequencer. A poisoned lock drops the event.
impl<L: SequenceListener> SequenceListener for Arc<Mutex<L>> {
    fn on_sequence_start(&mut self, sequence: &FragmentSequence) {
        if let Ok(mut inner) = self.lock() {
            inner.on_sequence_start(sequence);
        }
    }

    fn on_sequence_new_member(&mut self, sequence: &FragmentSequence, member: &Fragment) {
        if let Ok(mut inner) = self.lock() {
            inner.on_sequence_new_member(sequence, member);
        }
    }

    fn on_sequence_complete(&mut self, sequence: &FragmentSequence) {
        if let Ok(mut inner) = self.lock() {
            inner.on_sequence_complete(sequence);
        }
    }

    fn on_sequence_timeout(&mut self, sequence: &FragmentSequence) {
        if let Ok(mut inner) = self.lock() {
            inner.on_sequence_timeout(sequence);
        }
    }
}

/// Lifecycle event as recorded by [`EventLog`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SequenceEvent {
    Start(FragmentSequence),
    NewMember(FragmentSequence, Fragment),
    Complete(FragmentSequence),
    Timeout(FragmentSequence),
}

/// Listener that appends every event to a vector.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Vec<SequenceEvent>,
}

impl EventLog {
    /// Recorded events in order.
    #[must_use]
    pub fn events(&self) -> &[SequenceEvent] { &self.events }

    /// Remove and return the recorded events.
    pub fn drain(&mut self) -> Vec<SequenceEvent> { std::mem::take(&mut self.events) }
}

impl SequenceListener for EventLog {
    fn on_sequence_start(&mut self, sequence: &FragmentSequence) {
        self.events.push(SequenceEvent::Start(sequence.clone()));
    }

    fn on_sequence_new_member(&mut self, sequence: &FragmentSequence, member: &Fragment) {
        self.events
            .push(SequenceEvent::NewMember(sequence.clone(), member.clone()));
    }

    fn on_sequence_complete(&mut self, sequence: &FragmentSequence) {
        self.events.push(SequenceEvent::Complete(sequence.clone()));
    }

    fn on_sequence_timeout(&mut self, sequence: &FragmentSequence) {
        self.events.push(SequenceEvent::Timeout(sequence.clone()));
    }
}
