//! Subscribers and listeners that remember what they were given.

use std::sync::{Arc, Mutex, PoisonError};

use flowframe::{
    DecodedFrame,
    FrameSubscriber,
    Fragment,
    FragmentSequence,
    SequenceListener,
    sequencer::{EventLog, SequenceEvent},
};

/// Cloneable subscriber collecting every dispatched frame.
#[derive(Clone, Debug, Default)]
pub struct RecordingSubscriber {
    frames: Arc<Mutex<Vec<DecodedFrame>>>,
}

impl RecordingSubscriber {
    /// Frames received so far, in delivery order.
    pub fn frames(&self) -> Vec<DecodedFrame> {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Capture numbers of the frames received so far.
    pub fn numbers(&self) -> Vec<u64> { self.frames().iter().map(DecodedFrame::number).collect() }

    pub fn len(&self) -> usize {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl FrameSubscriber for RecordingSubscriber {
    fn on_frame(&mut self, frame: &DecodedFrame) {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(frame.clone());
    }
}

/// Cloneable sequence listener backed by a shared [`EventLog`].
#[derive(Clone, Debug, Default)]
pub struct RecordingListener {
    log: Arc<Mutex<EventLog>>,
}

impl RecordingListener {
    /// Remove and return the events seen so far.
    pub fn drain(&self) -> Vec<SequenceEvent> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
    }

    /// Number of recorded events matching `pred`.
    pub fn count(&self, pred: impl Fn(&SequenceEvent) -> bool) -> usize {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .events()
            .iter()
            .filter(|event| pred(event))
            .count()
    }

    fn with_log(&self, f: impl FnOnce(&mut EventLog)) {
        f(&mut self.log.lock().unwrap_or_else(PoisonError::into_inner));
    }
}

impl SequenceListener for RecordingListener {
    fn on_sequence_start(&mut self, sequence: &FragmentSequence) {
        self.with_log(|log| log.on_sequence_start(sequence));
    }

    fn on_sequence_new_member(&mut self, sequence: &FragmentSequence, member: &Fragment) {
        self.with_log(|log| log.on_sequence_new_member(sequence, member));
    }

    fn on_sequence_complete(&mut self, sequence: &FragmentSequence) {
        self.with_log(|log| log.on_sequence_complete(sequence));
    }

    fn on_sequence_timeout(&mut self, sequence: &FragmentSequence) {
        self.with_log(|log| log.on_sequence_timeout(sequence));
    }
}
