//! Bounded sliding-window read mode.
//!
//! The window keeps only the most recent contiguous bytes of a flow. Bytes
//! left of the reader's low-water mark, or older than the window capacity,
//! are discarded as soon as they are no longer needed. Bytes waiting behind
//! a gap are bounded by the capacity too: once they outgrow it the window
//! gives up on the gap and moves on.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::{Buf, Bytes, BytesMut};
use log::warn;
use tokio::sync::watch;

use super::{FlowError, stream::ReorderBuffer};
use crate::config::WindowConfig;

#[derive(Debug)]
struct WindowState {
    /// Absolute flow offset of `data[0]`.
    base: usize,
    data: BytesMut,
    capacity: usize,
    low_water: usize,
    reorder: ReorderBuffer,
    /// Set once a gap was skipped because parked bytes outgrew the capacity.
    lossy: bool,
    outcome: Option<Result<(), FlowError>>,
}

impl WindowState {
    /// Always equal to the reorder buffer's next offset.
    fn end(&self) -> usize { self.base + self.data.len() }

    /// Returns whether any byte entered the window.
    fn accept(&mut self, offset: usize, data: Bytes) -> bool {
        let chunks = self.reorder.accept(offset, data);
        for chunk in &chunks {
            self.data.extend_from_slice(chunk);
        }
        let mut released = !chunks.is_empty();
        while self.reorder.parked() > self.capacity {
            let Some(resume) = self.reorder.first_parked() else {
                break;
            };
            warn!(
                "window skipping {} missing bytes at offset {}",
                resume - self.end(),
                self.end()
            );
            self.lossy = true;
            released |= self.skip_to(resume);
        }
        self.trim();
        released
    }

    /// Restart the window at `offset`, dropping what is retained. Returns
    /// whether parked bytes became contiguous.
    fn skip_to(&mut self, offset: usize) -> bool {
        if offset <= self.end() {
            return false;
        }
        self.data.clear();
        self.base = offset;
        let chunks = self.reorder.skip_to(offset);
        for chunk in &chunks {
            self.data.extend_from_slice(chunk);
        }
        !chunks.is_empty()
    }

    fn trim(&mut self) {
        let target = self
            .low_water
            .max(self.end().saturating_sub(self.capacity));
        if target > self.base {
            let discard = (target - self.base).min(self.data.len());
            self.data.advance(discard);
            self.base += discard;
        }
    }
}

fn lock(state: &Mutex<WindowState>) -> MutexGuard<'_, WindowState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Writer half of a [`FlowWindow`], owned by the assembler.
#[derive(Debug)]
pub(crate) struct WindowSink {
    state: Arc<Mutex<WindowState>>,
    changes: watch::Sender<u64>,
}

impl WindowSink {
    pub fn new(config: WindowConfig) -> (Self, FlowWindow) {
        let state = Arc::new(Mutex::new(WindowState {
            base: 0,
            data: BytesMut::with_capacity(config.capacity),
            capacity: config.capacity,
            low_water: 0,
            reorder: ReorderBuffer::default(),
            lossy: false,
            outcome: None,
        }));
        let (changes, rx) = watch::channel(0);
        (
            Self {
                state: Arc::clone(&state),
                changes,
            },
            FlowWindow { state, changes: rx },
        )
    }

    pub fn deliver(&mut self, offset: usize, data: Bytes) {
        let released = lock(&self.state).accept(offset, data);
        if released {
            self.changes.send_modify(|version| *version += 1);
        }
    }

    pub fn finish(self, total: usize) {
        let complete = {
            let state = lock(&self.state);
            !state.lossy && state.reorder.next_offset() >= total
        };
        let outcome = if complete { Ok(()) } else { Err(FlowError::Incomplete) };
        self.close(outcome);
    }

    pub fn fail(self, err: FlowError) { self.close(Err(err)); }

    fn close(self, outcome: Result<(), FlowError>) {
        lock(&self.state).outcome = Some(outcome);
        self.changes.send_modify(|version| *version += 1);
    }
}

/// Reader half of the sliding-window mode.
///
/// Offsets are relative to the start of the flow. The retained span is
/// `base()..end()` and never exceeds the configured capacity.
#[derive(Debug)]
pub struct FlowWindow {
    state: Arc<Mutex<WindowState>>,
    changes: watch::Receiver<u64>,
}

impl FlowWindow {
    /// Offset of the first retained byte.
    #[must_use]
    pub fn base(&self) -> usize { lock(&self.state).base }

    /// Offset one past the last contiguous byte received.
    #[must_use]
    pub fn end(&self) -> usize { lock(&self.state).end() }

    /// Copy of the retained bytes.
    #[must_use]
    pub fn contents(&self) -> Bytes { Bytes::copy_from_slice(&lock(&self.state).data) }

    /// Bytes received ahead of a gap and not yet in the window.
    #[must_use]
    pub fn parked(&self) -> usize { lock(&self.state).reorder.parked() }

    /// Discard every byte before `low_water`, including bytes that have not
    /// arrived yet. The mark never moves backwards.
    pub fn advance_to(&self, low_water: usize) {
        let mut state = lock(&self.state);
        state.low_water = state.low_water.max(low_water);
        let low_water = state.low_water;
        state.skip_to(low_water);
        state.trim();
    }

    /// `None` while the flow is open, then how it ended.
    #[must_use]
    pub fn outcome(&self) -> Option<Result<(), FlowError>> { lock(&self.state).outcome }

    /// Wait until new bytes arrive or the flow ends.
    ///
    /// Returns `false` once the flow has ended and no further change can
    /// happen.
    pub async fn changed(&mut self) -> bool { self.changes.changed().await.is_ok() }
}
