//! Frame ordering, analysis and dispatch.
//!
//! A [`Controller`] moves every frame through
//! `arrived → ordered(inbound) → analyzed → ordered(outbound) → dispatched`.
//! Both ordering stages are min-heaps on `(timestamp, frame number)`.
//! Analysis runs inline on the caller's task; delivery to subscribers runs
//! on a single background worker fed by a bounded queue.

pub mod analyzer;
pub mod builder;
pub mod capture;
pub mod dispatch;
pub mod error;
pub mod hold;
mod ordering;

pub use analyzer::{AnalysisContext, Analyzer, AnalyzerError};
pub use builder::ControllerBuilder;
pub use capture::{CaptureSource, ReplaySource};
pub use dispatch::FrameSubscriber;
pub use error::{PipelineConfigError, PipelineError};
pub use hold::HoldHandle;
pub use ordering::OrderKey;
use ordering::OrderingQueue;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use self::analyzer::AnalyzerTable;
use crate::{
    chain::HeaderScanner,
    config::PipelineConfig,
    frame::{DecodedFrame, Frame, Timestamp},
    metrics::{self, Stage},
    panic::format_panic,
    sequencer::ProcessingClock,
};

/// Central pipeline instance.
///
/// Create one with [`Controller::builder`], feed it with
/// [`next_frame`](Self::next_frame) or [`run`](Self::run), and finish with
/// [`shutdown`](Self::shutdown). Frames enqueued before a drain cycle are
/// delivered in `(timestamp, frame number)` order; ordering across drain
/// cycles is not guaranteed.
pub struct Controller {
    scanner: HeaderScanner,
    analyzers: AnalyzerTable,
    inbound: OrderingQueue<Frame>,
    outbound: OrderingQueue<DecodedFrame>,
    hold: HoldHandle,
    config: PipelineConfig,
    clock: ProcessingClock,
    tx: Option<mpsc::Sender<DecodedFrame>>,
    worker: Option<JoinHandle<()>>,
}

impl Controller {
    /// Start configuring a controller.
    pub fn builder() -> ControllerBuilder { ControllerBuilder::new() }

    /// Ingest one frame.
    ///
    /// Advances processing time to the frame's timestamp (never backwards),
    /// lets every analyzer observe the new time, then drains the inbound
    /// heap through analysis and the outbound heap into the dispatch queue.
    /// Waits while the dispatch queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::WorkerStopped`] if the dispatch worker has
    /// exited.
    pub async fn next_frame(&mut self, frame: Frame) -> Result<(), PipelineError> {
        let now = self.clock.advance(frame.timestamp);
        self.analyzers.advance_time(now);
        metrics::inc_frames(Stage::Ingested);
        let size = frame.buffer.len();
        self.inbound.push(frame.order_key(), size, frame);
        self.drain_inbound();
        self.drain_outbound(false).await
    }

    /// Re-run the outbound drain, e.g. after [`release`](Self::release).
    ///
    /// # Errors
    ///
    /// As for [`next_frame`](Self::next_frame).
    pub async fn flush(&mut self) -> Result<(), PipelineError> { self.drain_outbound(false).await }

    /// Suspend dispatch. Returns the new hold count.
    pub fn hold(&self) -> isize { self.hold.hold() }

    /// Undo one [`hold`](Self::hold). Returns the new hold count.
    ///
    /// Held frames go out on the next [`next_frame`](Self::next_frame) or
    /// [`flush`](Self::flush); use
    /// [`release_and_flush`](Self::release_and_flush) to send them at once.
    pub fn release(&self) -> isize { self.hold.release() }

    /// Undo one [`hold`](Self::hold) and, if that lifts the last one, queue
    /// every held frame for delivery. Returns the new hold count.
    ///
    /// # Errors
    ///
    /// As for [`next_frame`](Self::next_frame).
    pub async fn release_and_flush(&mut self) -> Result<isize, PipelineError> {
        let count = self.hold.release();
        self.drain_outbound(false).await?;
        Ok(count)
    }

    /// Cloneable handle on the hold counter.
    #[must_use]
    pub fn hold_handle(&self) -> HoldHandle { self.hold.clone() }

    /// Current processing time.
    #[must_use]
    pub const fn now(&self) -> Timestamp { self.clock.now() }

    /// Frames analyzed but not yet handed to the dispatch queue.
    #[must_use]
    pub fn pending_outbound(&self) -> usize { self.outbound.len() }

    /// Wire bytes held in the outbound heap.
    #[must_use]
    pub fn buffered_bytes(&self) -> usize { self.outbound.bytes() }

    /// Settings the controller was built with.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig { &self.config }

    /// Feed frames from `source` until it is exhausted or `stop` is
    /// cancelled. Returns the number of frames ingested.
    ///
    /// Frames still held are left in place; call [`flush`](Self::flush) or
    /// [`shutdown`](Self::shutdown) afterwards.
    ///
    /// # Errors
    ///
    /// As for [`next_frame`](Self::next_frame).
    pub async fn run<S>(&mut self, mut source: S, stop: CancellationToken) -> Result<u64, PipelineError>
    where
        S: CaptureSource,
    {
        let mut ingested = 0_u64;
        loop {
            let next = tokio::select! {
                biased;
                () = stop.cancelled() => {
                    debug!(ingested, "capture stopped");
                    break;
                }
                next = source.next_frame() => next,
            };
            let Some(frame) = next else {
                debug!(ingested, "capture source exhausted");
                break;
            };
            self.next_frame(frame).await?;
            ingested += 1;
        }
        Ok(ingested)
    }

    /// Drain both heaps regardless of hold, stop analyzers, then wait for
    /// the dispatch worker to deliver everything queued.
    ///
    /// In-flight reassembly sequences are abandoned, never completed.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::WorkerStopped`] if frames could not be
    /// queued and [`PipelineError::WorkerPanicked`] if the worker task
    /// panicked.
    pub async fn shutdown(mut self) -> Result<(), PipelineError> {
        self.drain_inbound();
        let drained = self.drain_outbound(true).await;
        self.analyzers.shutdown();
        drop(self.tx.take());
        let joined = match self.worker.take() {
            Some(worker) => worker.await,
            None => Ok(()),
        };
        debug!("controller shut down");
        drained?;
        joined.map_err(|err| {
            if err.is_panic() {
                PipelineError::WorkerPanicked(format_panic(err.into_panic()).to_string())
            } else {
                PipelineError::WorkerStopped
            }
        })
    }

    fn drain_inbound(&mut self) {
        while let Some(frame) = self.inbound.pop() {
            let mut decoded = frame.decode(&self.scanner);
            self.analyzers.dispatch(&mut decoded, self.clock.now());
            metrics::inc_frames(Stage::Analyzed);
            let key = (decoded.timestamp(), decoded.number());
            let size = decoded.wire_len();
            self.outbound.push(key, size, decoded);
        }
    }

    /// Move frames into the dispatch queue while not held, while the byte
    /// budget is exceeded, or unconditionally when `force` is set.
    async fn drain_outbound(&mut self, force: bool) -> Result<(), PipelineError> {
        let result = self.drain_outbound_inner(force).await;
        metrics::set_outbound_bytes(self.outbound.bytes());
        result
    }

    async fn drain_outbound_inner(&mut self, force: bool) -> Result<(), PipelineError> {
        while force || !self.hold.is_held() || self.outbound.bytes() > self.config.byte_budget {
            let Some(frame) = self.outbound.pop() else {
                break;
            };
            if !self.config.delivery.admits(frame.is_consumed()) {
                metrics::inc_frames(Stage::Filtered);
                continue;
            }
            let tx = self.tx.as_ref().ok_or(PipelineError::WorkerStopped)?;
            tx.send(frame)
                .await
                .map_err(|_| PipelineError::WorkerStopped)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("analyzers", &self.analyzers)
            .field("now", &self.clock.now())
            .field("pending_outbound", &self.outbound.len())
            .field("hold", &self.hold.count())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
