//! Background delivery of decoded frames to subscribers.
//!
//! The controller pushes frames into a bounded channel; a single worker on
//! Tokio's blocking pool drains it and invokes subscriber callbacks in
//! order. A full channel suspends the controller's drain loop, which is the
//! only back-pressure between capture and subscribers.

use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, warn};

use crate::{
    frame::DecodedFrame,
    metrics::{self, Stage},
    panic,
};

/// Receives every delivered frame, in dispatch order.
pub trait FrameSubscriber: Send {
    /// Called on the dispatch worker for each frame.
    fn on_frame(&mut self, frame: &DecodedFrame);
}

impl<F> FrameSubscriber for F
where
    F: FnMut(&DecodedFrame) + Send,
{
    fn on_frame(&mut self, frame: &DecodedFrame) { self(frame) }
}

/// Spawn the dispatch worker.
///
/// The worker exits once every sender has been dropped and the queue is
/// empty.
pub(crate) fn spawn_worker(
    mut rx: mpsc::Receiver<DecodedFrame>,
    mut subscribers: Vec<Box<dyn FrameSubscriber>>,
) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        debug!(subscribers = subscribers.len(), "dispatch worker started");
        let mut delivered = 0_u64;
        while let Some(frame) = rx.blocking_recv() {
            for (index, subscriber) in subscribers.iter_mut().enumerate() {
                if let Err(panic) = panic::contain(|| subscriber.on_frame(&frame)) {
                    warn!(
                        subscriber = index,
                        frame = frame.number(),
                        panic = %panic,
                        "subscriber panicked"
                    );
                }
            }
            metrics::inc_frames(Stage::Dispatched);
            delivered += 1;
        }
        debug!(delivered, "dispatch worker stopped");
    })
}
