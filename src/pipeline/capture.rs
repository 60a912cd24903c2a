//! Interface to the frame source feeding a controller.

use std::{collections::VecDeque, future::Future};

use crate::frame::Frame;

/// Yields captured frames one at a time.
///
/// Real capture backends live outside this crate; they only need to hand
/// over timestamped frames. `None` means the source is exhausted.
pub trait CaptureSource: Send {
    /// Wait for the next frame.
    fn next_frame(&mut self) -> impl Future<Output = Option<Frame>> + Send;
}

/// In-memory source replaying a fixed list of frames.
///
/// ```
/// use flowframe::{
///     frame::{Frame, Timestamp},
///     pipeline::{CaptureSource, ReplaySource},
/// };
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let mut source = ReplaySource::new([Frame::new(Timestamp::ZERO, 1, vec![0_u8; 4])]);
/// assert!(source.next_frame().await.is_some());
/// assert!(source.next_frame().await.is_none());
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct ReplaySource {
    frames: VecDeque<Frame>,
}

impl ReplaySource {
    /// Replay `frames` in iteration order.
    #[must_use]
    pub fn new(frames: impl IntoIterator<Item = Frame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }

    /// Frames not yet handed out.
    #[must_use]
    pub fn remaining(&self) -> usize { self.frames.len() }
}

impl CaptureSource for ReplaySource {
    async fn next_frame(&mut self) -> Option<Frame> { self.frames.pop_front() }
}

impl FromIterator<Frame> for ReplaySource {
    fn from_iter<T: IntoIterator<Item = Frame>>(iter: T) -> Self { Self::new(iter) }
}
