//! TCP flow assembler.
//!
//! [`FlowAssembler`] turns TCP segments of tracked flows into relative
//! fragments and drives a [`Sequencer`] with them. The same accumulation
//! feeds one of three read modes per flow: a fully materialised buffer, an
//! in-order byte stream, or a bounded sliding window.

use std::{
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    task::{Context, Poll},
};

use bytes::Bytes;
use dashmap::DashMap;
use log::{debug, warn};
use tokio::sync::{mpsc, oneshot};

use super::{
    FlowError,
    FlowKey,
    SegmentEvent,
    stream::{FlowStream, StreamSink},
    window::{FlowWindow, WindowSink},
};
use crate::{
    config::{SequencerConfig, WindowConfig},
    frame::{DecodedFrame, Timestamp},
    pipeline::{AnalysisContext, Analyzer, AnalyzerError},
    sequencer::{
        AddOutcome,
        FlowHash,
        Fragment,
        FragmentSequence,
        SequenceError,
        SequenceListener,
        Sequencer,
    },
};

/// Relative offsets at or above this are treated as segments preceding the
/// sequence start.
const HALF_SEQUENCE_SPACE: u32 = 1 << 31;

/// Per-flow tracking options.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrackOptions {
    /// Expected payload length. The segment ending exactly there marks the
    /// last fragment.
    pub total_length: Option<usize>,
    /// Absolute sequence number of the first payload byte. When unset it is
    /// taken from the SYN (ISN + 1) or, failing that, from the first
    /// segment observed.
    pub sequence_start: Option<u32>,
}

impl TrackOptions {
    #[must_use]
    pub const fn with_total_length(mut self, total: usize) -> Self {
        self.total_length = Some(total);
        self
    }

    #[must_use]
    pub const fn with_sequence_start(mut self, start: u32) -> Self {
        self.sequence_start = Some(start);
        self
    }
}

/// Result of a flow picked up by [`FlowAssembler::auto_track`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletedFlow {
    pub key: FlowKey,
    pub result: Result<Bytes, FlowError>,
}

/// Fully materialised read mode, resolved once the flow completes.
#[derive(Debug)]
pub struct BufferedFlow {
    rx: oneshot::Receiver<Result<Bytes, FlowError>>,
}

impl BufferedFlow {
    /// Take the result if the flow has already ended.
    ///
    /// The result is handed out once; later calls report
    /// [`FlowError::Abandoned`].
    pub fn try_take(&mut self) -> Option<Result<Bytes, FlowError>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(FlowError::Abandoned)),
        }
    }
}

impl Future for BufferedFlow {
    type Output = Result<Bytes, FlowError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or(Err(FlowError::Abandoned)))
    }
}

enum Sink {
    Buffered(oneshot::Sender<Result<Bytes, FlowError>>),
    Auto,
    Stream(StreamSink),
    Window(WindowSink),
}

impl Sink {
    /// Whether the sequencer must keep payload bytes for this flow.
    const fn materialises(&self) -> bool { matches!(self, Self::Buffered(_) | Self::Auto) }

    fn deliver(&mut self, offset: usize, data: Bytes) {
        match self {
            Self::Stream(sink) => sink.deliver(offset, data),
            Self::Window(sink) => sink.deliver(offset, data),
            Self::Buffered(_) | Self::Auto => {}
        }
    }
}

struct TrackedFlow {
    key: FlowKey,
    options: TrackOptions,
    start: Option<u32>,
    sink: Sink,
}

impl TrackedFlow {
    fn new(key: FlowKey, options: TrackOptions, sink: Sink) -> Self {
        Self {
            key,
            options,
            start: options.sequence_start,
            sink,
        }
    }

    /// Offset of the segment's first payload byte relative to the flow
    /// start, establishing the start on first use.
    fn offset_of(&mut self, segment: &SegmentEvent) -> Option<usize> {
        let data_start = if segment.is_syn() {
            segment.sequence.wrapping_add(1)
        } else {
            segment.sequence
        };
        let start = *self.start.get_or_insert(data_start);
        let relative = data_start.wrapping_sub(start);
        if relative >= HALF_SEQUENCE_SPACE {
            return None;
        }
        usize::try_from(relative).ok()
    }

    fn complete(self, sequence: &FragmentSequence, completions: Option<&Completions>) {
        let total = sequence.total_length().unwrap_or(sequence.accumulated());
        match self.sink {
            Sink::Buffered(tx) => {
                let _ = tx.send(materialise(self.key, sequence));
            }
            Sink::Auto => {
                if let Some(completions) = completions {
                    let _ = completions.send(CompletedFlow {
                        key: self.key,
                        result: materialise(self.key, sequence),
                    });
                }
            }
            Sink::Stream(sink) => sink.finish(total),
            Sink::Window(sink) => sink.finish(total),
        }
    }

    fn fail(self, err: FlowError, completions: Option<&Completions>) {
        match self.sink {
            Sink::Buffered(tx) => {
                let _ = tx.send(Err(err));
            }
            Sink::Auto => {
                if let Some(completions) = completions {
                    let _ = completions.send(CompletedFlow {
                        key: self.key,
                        result: Err(err),
                    });
                }
            }
            Sink::Stream(sink) => sink.fail(err),
            Sink::Window(sink) => sink.fail(err),
        }
    }
}

fn materialise(key: FlowKey, sequence: &FragmentSequence) -> Result<Bytes, FlowError> {
    sequence.reassemble().map_err(|err| {
        warn!("flow {key} completed but could not be laid out: {err}");
        FlowError::Incomplete
    })
}

type Completions = mpsc::UnboundedSender<CompletedFlow>;

struct Core {
    sequencer: Sequencer,
    completions: Option<Completions>,
}

/// Reassembles the payload of tracked TCP flows.
///
/// The assembler is a cheap cloneable handle: register one clone with a
/// [`Controller`](crate::pipeline::Controller) and keep another to track
/// flows. Flows are directional; track [`FlowKey::reversed`] as well to
/// capture both halves of a conversation.
///
/// Sequencer limits apply to every read mode, including the ones that do
/// not keep payload bytes; raise
/// [`max_sequence_bytes`](SequencerConfig::max_sequence_bytes) for long
/// streamed flows.
#[derive(Clone)]
pub struct FlowAssembler {
    core: Arc<Mutex<Core>>,
    flows: Arc<DashMap<FlowHash, TrackedFlow>>,
    window: WindowConfig,
}

impl FlowAssembler {
    /// Assembler with its own sequencer.
    #[must_use]
    pub fn new(config: SequencerConfig) -> Self {
        Self {
            core: Arc::new(Mutex::new(Core {
                sequencer: Sequencer::new(config),
                completions: None,
            })),
            flows: Arc::new(DashMap::new()),
            window: WindowConfig::default(),
        }
    }

    /// Window settings used by later [`track_window`](Self::track_window)
    /// calls.
    #[must_use]
    pub const fn with_window_config(mut self, window: WindowConfig) -> Self {
        self.window = window;
        self
    }

    /// Observe the lifecycle of every underlying sequence.
    #[must_use]
    pub fn with_listener(self, listener: impl SequenceListener + 'static) -> Self {
        self.lock_core().sequencer.add_listener(listener);
        self
    }

    fn lock_core(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn track(&self, key: FlowKey, options: TrackOptions, sink: Sink) {
        let hash = key.hash();
        if self
            .flows
            .insert(hash, TrackedFlow::new(key, options, sink))
            .is_some()
        {
            debug!("flow {key} re-tracked; previous reader detached");
        }
    }

    /// Track `key` and resolve with its whole payload once complete.
    #[must_use]
    pub fn track_buffered(&self, key: FlowKey, options: TrackOptions) -> BufferedFlow {
        let (tx, rx) = oneshot::channel();
        self.track(key, options, Sink::Buffered(tx));
        BufferedFlow { rx }
    }

    /// Track `key` and yield its payload as in-order chunks.
    #[must_use]
    pub fn track_stream(&self, key: FlowKey, options: TrackOptions) -> FlowStream {
        let (sink, stream) = StreamSink::new();
        self.track(key, options, Sink::Stream(sink));
        stream
    }

    /// Track `key` through a bounded sliding window.
    #[must_use]
    pub fn track_window(&self, key: FlowKey, options: TrackOptions) -> FlowWindow {
        let (sink, window) = WindowSink::new(self.window);
        self.track(key, options, Sink::Window(sink));
        window
    }

    /// Track every new flow in buffered mode and report each outcome on
    /// the returned channel.
    ///
    /// A flow is picked up at its SYN or its first payload-carrying
    /// segment. Calling this again replaces the previous channel.
    pub fn auto_track(&self) -> mpsc::UnboundedReceiver<CompletedFlow> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock_core().completions = Some(tx);
        rx
    }

    /// Stop tracking `key`. Its reader is detached without a result.
    pub fn untrack(&self, key: &FlowKey) -> bool {
        let hash = key.hash();
        let mut core = self.lock_core();
        let removed = self.flows.remove(&hash).is_some();
        if removed {
            core.sequencer.discard(hash);
        }
        removed
    }

    /// Number of flows being tracked.
    #[must_use]
    pub fn tracked(&self) -> usize { self.flows.len() }

    /// Number of live sequences.
    #[must_use]
    pub fn in_flight(&self) -> usize { self.lock_core().sequencer.len() }

    /// Feed one segment.
    ///
    /// Segments of untracked flows are ignored unless auto tracking is on.
    /// A RST ends the flow with [`FlowError::Incomplete`].
    ///
    /// # Errors
    ///
    /// Returns an error when the sequencer rejects the segment, for example
    /// because it overruns the known flow length.
    pub fn on_segment(&self, segment: SegmentEvent) -> Result<(), AnalyzerError> {
        let hash = segment.key.hash();
        let mut core = self.lock_core();
        if !self.flows.contains_key(&hash) {
            let opens_flow = segment.is_syn() || !segment.payload.is_empty();
            if core.completions.is_none() || segment.is_rst() || !opens_flow {
                return Ok(());
            }
            self.flows.insert(
                hash,
                TrackedFlow::new(segment.key, TrackOptions::default(), Sink::Auto),
            );
        }

        if segment.is_rst() {
            core.sequencer.discard(hash);
            if let Some((_, flow)) = self.flows.remove(&hash) {
                debug!("flow {} reset at frame {}", flow.key, segment.frame_number);
                flow.fail(FlowError::Incomplete, core.completions.as_ref());
            }
            return Ok(());
        }

        let frame_number = segment.frame_number;
        let step = {
            let Some(mut flow) = self.flows.get_mut(&hash) else {
                return Ok(());
            };
            let Some(offset) = flow.offset_of(&segment) else {
                debug!(
                    "flow {}: ignoring segment before the sequence start (frame {frame_number})",
                    flow.key
                );
                return Ok(());
            };
            Self::apply(&mut core.sequencer, hash, &mut *flow, offset, segment)
        };

        match step {
            Ok(AddOutcome::Complete(sequence)) => {
                if let Some((_, flow)) = self.flows.remove(&hash) {
                    debug!(
                        "flow {} complete with {} bytes",
                        flow.key,
                        sequence.accumulated()
                    );
                    flow.complete(&sequence, core.completions.as_ref());
                }
                Ok(())
            }
            Ok(AddOutcome::Pending | AddOutcome::Duplicate) => Ok(()),
            Err(err) => Err(AnalyzerError::new(
                format!("segment in frame {frame_number} rejected"),
                err,
            )),
        }
    }

    fn apply(
        sequencer: &mut Sequencer,
        hash: FlowHash,
        flow: &mut TrackedFlow,
        offset: usize,
        segment: SegmentEvent,
    ) -> Result<AddOutcome, SequenceError> {
        sequencer.get_or_create(hash);
        if let Some(total) = flow.options.total_length
            && sequencer
                .get(hash)
                .is_some_and(|sequence| sequence.total_length().is_none())
        {
            sequencer.set_total_length(hash, total)?;
        }

        let length = segment.payload.len();
        if length == 0 {
            return if segment.is_fin() {
                sequencer.mark_last(hash, offset)
            } else {
                Ok(AddOutcome::Pending)
            };
        }

        let fragment = if flow.sink.materialises() {
            Fragment::with_data(
                segment.frame_number,
                segment.timestamp,
                offset,
                segment.payload.clone(),
            )
        } else {
            Fragment::without_data(segment.frame_number, segment.timestamp, offset, length)
        };
        let last = segment.is_fin() || flow.options.total_length == Some(offset + length);
        let fragment = if last { fragment.last() } else { fragment };

        let outcome = sequencer.add_fragment(hash, fragment)?;
        if !matches!(outcome, AddOutcome::Duplicate) {
            flow.sink.deliver(offset, segment.payload);
        }
        Ok(outcome)
    }

    /// Move flow time to `now`, failing every flow whose sequence expired
    /// with [`FlowError::TimedOut`]. Returns the number of expired
    /// sequences.
    pub fn expire(&self, now: Timestamp) -> usize {
        let core = &mut *self.lock_core();
        let evicted = core.sequencer.advance_time(now);
        for sequence in &evicted {
            if let Some((_, flow)) = self.flows.remove(&sequence.hash()) {
                debug!("flow {} timed out at {now}", flow.key);
                flow.fail(FlowError::TimedOut, core.completions.as_ref());
            }
        }
        evicted.len()
    }

    /// Drop every in-flight sequence without completing it and fail every
    /// tracked flow with [`FlowError::Abandoned`]. Also closes the
    /// auto-tracking channel. Returns the number of flows failed.
    pub fn abandon(&self) -> usize {
        let core = &mut *self.lock_core();
        core.sequencer.abandon_all();
        let hashes: Vec<FlowHash> = self.flows.iter().map(|entry| *entry.key()).collect();
        let mut failed = 0;
        for hash in hashes {
            if let Some((_, flow)) = self.flows.remove(&hash) {
                flow.fail(FlowError::Abandoned, core.completions.as_ref());
                failed += 1;
            }
        }
        core.completions = None;
        failed
    }
}

impl Analyzer for FlowAssembler {
    fn name(&self) -> &str { "tcp-flow-assembler" }

    fn analyze(
        &mut self,
        frame: &DecodedFrame,
        _ctx: &mut AnalysisContext,
    ) -> Result<(), AnalyzerError> {
        match SegmentEvent::from_frame(frame) {
            Some(segment) => self.on_segment(segment),
            None => Ok(()),
        }
    }

    fn advance_time(&mut self, now: Timestamp) { self.expire(now); }

    fn shutdown(&mut self) {
        let failed = self.abandon();
        if failed > 0 {
            debug!("abandoned {failed} tracked flows at shutdown");
        }
    }
}

impl std::fmt::Debug for FlowAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowAssembler")
            .field("tracked", &self.flows.len())
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}
