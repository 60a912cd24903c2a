//! Incremental byte-stream read mode.

use std::{
    collections::{BTreeMap, btree_map::Entry},
    pin::Pin,
    task::{Context, Poll},
};

use bytes::Bytes;
use futures::Stream;
use tokio::sync::mpsc;

use super::FlowError;

/// Turns out-of-order segments into in-order contiguous chunks.
#[derive(Debug, Default)]
pub(crate) struct ReorderBuffer {
    next: usize,
    pending: BTreeMap<usize, Bytes>,
    parked: usize,
}

impl ReorderBuffer {
    /// Offset of the first byte not yet released.
    pub fn next_offset(&self) -> usize { self.next }

    /// Bytes parked ahead of a gap.
    pub fn parked(&self) -> usize { self.parked }

    /// Offset of the nearest parked chunk.
    pub fn first_parked(&self) -> Option<usize> {
        self.pending.first_key_value().map(|(offset, _)| *offset)
    }

    /// Accept `data` at `offset` and return every chunk that is now
    /// contiguous, in order. Bytes already released are dropped.
    pub fn accept(&mut self, offset: usize, data: Bytes) -> Vec<Bytes> {
        if data.is_empty() || offset + data.len() <= self.next {
            return Vec::new();
        }
        if offset > self.next {
            match self.pending.entry(offset) {
                Entry::Vacant(slot) => {
                    self.parked += data.len();
                    slot.insert(data);
                }
                Entry::Occupied(mut slot) if slot.get().len() < data.len() => {
                    self.parked += data.len() - slot.get().len();
                    slot.insert(data);
                }
                Entry::Occupied(_) => {}
            }
            return Vec::new();
        }

        let mut ready = Vec::new();
        self.release(offset, data, &mut ready);
        self.drain(&mut ready);
        ready
    }

    /// Give up on every byte before `offset` and return the chunks that
    /// become contiguous from there.
    pub fn skip_to(&mut self, offset: usize) -> Vec<Bytes> {
        let mut ready = Vec::new();
        if offset > self.next {
            self.next = offset;
            self.drain(&mut ready);
        }
        ready
    }

    fn drain(&mut self, ready: &mut Vec<Bytes>) {
        while let Some(parked) = self.pending.first_entry() {
            if *parked.key() > self.next {
                break;
            }
            let (start, chunk) = parked.remove_entry();
            self.parked -= chunk.len();
            self.release(start, chunk, ready);
        }
    }

    fn release(&mut self, offset: usize, data: Bytes, ready: &mut Vec<Bytes>) {
        let end = offset + data.len();
        if end > self.next {
            ready.push(data.slice(self.next - offset..));
            self.next = end;
        }
    }
}

/// Writer half of a [`FlowStream`], owned by the assembler.
#[derive(Debug)]
pub(crate) struct StreamSink {
    tx: mpsc::UnboundedSender<Result<Bytes, FlowError>>,
    reorder: ReorderBuffer,
}

impl StreamSink {
    pub fn new() -> (Self, FlowStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                reorder: ReorderBuffer::default(),
            },
            FlowStream { rx },
        )
    }

    pub fn deliver(&mut self, offset: usize, data: Bytes) {
        for chunk in self.reorder.accept(offset, data) {
            // A dropped reader just stops caring about the flow.
            let _ = self.tx.send(Ok(chunk));
        }
    }

    /// End the stream. Ends cleanly only if every byte up to `total` was
    /// released.
    pub fn finish(self, total: usize) {
        if self.reorder.next_offset() < total {
            let _ = self.tx.send(Err(FlowError::Incomplete));
        }
    }

    pub fn fail(self, err: FlowError) { let _ = self.tx.send(Err(err)); }
}

/// Contiguous payload chunks of a tracked flow, in order.
///
/// The stream suspends until the next contiguous range is available and
/// ends after the flow completes. A flow that times out or is abandoned
/// yields one final `Err`.
#[derive(Debug)]
pub struct FlowStream {
    rx: mpsc::UnboundedReceiver<Result<Bytes, FlowError>>,
}

impl Stream for FlowStream {
    type Item = Result<Bytes, FlowError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
