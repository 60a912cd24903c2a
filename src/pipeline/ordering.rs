//! Min-heap ordering frames by capture time, then frame number.

use std::{
    cmp::{Ordering, Reverse},
    collections::BinaryHeap,
};

use crate::frame::Timestamp;

/// Ordering key: capture timestamp, then frame number.
pub type OrderKey = (Timestamp, u64);

struct Entry<T> {
    key: OrderKey,
    /// Insertion counter; keeps frames with equal keys in arrival order.
    seq: u64,
    size: usize,
    item: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool { (self.key, self.seq) == (other.key, other.seq) }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> Ordering { (self.key, self.seq).cmp(&(other.key, other.seq)) }
}

/// Ordering stage used for both the inbound and outbound side of the
/// controller. Tracks the total size of the queued items.
pub(crate) struct OrderingQueue<T> {
    heap: BinaryHeap<Reverse<Entry<T>>>,
    next_seq: u64,
    bytes: usize,
}

impl<T> OrderingQueue<T> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
            bytes: 0,
        }
    }

    pub fn push(&mut self, key: OrderKey, size: usize, item: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.bytes += size;
        self.heap.push(Reverse(Entry {
            key,
            seq,
            size,
            item,
        }));
    }

    /// Remove the item with the smallest key.
    pub fn pop(&mut self) -> Option<T> {
        let Reverse(entry) = self.heap.pop()?;
        self.bytes -= entry.size;
        Some(entry.item)
    }

    pub fn len(&self) -> usize { self.heap.len() }

    pub fn is_empty(&self) -> bool { self.heap.is_empty() }

    /// Sum of the sizes of queued items.
    pub fn bytes(&self) -> usize { self.bytes }
}
