//! Ordered list of headers resolved for one frame.

use crate::protocol::{ProtocolId, ProtocolSet};

/// One resolved header: protocol, start offset and length in bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HeaderEntry {
    pub id: ProtocolId,
    pub offset: usize,
    pub length: usize,
}

impl HeaderEntry {
    /// Offset of the first byte after this header.
    #[must_use]
    pub const fn end(&self) -> usize { self.offset + self.length }
}

/// Headers of one frame in wire order.
///
/// Entries are contiguous: each entry starts where the previous one ends.
/// Whatever follows the last entry is the implicit
/// [`ProtocolId::PAYLOAD`] remainder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeaderChain {
    entries: Vec<HeaderEntry>,
    frame_len: usize,
    present: ProtocolSet,
}

impl HeaderChain {
    /// Empty chain for a frame of `frame_len` bytes; the whole frame is payload.
    #[must_use]
    pub fn new(frame_len: usize) -> Self {
        Self {
            entries: Vec::new(),
            frame_len,
            present: ProtocolSet::new(),
        }
    }

    /// Append a header. Callers keep entries contiguous and within the frame.
    pub(crate) fn push(&mut self, entry: HeaderEntry) {
        debug_assert_eq!(entry.offset, self.payload_offset(), "header chain must be contiguous");
        debug_assert!(entry.end() <= self.frame_len, "header must lie within the frame");
        self.present.insert(entry.id);
        self.entries.push(entry);
    }

    /// Resolved headers in wire order.
    #[must_use]
    pub fn entries(&self) -> &[HeaderEntry] { &self.entries }

    /// Number of resolved headers, excluding the payload remainder.
    #[must_use]
    pub fn len(&self) -> usize { self.entries.len() }

    /// Whether no header was resolved.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// First entry for `id`, if present.
    #[must_use]
    pub fn entry(&self, id: ProtocolId) -> Option<HeaderEntry> {
        if !self.present.contains(id) {
            return None;
        }
        self.entries.iter().find(|entry| entry.id == id).copied()
    }

    /// Last resolved header.
    #[must_use]
    pub fn last(&self) -> Option<HeaderEntry> { self.entries.last().copied() }

    /// Whether a header with `id` was resolved. `PAYLOAD` counts when the
    /// remainder is non-empty.
    #[must_use]
    pub fn contains(&self, id: ProtocolId) -> bool {
        if id.is_payload() {
            return self.payload_len() > 0;
        }
        self.present.contains(id)
    }

    /// Offset at which the payload remainder starts.
    #[must_use]
    pub fn payload_offset(&self) -> usize { self.entries.last().map_or(0, HeaderEntry::end) }

    /// Length of the payload remainder.
    #[must_use]
    pub fn payload_len(&self) -> usize { self.frame_len - self.payload_offset() }

    /// Length of the frame the chain was resolved for.
    #[must_use]
    pub const fn frame_len(&self) -> usize { self.frame_len }

    /// Bitmap of every protocol present, including `PAYLOAD` when the
    /// remainder is non-empty.
    #[must_use]
    pub fn protocols(&self) -> ProtocolSet {
        let mut set = self.present;
        if self.payload_len() > 0 {
            set.insert(ProtocolId::PAYLOAD);
        }
        set
    }

    /// Protocol ids in wire order.
    pub fn ids(&self) -> impl Iterator<Item = ProtocolId> + '_ { self.entries.iter().map(|e| e.id) }
}

#[cfg(test)]
mod tests {
    use super::{HeaderChain, HeaderEntry};
    use crate::protocol::ProtocolId;

    #[test]
    fn payload_covers_remainder() {
        let mut chain = HeaderChain::new(30);
        chain.push(HeaderEntry {
            id: ProtocolId::new(1),
            offset: 0,
            length: 14,
        });
        assert_eq!(chain.payload_offset(), 14);
        assert_eq!(chain.payload_len(), 16);
        assert!(chain.contains(ProtocolId::PAYLOAD));
        assert!(chain.protocols().contains(ProtocolId::PAYLOAD));
    }

    #[test]
    fn empty_remainder_is_not_payload() {
        let mut chain = HeaderChain::new(8);
        chain.push(HeaderEntry {
            id: ProtocolId::new(5),
            offset: 0,
            length: 8,
        });
        assert!(!chain.contains(ProtocolId::PAYLOAD));
        assert_eq!(chain.entry(ProtocolId::new(5)).map(|e| e.end()), Some(8));
        assert!(chain.entry(ProtocolId::new(6)).is_none());
    }
}
