//! Borrowed accessor over one header inside a frame buffer.

use super::HeaderEntry;
use crate::{buffer::FrameBuffer, protocol::ProtocolId};

/// View over `length` bytes of a frame starting at `offset`.
///
/// All accessors take offsets relative to the header start and are bounded
/// by the header length, so a view can never read into a neighbouring
/// header or past the frame end.
#[derive(Clone, Copy, Debug)]
pub struct HeaderView<'a> {
    buffer: &'a FrameBuffer,
    id: ProtocolId,
    offset: usize,
    length: usize,
}

impl<'a> HeaderView<'a> {
    /// View `length` bytes at `offset`, clamped to the frame.
    #[must_use]
    pub fn new(buffer: &'a FrameBuffer, id: ProtocolId, offset: usize, length: usize) -> Self {
        let offset = offset.min(buffer.len());
        let length = length.min(buffer.len() - offset);
        Self {
            buffer,
            id,
            offset,
            length,
        }
    }

    /// View from `offset` to the end of the frame.
    #[must_use]
    pub fn to_end(buffer: &'a FrameBuffer, id: ProtocolId, offset: usize) -> Self {
        Self::new(buffer, id, offset, usize::MAX)
    }

    /// View covering a resolved chain entry.
    #[must_use]
    pub fn from_entry(buffer: &'a FrameBuffer, entry: HeaderEntry) -> Self {
        Self::new(buffer, entry.id, entry.offset, entry.length)
    }

    /// Protocol this view was created for.
    #[must_use]
    pub const fn id(&self) -> ProtocolId { self.id }

    /// Absolute offset of the first header byte.
    #[must_use]
    pub const fn offset(&self) -> usize { self.offset }

    /// Number of bytes covered by the view.
    #[must_use]
    pub const fn len(&self) -> usize { self.length }

    /// Whether the view covers no bytes.
    #[must_use]
    pub const fn is_empty(&self) -> bool { self.length == 0 }

    /// Frame the view borrows from.
    #[must_use]
    pub const fn buffer(&self) -> &'a FrameBuffer { self.buffer }

    /// Header bytes.
    #[must_use]
    pub fn bytes(&self) -> &'a [u8] {
        self.buffer
            .get_bytes(self.offset, self.length)
            .unwrap_or_default()
    }

    /// Bytes following the header up to the end of the frame.
    #[must_use]
    pub fn following(&self) -> &'a [u8] { self.buffer.tail(self.offset + self.length) }

    /// Read a byte at `at`.
    #[must_use]
    pub fn get_u8(&self, at: usize) -> Option<u8> {
        self.absolute(at, 1).and_then(|pos| self.buffer.get_u8(pos))
    }

    /// Read a `u16` at `at`.
    #[must_use]
    pub fn get_u16(&self, at: usize) -> Option<u16> {
        self.absolute(at, 2).and_then(|pos| self.buffer.get_u16(pos))
    }

    /// Read a `u32` at `at`.
    #[must_use]
    pub fn get_u32(&self, at: usize) -> Option<u32> {
        self.absolute(at, 4).and_then(|pos| self.buffer.get_u32(pos))
    }

    /// Read a `u64` at `at`.
    #[must_use]
    pub fn get_u64(&self, at: usize) -> Option<u64> {
        self.absolute(at, 8).and_then(|pos| self.buffer.get_u64(pos))
    }

    /// Borrow `len` bytes at `at`.
    #[must_use]
    pub fn get_bytes(&self, at: usize, len: usize) -> Option<&'a [u8]> {
        self.absolute(at, len)
            .and_then(|pos| self.buffer.get_bytes(pos, len))
    }

    fn absolute(&self, at: usize, width: usize) -> Option<usize> {
        let end = at.checked_add(width)?;
        (end <= self.length).then_some(self.offset + at)
    }
}

#[cfg(test)]
mod tests {
    use super::HeaderView;
    use crate::{buffer::FrameBuffer, protocol::ProtocolId};

    #[test]
    fn reads_are_bounded_by_header_length() {
        let buffer = FrameBuffer::new(vec![0xaa, 0x00, 0x50, 0x01, 0xbb]);
        let view = HeaderView::new(&buffer, ProtocolId::new(4), 1, 3);
        assert_eq!(view.get_u16(1), Some(0x5001));
        assert_eq!(view.get_u16(2), None, "must not read into the next header");
        assert_eq!(view.following(), &[0xbb]);
    }

    #[test]
    fn views_are_clamped_to_the_frame() {
        let buffer = FrameBuffer::new(vec![1, 2, 3]);
        let view = HeaderView::new(&buffer, ProtocolId::new(1), 2, 10);
        assert_eq!(view.len(), 1);
        let past = HeaderView::to_end(&buffer, ProtocolId::new(1), 9);
        assert!(past.is_empty());
        assert_eq!(past.get_u8(0), None);
    }
}
