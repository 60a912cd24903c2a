//! Bounds-checked, zero-copy view over captured frame bytes.
//!
//! [`FrameBuffer`] is the only way header code touches raw bytes. Every
//! accessor returns `None` instead of reading past the end, so malformed or
//! truncated captures can never cause out-of-bounds reads.

use bytes::Bytes;

use crate::byte_order::{ByteOrder, read_u16, read_u32, read_u64};

/// Immutable captured bytes plus the byte order used for integer reads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameBuffer {
    bytes: Bytes,
    order: ByteOrder,
}

impl FrameBuffer {
    /// Wrap `bytes` using network byte order.
    #[must_use]
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            order: ByteOrder::Network,
        }
    }

    /// Wrap `bytes` with an explicit byte order.
    #[must_use]
    pub fn with_order(bytes: impl Into<Bytes>, order: ByteOrder) -> Self {
        Self {
            bytes: bytes.into(),
            order,
        }
    }

    /// Byte order applied by the integer accessors.
    #[must_use]
    pub const fn byte_order(&self) -> ByteOrder { self.order }

    /// Total number of captured bytes.
    #[must_use]
    pub fn len(&self) -> usize { self.bytes.len() }

    /// Whether the buffer holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.bytes.is_empty() }

    /// Borrow the raw bytes.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] { &self.bytes }

    /// Borrow the underlying reference-counted bytes.
    #[must_use]
    pub fn bytes(&self) -> &Bytes { &self.bytes }

    /// Read one byte at `offset`.
    #[must_use]
    pub fn get_u8(&self, offset: usize) -> Option<u8> { self.bytes.get(offset).copied() }

    /// Read a `u16` at `offset` in the buffer's byte order.
    #[must_use]
    pub fn get_u16(&self, offset: usize) -> Option<u16> {
        self.array::<2>(offset).map(|raw| read_u16(raw, self.order))
    }

    /// Read a `u32` at `offset` in the buffer's byte order.
    #[must_use]
    pub fn get_u32(&self, offset: usize) -> Option<u32> {
        self.array::<4>(offset).map(|raw| read_u32(raw, self.order))
    }

    /// Read a `u64` at `offset` in the buffer's byte order.
    #[must_use]
    pub fn get_u64(&self, offset: usize) -> Option<u64> {
        self.array::<8>(offset).map(|raw| read_u64(raw, self.order))
    }

    /// Borrow `len` bytes starting at `offset`.
    #[must_use]
    pub fn get_bytes(&self, offset: usize, len: usize) -> Option<&[u8]> {
        let end = offset.checked_add(len)?;
        self.bytes.get(offset..end)
    }

    /// Borrow everything from `offset` to the end of the buffer.
    ///
    /// Returns an empty slice when `offset` is at or past the end.
    #[must_use]
    pub fn tail(&self, offset: usize) -> &[u8] { self.bytes.get(offset..).unwrap_or_default() }

    /// Zero-copy sub-slice of `len` bytes starting at `offset`.
    #[must_use]
    pub fn slice(&self, offset: usize, len: usize) -> Option<Bytes> {
        let end = offset.checked_add(len)?;
        (end <= self.bytes.len()).then(|| self.bytes.slice(offset..end))
    }

    fn array<const N: usize>(&self, offset: usize) -> Option<[u8; N]> {
        self.get_bytes(offset, N)?.try_into().ok()
    }
}

impl From<Vec<u8>> for FrameBuffer {
    fn from(value: Vec<u8>) -> Self { Self::new(value) }
}

impl From<Bytes> for FrameBuffer {
    fn from(value: Bytes) -> Self { Self::new(value) }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::FrameBuffer;
    use crate::byte_order::ByteOrder;

    #[rstest]
    #[case::inside(0, Some(0x0102))]
    #[case::last_pair(2, Some(0x0304))]
    #[case::straddles_end(3, None)]
    #[case::past_end(10, None)]
    fn get_u16_is_bounds_checked(#[case] offset: usize, #[case] expected: Option<u16>) {
        let buffer = FrameBuffer::new(vec![1, 2, 3, 4]);
        assert_eq!(buffer.get_u16(offset), expected);
    }

    #[test]
    fn little_endian_buffers_decode_accordingly() {
        let buffer = FrameBuffer::with_order(vec![0x78, 0x56, 0x34, 0x12], ByteOrder::Little);
        assert_eq!(buffer.get_u32(0), Some(0x1234_5678));
    }

    #[test]
    fn get_bytes_rejects_overflowing_ranges() {
        let buffer = FrameBuffer::new(vec![0; 4]);
        assert!(buffer.get_bytes(usize::MAX, 2).is_none());
        assert!(buffer.slice(2, 3).is_none());
        assert_eq!(buffer.tail(9), &[] as &[u8]);
    }
}
