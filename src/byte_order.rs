//! Helpers for explicit wire byte-order conversions.
//!
//! Header accessors read integers at arbitrary offsets in either byte order.
//! These helpers keep Clippy expectations scoped to the conversion points so
//! protocol code can remain explicit about wire endianness without repeating
//! lint annotations.

/// Byte order used when decoding multi-byte integers from a frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    /// Network byte order (big-endian). Every built-in protocol uses it.
    #[default]
    Network,
    /// Little-endian, used by a handful of link-layer encapsulations.
    Little,
}

/// Parse a `u16` from its on-wire representation.
///
/// # Examples
///
/// ```
/// use flowframe::byte_order::{ByteOrder, read_u16};
///
/// assert_eq!(read_u16([0x12, 0x34], ByteOrder::Network), 0x1234);
/// assert_eq!(read_u16([0x12, 0x34], ByteOrder::Little), 0x3412);
/// ```
#[must_use]
pub fn read_u16(bytes: [u8; 2], order: ByteOrder) -> u16 {
    match order {
        ByteOrder::Network => read_network_u16(bytes),
        ByteOrder::Little => u16::from_le_bytes(bytes),
    }
}

/// Parse a network-order `u16` from its on-wire representation.
#[must_use]
pub fn read_network_u16(bytes: [u8; 2]) -> u16 {
    #[expect(
        clippy::big_endian_bytes,
        reason = "Network byte order requires big-endian bytes."
    )]
    u16::from_be_bytes(bytes)
}

/// Parse a `u32` from its on-wire representation.
///
/// # Examples
///
/// ```
/// use flowframe::byte_order::{ByteOrder, read_u32};
///
/// assert_eq!(read_u32([0x12, 0x34, 0x56, 0x78], ByteOrder::Network), 0x1234_5678);
/// ```
#[must_use]
pub fn read_u32(bytes: [u8; 4], order: ByteOrder) -> u32 {
    match order {
        ByteOrder::Network => read_network_u32(bytes),
        ByteOrder::Little => u32::from_le_bytes(bytes),
    }
}

/// Parse a network-order `u32` from its on-wire representation.
#[must_use]
pub fn read_network_u32(bytes: [u8; 4]) -> u32 {
    #[expect(
        clippy::big_endian_bytes,
        reason = "Network byte order requires big-endian bytes."
    )]
    u32::from_be_bytes(bytes)
}

/// Parse a `u64` from its on-wire representation.
#[must_use]
pub fn read_u64(bytes: [u8; 8], order: ByteOrder) -> u64 {
    match order {
        ByteOrder::Network => read_network_u64(bytes),
        ByteOrder::Little => u64::from_le_bytes(bytes),
    }
}

/// Parse a network-order `u64` from its on-wire representation.
#[must_use]
pub fn read_network_u64(bytes: [u8; 8]) -> u64 {
    #[expect(
        clippy::big_endian_bytes,
        reason = "Network byte order requires big-endian bytes."
    )]
    u64::from_be_bytes(bytes)
}

/// Serialise a `u16` in network byte order (big-endian).
///
/// Used by packet builders that synthesise frames for replay.
#[must_use]
pub fn write_network_u16(value: u16) -> [u8; 2] {
    #[expect(
        clippy::big_endian_bytes,
        reason = "Network byte order requires big-endian bytes."
    )]
    value.to_be_bytes()
}

/// Serialise a `u32` in network byte order (big-endian).
#[must_use]
pub fn write_network_u32(value: u32) -> [u8; 4] {
    #[expect(
        clippy::big_endian_bytes,
        reason = "Network byte order requires big-endian bytes."
    )]
    value.to_be_bytes()
}
