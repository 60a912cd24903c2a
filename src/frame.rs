//! Captured frames and their decoded form.
//!
//! A [`Frame`] is what the capture layer hands over: capture time, a frame
//! number, the link type and the raw bytes. Decoding attaches the
//! [`HeaderChain`] and turns it into a [`DecodedFrame`], which is what
//! analyzers and subscribers see.

use std::{fmt, time::Duration};

use crate::{
    buffer::FrameBuffer,
    chain::{HeaderChain, HeaderScanner, HeaderView},
    protocol::{ProtocolId, ProtocolSet},
    protocols,
};

/// Capture timestamp with nanosecond resolution.
///
/// Timestamps drive the processing clock; they never come from the wall
/// clock, so replayed traffic behaves identically to live traffic.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The earliest representable instant.
    pub const ZERO: Self = Self(0);

    /// Construct from nanoseconds since the capture epoch.
    #[must_use]
    pub const fn from_nanos(nanos: u64) -> Self { Self(nanos) }

    /// Construct from microseconds since the capture epoch.
    #[must_use]
    pub const fn from_micros(micros: u64) -> Self { Self(micros.saturating_mul(1_000)) }

    /// Construct from milliseconds since the capture epoch.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self { Self(millis.saturating_mul(1_000_000)) }

    /// Construct from whole seconds since the capture epoch.
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self { Self(secs.saturating_mul(1_000_000_000)) }

    /// Nanoseconds since the capture epoch.
    #[must_use]
    pub const fn as_nanos(self) -> u64 { self.0 }

    /// Add `duration`, saturating at the maximum timestamp.
    #[must_use]
    pub fn saturating_add(self, duration: Duration) -> Self {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(nanos))
    }

    /// Time elapsed since `earlier`, or zero when `earlier` is later.
    #[must_use]
    pub const fn saturating_duration_since(self, earlier: Self) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.0 / 1_000_000_000, self.0 % 1_000_000_000)
    }
}

/// Link-layer encapsulation reported by the capture source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LinkType {
    /// Ethernet II frames.
    #[default]
    Ethernet,
    /// Bare IPv4 datagrams.
    RawIpv4,
    /// Bare IPv6 packets.
    RawIpv6,
    /// Any other link type; the whole frame is payload.
    Other(u16),
}

impl LinkType {
    /// Protocol the header chain starts with.
    #[must_use]
    pub const fn root_protocol(self) -> ProtocolId {
        match self {
            Self::Ethernet => protocols::ETHERNET,
            Self::RawIpv4 => protocols::IPV4,
            Self::RawIpv6 => protocols::IPV6,
            Self::Other(_) => ProtocolId::PAYLOAD,
        }
    }
}

/// One captured frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub timestamp: Timestamp,
    pub number: u64,
    pub link_type: LinkType,
    pub buffer: FrameBuffer,
}

impl Frame {
    /// Create an Ethernet frame.
    #[must_use]
    pub fn new(timestamp: Timestamp, number: u64, buffer: impl Into<FrameBuffer>) -> Self {
        Self {
            timestamp,
            number,
            link_type: LinkType::Ethernet,
            buffer: buffer.into(),
        }
    }

    /// Override the link type.
    #[must_use]
    pub fn with_link_type(mut self, link_type: LinkType) -> Self {
        self.link_type = link_type;
        self
    }

    /// Ordering key used by the pipeline: capture time, then frame number.
    #[must_use]
    pub const fn order_key(&self) -> (Timestamp, u64) { (self.timestamp, self.number) }

    /// Resolve the header chain and produce a [`DecodedFrame`].
    #[must_use]
    pub fn decode(self, scanner: &HeaderScanner) -> DecodedFrame {
        let chain = scanner.resolve_chain(&self.buffer, self.link_type.root_protocol());
        DecodedFrame::new(self, chain)
    }
}

/// A frame together with its resolved header chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedFrame {
    frame: Frame,
    chain: HeaderChain,
    consumed: bool,
}

impl DecodedFrame {
    /// Attach an already resolved chain to `frame`.
    #[must_use]
    pub fn new(frame: Frame, chain: HeaderChain) -> Self {
        Self {
            frame,
            chain,
            consumed: false,
        }
    }

    /// Capture timestamp.
    #[must_use]
    pub const fn timestamp(&self) -> Timestamp { self.frame.timestamp }

    /// Frame number assigned by the capture source.
    #[must_use]
    pub const fn number(&self) -> u64 { self.frame.number }

    /// Link type the chain was resolved from.
    #[must_use]
    pub const fn link_type(&self) -> LinkType { self.frame.link_type }

    /// Raw captured bytes.
    #[must_use]
    pub const fn buffer(&self) -> &FrameBuffer { &self.frame.buffer }

    /// Resolved header chain.
    #[must_use]
    pub const fn chain(&self) -> &HeaderChain { &self.chain }

    /// Bitmap of protocols present in the frame.
    #[must_use]
    pub fn protocols(&self) -> ProtocolSet { self.chain.protocols() }

    /// Whether a header with `id` is present.
    #[must_use]
    pub fn has_header(&self, id: ProtocolId) -> bool { self.chain.contains(id) }

    /// View over the first header with `id`.
    ///
    /// For [`ProtocolId::PAYLOAD`] the view covers the opaque remainder.
    #[must_use]
    pub fn header(&self, id: ProtocolId) -> Option<HeaderView<'_>> {
        if id.is_payload() {
            return self.has_header(id).then(|| {
                HeaderView::to_end(self.buffer(), id, self.chain.payload_offset())
            });
        }
        self.chain
            .entry(id)
            .map(|entry| HeaderView::from_entry(self.buffer(), entry))
    }

    /// Views over every resolved header in wire order.
    pub fn headers(&self) -> impl Iterator<Item = HeaderView<'_>> + '_ {
        self.chain
            .entries()
            .iter()
            .map(|entry| HeaderView::from_entry(self.buffer(), *entry))
    }

    /// Bytes after the last resolved header.
    #[must_use]
    pub fn payload(&self) -> &[u8] { self.buffer().tail(self.chain.payload_offset()) }

    /// Whether an analyzer consumed this frame.
    #[must_use]
    pub const fn is_consumed(&self) -> bool { self.consumed }

    pub(crate) fn set_consumed(&mut self) { self.consumed = true; }

    /// Number of captured bytes, used for outbound byte accounting.
    #[must_use]
    pub fn wire_len(&self) -> usize { self.buffer().len() }

    /// Give back the raw frame.
    #[must_use]
    pub fn into_frame(self) -> Frame { self.frame }
}
