//! Extraction of TCP segment events from decoded frames.

use bytes::Bytes;

use super::FlowKey;
use crate::{
    frame::{DecodedFrame, Timestamp},
    protocols::{
        IPV4,
        IPV6,
        Ipv4View,
        Ipv6View,
        TCP,
        TcpView,
        tcp::{FLAG_FIN, FLAG_RST, FLAG_SYN},
    },
};

/// What the flow assembler needs from one TCP segment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SegmentEvent {
    pub key: FlowKey,
    /// Absolute sequence number of the first payload byte (or of the
    /// SYN/FIN when there is no payload).
    pub sequence: u32,
    pub flags: u8,
    /// Bytes between the end of the TCP header and the end of the IP
    /// datagram. Link-layer padding is excluded.
    pub payload: Bytes,
    pub frame_number: u64,
    pub timestamp: Timestamp,
}

impl SegmentEvent {
    /// Event for a frame carrying a TCP header.
    #[must_use]
    pub fn from_frame(frame: &DecodedFrame) -> Option<Self> {
        let tcp = TcpView::new(frame.header(TCP)?)?;
        let key = FlowKey::from_frame(frame)?;
        let start = tcp.view().offset() + tcp.view().len();
        let end = datagram_end(frame);
        let payload = frame
            .buffer()
            .slice(start, end.saturating_sub(start))
            .unwrap_or_default();
        Some(Self {
            key,
            sequence: tcp.sequence()?,
            flags: tcp.flags(),
            payload,
            frame_number: frame.number(),
            timestamp: frame.timestamp(),
        })
    }

    #[must_use]
    pub const fn is_syn(&self) -> bool { self.flags & FLAG_SYN != 0 }

    #[must_use]
    pub const fn is_fin(&self) -> bool { self.flags & FLAG_FIN != 0 }

    #[must_use]
    pub const fn is_rst(&self) -> bool { self.flags & FLAG_RST != 0 }
}

fn datagram_end(frame: &DecodedFrame) -> usize {
    if let Some(ip) = frame.header(IPV4).and_then(Ipv4View::new) {
        return ip.datagram_end();
    }
    if let Some(ip) = frame.header(IPV6).and_then(Ipv6View::new) {
        return ip.datagram_end();
    }
    frame.buffer().len()
}
