//! TCP header.

use super::{IPV4, IPV6, TCP, ipv4::PROTO_TCP};
use crate::{
    chain::HeaderView,
    protocol::{Binding, ProtocolDescriptor},
};

/// FIN flag bit.
pub const FLAG_FIN: u8 = 0x01;
/// SYN flag bit.
pub const FLAG_SYN: u8 = 0x02;
/// RST flag bit.
pub const FLAG_RST: u8 = 0x04;
/// PSH flag bit.
pub const FLAG_PSH: u8 = 0x08;
/// ACK flag bit.
pub const FLAG_ACK: u8 = 0x10;

const MIN_LEN: usize = 20;

fn header_len(view: &HeaderView<'_>) -> usize {
    let Some(data_offset) = view.get_u8(12) else {
        return 0;
    };
    let len = usize::from(data_offset >> 4) * 4;
    if len < MIN_LEN { 0 } else { len }
}

pub(super) fn descriptor() -> ProtocolDescriptor { ProtocolDescriptor::new(TCP, "tcp", header_len) }

pub(super) fn bindings() -> Vec<Binding> {
    vec![
        // Only the first fragment of a datagram carries the transport header.
        Binding::primary(IPV4, TCP, |input| {
            super::Ipv4View::new(input.source_view()).is_some_and(|ip| {
                ip.protocol() == Some(PROTO_TCP) && ip.fragment_offset() == Some(0)
            })
        }),
        Binding::primary(IPV6, TCP, |input| {
            super::Ipv6View::new(input.source_view())
                .is_some_and(|ip| ip.next_header() == Some(PROTO_TCP))
        }),
    ]
}

/// Typed accessors over a resolved TCP header.
#[derive(Clone, Copy, Debug)]
pub struct TcpView<'a>(HeaderView<'a>);

impl<'a> TcpView<'a> {
    /// Wrap a view that was resolved as TCP.
    #[must_use]
    pub fn new(view: HeaderView<'a>) -> Option<Self> { (view.id() == TCP).then_some(Self(view)) }

    /// Underlying header view.
    #[must_use]
    pub const fn view(&self) -> HeaderView<'a> { self.0 }

    /// Source port.
    #[must_use]
    pub fn source_port(&self) -> Option<u16> { self.0.get_u16(0) }

    /// Destination port.
    #[must_use]
    pub fn destination_port(&self) -> Option<u16> { self.0.get_u16(2) }

    /// Sequence number.
    #[must_use]
    pub fn sequence(&self) -> Option<u32> { self.0.get_u32(4) }

    /// Acknowledgement number.
    #[must_use]
    pub fn acknowledgement(&self) -> Option<u32> { self.0.get_u32(8) }

    /// Raw flag byte.
    #[must_use]
    pub fn flags(&self) -> u8 { self.0.get_u8(13).unwrap_or_default() }

    /// Whether every bit of `mask` is set.
    #[must_use]
    pub fn has_flags(&self, mask: u8) -> bool { self.flags() & mask == mask }

    /// Whether either port equals `port`.
    #[must_use]
    pub fn uses_port(&self, port: u16) -> bool {
        self.source_port() == Some(port) || self.destination_port() == Some(port)
    }
}
