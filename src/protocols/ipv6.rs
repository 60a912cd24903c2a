//! IPv6 fixed header. Extension headers are left to the payload.

use std::net::Ipv6Addr;

use super::{ETHERNET, IPV6, ethernet::ETHERTYPE_IPV6};
use crate::{
    chain::HeaderView,
    protocol::{Binding, ProtocolDescriptor},
};

const HEADER_LEN: usize = 40;

fn header_len(view: &HeaderView<'_>) -> usize {
    match view.get_u8(0) {
        Some(first) if first >> 4 == 6 && view.len() >= HEADER_LEN => HEADER_LEN,
        _ => 0,
    }
}

pub(super) fn descriptor() -> ProtocolDescriptor { ProtocolDescriptor::new(IPV6, "ipv6", header_len) }

pub(super) fn bindings() -> Vec<Binding> {
    vec![Binding::primary(ETHERNET, IPV6, |input| {
        super::EthernetView::new(input.source_view()).and_then(|eth| eth.ethertype())
            == Some(ETHERTYPE_IPV6)
    })]
}

/// Typed accessors over a resolved IPv6 header.
#[derive(Clone, Copy, Debug)]
pub struct Ipv6View<'a>(HeaderView<'a>);

impl<'a> Ipv6View<'a> {
    /// Wrap a view that was resolved as IPv6.
    #[must_use]
    pub fn new(view: HeaderView<'a>) -> Option<Self> { (view.id() == IPV6).then_some(Self(view)) }

    /// Payload length announced by the header.
    #[must_use]
    pub fn payload_length(&self) -> Option<u16> { self.0.get_u16(4) }

    /// Next header protocol number.
    #[must_use]
    pub fn next_header(&self) -> Option<u8> { self.0.get_u8(6) }

    /// Hop limit.
    #[must_use]
    pub fn hop_limit(&self) -> Option<u8> { self.0.get_u8(7) }

    /// Source address.
    #[must_use]
    pub fn source(&self) -> Option<Ipv6Addr> { self.address(8) }

    /// Destination address.
    #[must_use]
    pub fn destination(&self) -> Option<Ipv6Addr> { self.address(24) }

    /// Absolute offset of the end of the packet, excluding link padding.
    #[must_use]
    pub fn datagram_end(&self) -> usize {
        let captured = self.0.buffer().len();
        self.payload_length().map_or(captured, |len| {
            (self.0.offset() + HEADER_LEN + usize::from(len)).min(captured)
        })
    }

    fn address(&self, at: usize) -> Option<Ipv6Addr> {
        let raw: [u8; 16] = self.0.get_bytes(at, 16)?.try_into().ok()?;
        Some(Ipv6Addr::from(raw))
    }
}
