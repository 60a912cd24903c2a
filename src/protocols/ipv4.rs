//! IPv4 header.

use std::net::Ipv4Addr;

use super::{ETHERNET, IPV4, ethernet::ETHERTYPE_IPV4};
use crate::{
    chain::HeaderView,
    protocol::{Binding, ProtocolDescriptor},
};

/// IP protocol number for TCP.
pub const PROTO_TCP: u8 = 6;
/// IP protocol number for UDP.
pub const PROTO_UDP: u8 = 17;

const MIN_LEN: usize = 20;
const FLAG_MORE_FRAGMENTS: u16 = 0x2000;
const FRAGMENT_OFFSET_MASK: u16 = 0x1fff;

fn header_len(view: &HeaderView<'_>) -> usize {
    let Some(first) = view.get_u8(0) else {
        return 0;
    };
    let len = usize::from(first & 0x0f) * 4;
    if first >> 4 != 4 || len < MIN_LEN { 0 } else { len }
}

pub(super) fn descriptor() -> ProtocolDescriptor { ProtocolDescriptor::new(IPV4, "ipv4", header_len) }

pub(super) fn bindings() -> Vec<Binding> {
    vec![Binding::primary(ETHERNET, IPV4, |input| {
        super::EthernetView::new(input.source_view()).and_then(|eth| eth.ethertype())
            == Some(ETHERTYPE_IPV4)
    })]
}

/// Typed accessors over a resolved IPv4 header.
#[derive(Clone, Copy, Debug)]
pub struct Ipv4View<'a>(HeaderView<'a>);

impl<'a> Ipv4View<'a> {
    /// Wrap a view that was resolved as IPv4.
    #[must_use]
    pub fn new(view: HeaderView<'a>) -> Option<Self> { (view.id() == IPV4).then_some(Self(view)) }

    /// Underlying header view.
    #[must_use]
    pub const fn view(&self) -> HeaderView<'a> { self.0 }

    /// Header length in bytes.
    #[must_use]
    pub const fn header_len(&self) -> usize { self.0.len() }

    /// Datagram length announced by the header.
    #[must_use]
    pub fn total_length(&self) -> Option<u16> { self.0.get_u16(2) }

    /// Identification field shared by fragments of one datagram.
    #[must_use]
    pub fn identification(&self) -> Option<u16> { self.0.get_u16(4) }

    /// Whether the "more fragments" flag is set.
    #[must_use]
    pub fn more_fragments(&self) -> bool {
        self.0
            .get_u16(6)
            .is_some_and(|word| word & FLAG_MORE_FRAGMENTS != 0)
    }

    /// Fragment offset in bytes.
    #[must_use]
    pub fn fragment_offset(&self) -> Option<usize> {
        self.0
            .get_u16(6)
            .map(|word| usize::from(word & FRAGMENT_OFFSET_MASK) * 8)
    }

    /// Whether this datagram is one fragment of a larger one.
    #[must_use]
    pub fn is_fragment(&self) -> bool {
        self.more_fragments() || self.fragment_offset().is_some_and(|offset| offset > 0)
    }

    /// Time to live.
    #[must_use]
    pub fn ttl(&self) -> Option<u8> { self.0.get_u8(8) }

    /// Encapsulated protocol number.
    #[must_use]
    pub fn protocol(&self) -> Option<u8> { self.0.get_u8(9) }

    /// Source address.
    #[must_use]
    pub fn source(&self) -> Option<Ipv4Addr> { self.0.get_u32(12).map(Ipv4Addr::from) }

    /// Destination address.
    #[must_use]
    pub fn destination(&self) -> Option<Ipv4Addr> { self.0.get_u32(16).map(Ipv4Addr::from) }

    /// Absolute offset of the end of the datagram, excluding link padding.
    #[must_use]
    pub fn datagram_end(&self) -> usize {
        let captured = self.0.buffer().len();
        self.total_length()
            .map_or(captured, |total| (self.0.offset() + usize::from(total)).min(captured))
    }
}
