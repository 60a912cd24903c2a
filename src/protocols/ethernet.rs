//! Ethernet II framing.

use super::ETHERNET;
use crate::{chain::HeaderView, protocol::ProtocolDescriptor};

/// Ethertype announcing IPv4.
pub const ETHERTYPE_IPV4: u16 = 0x0800;
/// Ethertype announcing IPv6.
pub const ETHERTYPE_IPV6: u16 = 0x86dd;
const ETHERTYPE_VLAN: u16 = 0x8100;
const ETHERTYPE_QINQ: u16 = 0x88a8;

const BASE_LEN: usize = 14;
const TAG_LEN: usize = 4;
const MAX_TAGS: usize = 2;

/// Header length including any stacked VLAN tags.
#[must_use]
pub fn header_len(view: &HeaderView<'_>) -> usize {
    let mut len = BASE_LEN;
    for _ in 0..MAX_TAGS {
        match view.get_u16(len - 2) {
            Some(ETHERTYPE_VLAN | ETHERTYPE_QINQ) => len += TAG_LEN,
            Some(_) => return len,
            None => return 0,
        }
    }
    if view.len() >= len { len } else { 0 }
}

pub(super) fn descriptor() -> ProtocolDescriptor {
    ProtocolDescriptor::new(ETHERNET, "ethernet", header_len)
}

/// Typed accessors over a resolved Ethernet header.
#[derive(Clone, Copy, Debug)]
pub struct EthernetView<'a>(HeaderView<'a>);

impl<'a> EthernetView<'a> {
    /// Wrap a view that was resolved as Ethernet.
    #[must_use]
    pub fn new(view: HeaderView<'a>) -> Option<Self> { (view.id() == ETHERNET).then_some(Self(view)) }

    /// Destination MAC address.
    #[must_use]
    pub fn destination(&self) -> Option<[u8; 6]> { self.mac(0) }

    /// Source MAC address.
    #[must_use]
    pub fn source(&self) -> Option<[u8; 6]> { self.mac(6) }

    /// Ethertype following any VLAN tags.
    #[must_use]
    pub fn ethertype(&self) -> Option<u16> { self.0.get_u16(self.0.len().checked_sub(2)?) }

    /// Number of VLAN tags present.
    #[must_use]
    pub fn vlan_tags(&self) -> usize { self.0.len().saturating_sub(BASE_LEN) / TAG_LEN }

    fn mac(&self, at: usize) -> Option<[u8; 6]> { self.0.get_bytes(at, 6)?.try_into().ok() }
}
