//! UDP header.

use super::{IPV4, IPV6, UDP, ipv4::PROTO_UDP};
use crate::{
    chain::HeaderView,
    protocol::{Binding, ProtocolDescriptor},
};

const HEADER_LEN: usize = 8;

pub(super) fn descriptor() -> ProtocolDescriptor { ProtocolDescriptor::fixed(UDP, "udp", HEADER_LEN) }

pub(super) fn bindings() -> Vec<Binding> {
    vec![
        Binding::primary(IPV4, UDP, |input| {
            super::Ipv4View::new(input.source_view()).is_some_and(|ip| {
                ip.protocol() == Some(PROTO_UDP) && ip.fragment_offset() == Some(0)
            })
        }),
        Binding::primary(IPV6, UDP, |input| {
            super::Ipv6View::new(input.source_view())
                .is_some_and(|ip| ip.next_header() == Some(PROTO_UDP))
        }),
    ]
}

/// Typed accessors over a resolved UDP header.
#[derive(Clone, Copy, Debug)]
pub struct UdpView<'a>(HeaderView<'a>);

impl<'a> UdpView<'a> {
    /// Wrap a view that was resolved as UDP.
    #[must_use]
    pub fn new(view: HeaderView<'a>) -> Option<Self> { (view.id() == UDP).then_some(Self(view)) }

    /// Source port.
    #[must_use]
    pub fn source_port(&self) -> Option<u16> { self.0.get_u16(0) }

    /// Destination port.
    #[must_use]
    pub fn destination_port(&self) -> Option<u16> { self.0.get_u16(2) }

    /// Datagram length including the header.
    #[must_use]
    pub fn length(&self) -> Option<u16> { self.0.get_u16(4) }

    /// Whether either port equals `port`.
    #[must_use]
    pub fn uses_port(&self, port: u16) -> bool {
        self.source_port() == Some(port) || self.destination_port() == Some(port)
    }
}
