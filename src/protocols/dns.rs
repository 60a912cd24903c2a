//! DNS message header.

use super::{DNS, UDP};
use crate::protocol::{Binding, ProtocolDescriptor};

/// Well-known DNS port.
pub const DNS_PORT: u16 = 53;

const HEADER_LEN: usize = 12;

pub(super) fn descriptor() -> ProtocolDescriptor { ProtocolDescriptor::fixed(DNS, "dns", HEADER_LEN) }

pub(super) fn bindings() -> Vec<Binding> {
    vec![Binding::primary(UDP, DNS, |input| {
        super::UdpView::new(input.source_view()).is_some_and(|udp| udp.uses_port(DNS_PORT))
    })]
}
