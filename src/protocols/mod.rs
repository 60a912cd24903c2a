//! Built-in descriptors, bindings and typed views for common protocols.
//!
//! [`standard_registry`] wires Ethernet II, IPv4, IPv6, TCP, UDP, HTTP and
//! DNS together. Applications that need more protocols start from
//! [`standard_builder`] and register their own descriptors on top.

pub mod dns;
pub mod ethernet;
pub mod http;
pub mod ipv4;
pub mod ipv6;
pub mod tcp;
pub mod udp;

use std::sync::Arc;

pub use ethernet::EthernetView;
pub use ipv4::Ipv4View;
pub use ipv6::Ipv6View;
pub use tcp::TcpView;
pub use udp::UdpView;

use crate::protocol::{ProtocolId, ProtocolRegistry, RegistryBuilder, RegistryError};

/// Ethernet II, including 802.1Q / 802.1ad tags.
pub const ETHERNET: ProtocolId = ProtocolId::new(1);
/// Internet Protocol version 4.
pub const IPV4: ProtocolId = ProtocolId::new(2);
/// Internet Protocol version 6 (fixed header only).
pub const IPV6: ProtocolId = ProtocolId::new(3);
/// Transmission Control Protocol.
pub const TCP: ProtocolId = ProtocolId::new(4);
/// User Datagram Protocol.
pub const UDP: ProtocolId = ProtocolId::new(5);
/// HTTP/1.x message head.
pub const HTTP: ProtocolId = ProtocolId::new(6);
/// DNS message header.
pub const DNS: ProtocolId = ProtocolId::new(7);

/// Builder pre-populated with the built-in protocols.
///
/// # Errors
///
/// Propagates [`RegistryError`]; the built-in table itself never clashes.
pub fn standard_builder() -> Result<RegistryBuilder, RegistryError> {
    ProtocolRegistry::builder()
        .register(ethernet::descriptor(), [])?
        .register(ipv4::descriptor(), ipv4::bindings())?
        .register(ipv6::descriptor(), ipv6::bindings())?
        .register(tcp::descriptor(), tcp::bindings())?
        .register(udp::descriptor(), udp::bindings())?
        .register(http::descriptor(), http::bindings())?
        .register(dns::descriptor(), dns::bindings())
}

/// Registry containing only the built-in protocols.
///
/// # Errors
///
/// Propagates [`RegistryError`]; the built-in table itself never clashes.
pub fn standard_registry() -> Result<Arc<ProtocolRegistry>, RegistryError> {
    standard_builder()?.build()
}

#[cfg(test)]
mod tests;
