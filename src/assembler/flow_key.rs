//! Directional transport flow identity.

use std::{
    fmt,
    hash::{DefaultHasher, Hash, Hasher},
    net::IpAddr,
};

use crate::{
    frame::DecodedFrame,
    protocols::{IPV4, IPV6, Ipv4View, Ipv6View, TCP, TcpView, UDP, UdpView},
    sequencer::FlowHash,
};

/// Addresses and ports of one direction of a TCP or UDP conversation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FlowKey {
    pub source: IpAddr,
    pub destination: IpAddr,
    pub source_port: u16,
    pub destination_port: u16,
}

impl FlowKey {
    /// Build a key from its parts.
    #[must_use]
    pub fn new(
        source: impl Into<IpAddr>,
        source_port: u16,
        destination: impl Into<IpAddr>,
        destination_port: u16,
    ) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            source_port,
            destination_port,
        }
    }

    /// Key of the frame's IP/TCP or IP/UDP headers, if it has both.
    #[must_use]
    pub fn from_frame(frame: &DecodedFrame) -> Option<Self> {
        let (source, destination) = if let Some(view) = frame.header(IPV4) {
            let ip = Ipv4View::new(view)?;
            (IpAddr::V4(ip.source()?), IpAddr::V4(ip.destination()?))
        } else {
            let ip = Ipv6View::new(frame.header(IPV6)?)?;
            (IpAddr::V6(ip.source()?), IpAddr::V6(ip.destination()?))
        };
        let (source_port, destination_port) = if let Some(view) = frame.header(TCP) {
            let tcp = TcpView::new(view)?;
            (tcp.source_port()?, tcp.destination_port()?)
        } else {
            let udp = UdpView::new(frame.header(UDP)?)?;
            (udp.source_port()?, udp.destination_port()?)
        };
        Some(Self {
            source,
            destination,
            source_port,
            destination_port,
        })
    }

    /// Key of the opposite direction.
    #[must_use]
    pub const fn reversed(&self) -> Self {
        Self {
            source: self.destination,
            destination: self.source,
            source_port: self.destination_port,
            destination_port: self.source_port,
        }
    }

    /// Sequencer key for this direction.
    ///
    /// Equal keys hash alike within one process. The value is not a
    /// persistent identifier: the hashing algorithm may change between
    /// toolchain releases.
    #[must_use]
    pub fn hash(&self) -> FlowHash {
        let mut hasher = DefaultHasher::new();
        Hash::hash(self, &mut hasher);
        FlowHash::new(hasher.finish())
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let endpoint = |f: &mut fmt::Formatter<'_>, addr: IpAddr, port: u16| match addr {
            IpAddr::V4(addr) => write!(f, "{addr}:{port}"),
            IpAddr::V6(addr) => write!(f, "[{addr}]:{port}"),
        };
        endpoint(f, self.source, self.source_port)?;
        f.write_str(" -> ")?;
        endpoint(f, self.destination, self.destination_port)
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, Ipv6Addr};

    use super::FlowKey;
    use crate::{chain::HeaderScanner, frame::Timestamp, protocols, test_helpers::PacketBuilder};

    fn scanner() -> HeaderScanner {
        HeaderScanner::new(protocols::standard_registry().expect("registry"))
    }

    #[test]
    fn reads_tcp_over_ipv4() {
        let frame = PacketBuilder::tcp(40_000, 80)
            .frame(1, Timestamp::ZERO)
            .decode(&scanner());
        let key = FlowKey::from_frame(&frame).expect("flow key");
        assert_eq!(
            key,
            FlowKey::new(Ipv4Addr::new(10, 0, 0, 1), 40_000, Ipv4Addr::new(10, 0, 0, 2), 80)
        );
        assert_eq!(key.to_string(), "10.0.0.1:40000 -> 10.0.0.2:80");
    }

    #[test]
    fn reads_udp_over_ipv6() {
        let source = Ipv6Addr::LOCALHOST;
        let destination = Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 1);
        let frame = PacketBuilder::udp(5353, 53)
            .ipv6(source, destination)
            .frame(1, Timestamp::ZERO)
            .decode(&scanner());
        let key = FlowKey::from_frame(&frame).expect("flow key");
        assert_eq!(key, FlowKey::new(source, 5353, destination, 53));
        assert_eq!(key.to_string(), "[::1]:5353 -> [fe80::1]:53");
    }

    #[test]
    fn directions_hash_differently() {
        let key = FlowKey::new(Ipv4Addr::LOCALHOST, 1, Ipv4Addr::BROADCAST, 2);
        assert_eq!(key.reversed().reversed(), key);
        assert_ne!(key.hash(), key.reversed().hash());
        assert_eq!(key.hash(), key.hash());
    }

    #[test]
    fn equal_keys_share_a_sequencer_key() {
        let frame = PacketBuilder::tcp(40_000, 80)
            .frame(1, Timestamp::ZERO)
            .decode(&scanner());
        let decoded = FlowKey::from_frame(&frame).expect("flow key");
        let built = FlowKey::new(Ipv4Addr::new(10, 0, 0, 1), 40_000, Ipv4Addr::new(10, 0, 0, 2), 80);
        assert_eq!(decoded.hash(), built.hash());
    }

    #[test]
    fn frames_without_transport_have_no_key() {
        let frame = PacketBuilder::raw(47)
            .frame(1, Timestamp::ZERO)
            .decode(&scanner());
        assert!(FlowKey::from_frame(&frame).is_none());
    }
}
