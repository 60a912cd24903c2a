#![cfg(any(test, feature = "test-helpers"))]
//! Test-only packet synthesis shared by unit and integration tests.
//!
//! [`PacketBuilder`] produces well-formed Ethernet II frames (or bare IP
//! datagrams) carrying TCP, UDP or an arbitrary IP protocol, so tests can
//! exercise the scanner and the assemblers without capture files.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::{
    byte_order::{write_network_u16, write_network_u32},
    frame::{Frame, LinkType, Timestamp},
    protocols::{
        ethernet::{ETHERTYPE_IPV4, ETHERTYPE_IPV6},
        ipv4::{PROTO_TCP, PROTO_UDP},
    },
};

const ETHERTYPE_VLAN: u16 = 0x8100;
const SOURCE_MAC: [u8; 6] = [0x02, 0, 0, 0, 0, 0x01];
const DESTINATION_MAC: [u8; 6] = [0x02, 0, 0, 0, 0, 0x02];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Transport {
    Tcp {
        source_port: u16,
        destination_port: u16,
        sequence: u32,
        acknowledgement: u32,
        flags: u8,
    },
    Udp {
        source_port: u16,
        destination_port: u16,
    },
    Raw(u8),
}

/// Fluent builder for synthetic frames.
///
/// # Examples
///
/// ```
/// use flowframe::{protocols::tcp::FLAG_ACK, test_helpers::PacketBuilder};
///
/// let bytes = PacketBuilder::tcp(40_000, 80)
///     .sequence(1_000)
///     .flags(FLAG_ACK)
///     .payload(b"GET / HTTP/1.1\r\n\r\n".to_vec())
///     .build();
/// assert_eq!(bytes.len(), 14 + 20 + 20 + 18);
/// ```
#[derive(Clone, Debug)]
pub struct PacketBuilder {
    source: IpAddr,
    destination: IpAddr,
    vlan: Option<u16>,
    identification: u16,
    fragment_offset: usize,
    more_fragments: bool,
    transport: Transport,
    payload: Vec<u8>,
}

impl PacketBuilder {
    fn with_transport(transport: Transport) -> Self {
        Self {
            source: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
            destination: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
            vlan: None,
            identification: 1,
            fragment_offset: 0,
            more_fragments: false,
            transport,
            payload: Vec::new(),
        }
    }

    /// TCP segment between the given ports, 10.0.0.1 → 10.0.0.2.
    #[must_use]
    pub fn tcp(source_port: u16, destination_port: u16) -> Self {
        Self::with_transport(Transport::Tcp {
            source_port,
            destination_port,
            sequence: 0,
            acknowledgement: 0,
            flags: 0,
        })
    }

    /// UDP datagram between the given ports.
    #[must_use]
    pub fn udp(source_port: u16, destination_port: u16) -> Self {
        Self::with_transport(Transport::Udp {
            source_port,
            destination_port,
        })
    }

    /// IP datagram whose payload follows the IP header directly.
    #[must_use]
    pub fn raw(protocol: u8) -> Self { Self::with_transport(Transport::Raw(protocol)) }

    /// Use IPv4 addresses.
    #[must_use]
    pub fn ipv4(mut self, source: Ipv4Addr, destination: Ipv4Addr) -> Self {
        self.source = IpAddr::V4(source);
        self.destination = IpAddr::V4(destination);
        self
    }

    /// Use IPv6 addresses.
    #[must_use]
    pub fn ipv6(mut self, source: Ipv6Addr, destination: Ipv6Addr) -> Self {
        self.source = IpAddr::V6(source);
        self.destination = IpAddr::V6(destination);
        self
    }

    /// Insert one 802.1Q tag.
    #[must_use]
    pub fn vlan(mut self, id: u16) -> Self {
        self.vlan = Some(id);
        self
    }

    /// Swap addresses and ports to produce the reverse direction.
    #[must_use]
    pub fn reversed(mut self) -> Self {
        std::mem::swap(&mut self.source, &mut self.destination);
        match &mut self.transport {
            Transport::Tcp {
                source_port,
                destination_port,
                ..
            }
            | Transport::Udp {
                source_port,
                destination_port,
            } => std::mem::swap(source_port, destination_port),
            Transport::Raw(_) => {}
        }
        self
    }

    /// TCP sequence number.
    #[must_use]
    pub fn sequence(mut self, value: u32) -> Self {
        if let Transport::Tcp { sequence, .. } = &mut self.transport {
            *sequence = value;
        }
        self
    }

    /// TCP acknowledgement number.
    #[must_use]
    pub fn acknowledgement(mut self, value: u32) -> Self {
        if let Transport::Tcp {
            acknowledgement, ..
        } = &mut self.transport
        {
            *acknowledgement = value;
        }
        self
    }

    /// TCP flag byte.
    #[must_use]
    pub fn flags(mut self, value: u8) -> Self {
        if let Transport::Tcp { flags, .. } = &mut self.transport {
            *flags = value;
        }
        self
    }

    /// IPv4 identification field.
    #[must_use]
    pub fn identification(mut self, value: u16) -> Self {
        self.identification = value;
        self
    }

    /// Mark the datagram as an IPv4 fragment at `offset` bytes.
    ///
    /// `offset` must be a multiple of eight.
    #[must_use]
    pub fn fragment(mut self, offset: usize, more_fragments: bool) -> Self {
        self.fragment_offset = offset;
        self.more_fragments = more_fragments;
        self
    }

    /// Transport payload.
    #[must_use]
    pub fn payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Ethernet II frame carrying the datagram.
    #[must_use]
    pub fn build(&self) -> Vec<u8> {
        let datagram = self.build_ip();
        let ethertype = match self.source {
            IpAddr::V4(_) => ETHERTYPE_IPV4,
            IpAddr::V6(_) => ETHERTYPE_IPV6,
        };
        let mut frame = Vec::with_capacity(18 + datagram.len());
        frame.extend_from_slice(&DESTINATION_MAC);
        frame.extend_from_slice(&SOURCE_MAC);
        if let Some(id) = self.vlan {
            frame.extend_from_slice(&write_network_u16(ETHERTYPE_VLAN));
            frame.extend_from_slice(&write_network_u16(id & 0x0fff));
        }
        frame.extend_from_slice(&write_network_u16(ethertype));
        frame.extend_from_slice(&datagram);
        frame
    }

    /// Bare IP datagram without link-layer framing.
    #[must_use]
    pub fn build_ip(&self) -> Vec<u8> {
        let body = self.transport_bytes();
        match (self.source, self.destination) {
            (IpAddr::V4(source), IpAddr::V4(destination)) => {
                self.ipv4_header(source, destination, body.len(), self.fragment_offset, self.more_fragments)
                    .into_iter()
                    .chain(body)
                    .collect()
            }
            (IpAddr::V6(source), IpAddr::V6(destination)) => {
                self.ipv6_header(source, destination, body.len())
                    .into_iter()
                    .chain(body)
                    .collect()
            }
            _ => body,
        }
    }

    /// Wrap [`build`](Self::build) in a [`Frame`].
    #[must_use]
    pub fn frame(&self, number: u64, timestamp: Timestamp) -> Frame {
        Frame::new(timestamp, number, self.build())
    }

    /// Split the IPv4 datagram into Ethernet frames, each carrying at most
    /// `chunk` bytes of the IP payload. `chunk` is rounded down to a
    /// multiple of eight.
    #[must_use]
    pub fn ipv4_fragments(&self, chunk: usize) -> Vec<Vec<u8>> {
        let (IpAddr::V4(source), IpAddr::V4(destination)) = (self.source, self.destination) else {
            return vec![self.build()];
        };
        let chunk = (chunk / 8).max(1) * 8;
        let body = self.transport_bytes();
        body.chunks(chunk)
            .enumerate()
            .map(|(index, part)| {
                let offset = index * chunk;
                let more = offset + part.len() < body.len();
                let mut frame = Vec::new();
                frame.extend_from_slice(&DESTINATION_MAC);
                frame.extend_from_slice(&SOURCE_MAC);
                frame.extend_from_slice(&write_network_u16(ETHERTYPE_IPV4));
                frame.extend(self.ipv4_header(source, destination, part.len(), offset, more));
                frame.extend_from_slice(part);
                frame
            })
            .collect()
    }

    fn protocol_number(&self) -> u8 {
        match self.transport {
            Transport::Tcp { .. } => PROTO_TCP,
            Transport::Udp { .. } => PROTO_UDP,
            Transport::Raw(protocol) => protocol,
        }
    }

    fn transport_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(20 + self.payload.len());
        match self.transport {
            Transport::Tcp {
                source_port,
                destination_port,
                sequence,
                acknowledgement,
                flags,
            } => {
                out.extend_from_slice(&write_network_u16(source_port));
                out.extend_from_slice(&write_network_u16(destination_port));
                out.extend_from_slice(&write_network_u32(sequence));
                out.extend_from_slice(&write_network_u32(acknowledgement));
                out.push(5 << 4);
                out.push(flags);
                out.extend_from_slice(&write_network_u16(u16::MAX));
                out.extend_from_slice(&[0, 0, 0, 0]);
            }
            Transport::Udp {
                source_port,
                destination_port,
            } => {
                let length = u16::try_from(8 + self.payload.len()).unwrap_or(u16::MAX);
                out.extend_from_slice(&write_network_u16(source_port));
                out.extend_from_slice(&write_network_u16(destination_port));
                out.extend_from_slice(&write_network_u16(length));
                out.extend_from_slice(&[0, 0]);
            }
            Transport::Raw(_) => {}
        }
        out.extend_from_slice(&self.payload);
        out
    }

    fn ipv4_header(
        &self,
        source: Ipv4Addr,
        destination: Ipv4Addr,
        body_len: usize,
        fragment_offset: usize,
        more_fragments: bool,
    ) -> Vec<u8> {
        let total = u16::try_from(20 + body_len).unwrap_or(u16::MAX);
        let mut flags_offset = u16::try_from(fragment_offset / 8).unwrap_or(0x1fff) & 0x1fff;
        if more_fragments {
            flags_offset |= 0x2000;
        }
        let mut header = Vec::with_capacity(20);
        header.extend_from_slice(&[0x45, 0]);
        header.extend_from_slice(&write_network_u16(total));
        header.extend_from_slice(&write_network_u16(self.identification));
        header.extend_from_slice(&write_network_u16(flags_offset));
        header.extend_from_slice(&[64, self.protocol_number(), 0, 0]);
        header.extend_from_slice(&source.octets());
        header.extend_from_slice(&destination.octets());
        let checksum = ipv4_checksum(&header);
        header[10..12].copy_from_slice(&write_network_u16(checksum));
        header
    }

    fn ipv6_header(&self, source: Ipv6Addr, destination: Ipv6Addr, body_len: usize) -> Vec<u8> {
        let mut header = Vec::with_capacity(40);
        header.extend_from_slice(&[0x60, 0, 0, 0]);
        header.extend_from_slice(&write_network_u16(u16::try_from(body_len).unwrap_or(u16::MAX)));
        header.extend_from_slice(&[self.protocol_number(), 64]);
        header.extend_from_slice(&source.octets());
        header.extend_from_slice(&destination.octets());
        header
    }
}

fn ipv4_checksum(header: &[u8]) -> u16 {
    let mut sum: u32 = header
        .chunks(2)
        .map(|pair| (u32::from(pair[0]) << 8) | u32::from(pair.get(1).copied().unwrap_or(0)))
        .sum();
    while sum > 0xffff {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !u16::try_from(sum).unwrap_or(u16::MAX)
}

/// Frame carrying a bare IPv4 datagram.
#[must_use]
pub fn raw_ipv4_frame(builder: &PacketBuilder, number: u64, timestamp: Timestamp) -> Frame {
    Frame::new(timestamp, number, builder.build_ip()).with_link_type(LinkType::RawIpv4)
}
