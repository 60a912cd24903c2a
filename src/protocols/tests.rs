use std::net::{Ipv4Addr, Ipv6Addr};

use rstest::rstest;

use super::{
    DNS,
    ETHERNET,
    EthernetView,
    IPV4,
    IPV6,
    Ipv4View,
    Ipv6View,
    TCP,
    TcpView,
    UDP,
    UdpView,
    http::looks_like_http,
    standard_registry,
    tcp::{FLAG_ACK, FLAG_PSH, FLAG_SYN},
};
use crate::{
    chain::HeaderScanner,
    frame::{LinkType, Timestamp},
    test_helpers::{PacketBuilder, raw_ipv4_frame},
};

fn scanner() -> HeaderScanner { HeaderScanner::new(standard_registry().expect("built-in registry")) }

#[test]
fn standard_registry_names_every_protocol() {
    let registry = standard_registry().expect("built-in registry");
    for (id, name) in [
        (ETHERNET, "ethernet"),
        (IPV4, "ipv4"),
        (IPV6, "ipv6"),
        (TCP, "tcp"),
        (UDP, "udp"),
        (super::HTTP, "http"),
        (DNS, "dns"),
    ] {
        assert_eq!(registry.id_of(name), Some(id));
    }
}

#[test]
fn tcp_fields_are_exposed() {
    let frame = PacketBuilder::tcp(40_000, 8_443)
        .ipv4(Ipv4Addr::new(192, 168, 1, 2), Ipv4Addr::new(192, 168, 1, 3))
        .sequence(0xdead_beef)
        .acknowledgement(7)
        .flags(FLAG_ACK | FLAG_PSH)
        .payload(vec![1, 2, 3])
        .frame(1, Timestamp::ZERO)
        .decode(&scanner());

    let ip = frame.header(IPV4).and_then(Ipv4View::new).expect("ipv4");
    assert_eq!(ip.source(), Some(Ipv4Addr::new(192, 168, 1, 2)));
    assert_eq!(ip.total_length(), Some(20 + 20 + 3));
    assert!(!ip.is_fragment());

    let tcp = frame.header(TCP).and_then(TcpView::new).expect("tcp");
    assert_eq!(tcp.source_port(), Some(40_000));
    assert_eq!(tcp.sequence(), Some(0xdead_beef));
    assert_eq!(tcp.acknowledgement(), Some(7));
    assert!(tcp.has_flags(FLAG_ACK | FLAG_PSH));
    assert!(!tcp.has_flags(FLAG_SYN));
    assert_eq!(frame.payload(), &[1, 2, 3]);
}

#[test]
fn ipv6_udp_dns_chain() {
    let frame = PacketBuilder::udp(53, 33_000)
        .ipv6(Ipv6Addr::LOCALHOST, Ipv6Addr::UNSPECIFIED)
        .payload(vec![0; 20])
        .frame(1, Timestamp::ZERO)
        .decode(&scanner());

    assert_eq!(frame.chain().ids().collect::<Vec<_>>(), vec![ETHERNET, IPV6, UDP, DNS]);
    let ip = frame.header(IPV6).and_then(Ipv6View::new).expect("ipv6");
    assert_eq!(ip.source(), Some(Ipv6Addr::LOCALHOST));
    assert_eq!(ip.next_header(), Some(17));
    let udp = frame.header(UDP).and_then(UdpView::new).expect("udp");
    assert_eq!(udp.length(), Some(28));
    assert_eq!(frame.payload().len(), 8);
}

#[test]
fn raw_ipv4_link_type_starts_at_ip() {
    let frame = raw_ipv4_frame(&PacketBuilder::tcp(1, 2), 1, Timestamp::ZERO);
    assert_eq!(frame.link_type, LinkType::RawIpv4);
    let decoded = frame.decode(&scanner());
    assert_eq!(decoded.chain().ids().collect::<Vec<_>>(), vec![IPV4, TCP]);
}

#[test]
fn ethernet_view_reports_tags() {
    let frame = PacketBuilder::udp(1, 2)
        .vlan(100)
        .frame(1, Timestamp::ZERO)
        .decode(&scanner());
    let eth = frame.header(ETHERNET).and_then(EthernetView::new).expect("ethernet");
    assert_eq!(eth.vlan_tags(), 1);
    assert_eq!(eth.ethertype(), Some(super::ethernet::ETHERTYPE_IPV4));
    assert!(eth.source().is_some());
}

#[test]
fn views_refuse_foreign_headers() {
    let frame = PacketBuilder::tcp(1, 2).frame(1, Timestamp::ZERO).decode(&scanner());
    assert!(frame.header(IPV4).and_then(TcpView::new).is_none());
}

#[rstest]
#[case::request(b"POST /x HTTP/1.1", true)]
#[case::response(b"HTTP/1.1 200 OK", true)]
#[case::lowercase(b"get / http/1.1", false)]
#[case::tls(b"\x16\x03\x01\x02\x00", false)]
fn http_sniffing(#[case] bytes: &[u8], #[case] expected: bool) {
    assert_eq!(looks_like_http(bytes), expected);
}
