//! Criterion benchmarks for header-chain resolution and flow reassembly.
//!
//! This benchmark suite covers:
//! - scanning Ethernet/IP/TCP frames that end in HTTP or an opaque payload,
//! - scanning VLAN-tagged and IPv6 frames, and
//! - rebuilding a buffered flow from shuffled segments.

use std::{net::Ipv6Addr, time::Duration};

use criterion::{BenchmarkId, Criterion, Throughput, black_box};
use flowframe::{
    FlowAssembler,
    Frame,
    HeaderScanner,
    LinkType,
    SequencerConfig,
    Timestamp,
    assembler::{SegmentEvent, TrackOptions},
    protocols::{
        self,
        ETHERNET,
        tcp::{FLAG_ACK, FLAG_FIN, FLAG_SYN},
    },
};
use flowframe_testing::PacketBuilder;

const SEGMENTS: u32 = 64;
const SEGMENT_LEN: u32 = 512;

fn scanner() -> HeaderScanner {
    match protocols::standard_registry() {
        Ok(registry) => HeaderScanner::new(registry),
        Err(err) => panic!("built-in registry rejected: {err}"),
    }
}

fn workloads() -> Vec<(&'static str, Vec<u8>)> {
    let request = b"GET /index.html HTTP/1.1\r\nHost: example.test\r\n\r\n".to_vec();
    vec![
        (
            "tcp_http",
            PacketBuilder::tcp(40_000, 80).payload(request.clone()).build(),
        ),
        (
            "tcp_opaque",
            PacketBuilder::tcp(40_000, 443).payload(vec![0x17; 1_200]).build(),
        ),
        (
            "vlan_udp",
            PacketBuilder::udp(5_353, 53).vlan(42).payload(vec![0; 64]).build(),
        ),
        (
            "ipv6_tcp",
            PacketBuilder::tcp(40_000, 8080)
                .ipv6(Ipv6Addr::LOCALHOST, Ipv6Addr::LOCALHOST)
                .payload(request)
                .build(),
        ),
    ]
}

fn benchmark_scan(c: &mut Criterion) {
    let scanner = scanner();
    let mut group = c.benchmark_group("chain/resolve");

    for (label, bytes) in workloads() {
        let frame = Frame::new(Timestamp::ZERO, 1, bytes).with_link_type(LinkType::Ethernet);
        group.throughput(Throughput::Bytes(frame.buffer.len() as u64));
        group.bench_function(BenchmarkId::from_parameter(label), |b| {
            b.iter(|| black_box(scanner.resolve_chain(&frame.buffer, ETHERNET)));
        });
    }

    group.finish();
}

/// Segments of one flow, reversed so every segment but the first parks.
fn shuffled_flow(scanner: &HeaderScanner) -> Vec<SegmentEvent> {
    let packet = |number: u64, sequence: u32, flags: u8, payload: Vec<u8>| {
        let frame = PacketBuilder::tcp(40_000, 80)
            .sequence(sequence)
            .flags(flags)
            .payload(payload)
            .frame(number, Timestamp::ZERO)
            .decode(scanner);
        match SegmentEvent::from_frame(&frame) {
            Some(segment) => segment,
            None => panic!("frame {number} is not a TCP segment"),
        }
    };
    let mut segments: Vec<SegmentEvent> = (0..SEGMENTS)
        .map(|i| {
            let flags = if i + 1 == SEGMENTS { FLAG_ACK | FLAG_FIN } else { FLAG_ACK };
            packet(
                u64::from(i) + 2,
                1 + i * SEGMENT_LEN,
                flags,
                vec![0x5a; SEGMENT_LEN as usize],
            )
        })
        .collect();
    segments.reverse();
    segments.insert(0, packet(1, 0, FLAG_SYN, Vec::new()));
    segments
}

fn benchmark_reassembly(c: &mut Criterion) {
    let scanner = scanner();
    let segments = shuffled_flow(&scanner);
    let mut group = c.benchmark_group("assembler/buffered");
    group.throughput(Throughput::Bytes(u64::from(SEGMENTS * SEGMENT_LEN)));
    group.bench_function("reversed_segments", |b| {
        b.iter(|| {
            let assembler = FlowAssembler::new(SequencerConfig {
                timeout: Duration::from_secs(30),
                ..SequencerConfig::default()
            });
            let mut flow = assembler.track_buffered(segments[0].key, TrackOptions::default());
            for segment in &segments {
                if let Err(err) = assembler.on_segment(segment.clone()) {
                    panic!("segment rejected: {err}");
                }
            }
            black_box(flow.try_take())
        });
    });
    group.finish();
}

/// Entrypoint for chain resolution and reassembly benchmarks.
fn main() {
    let mut criterion = Criterion::default().configure_from_args();
    benchmark_scan(&mut criterion);
    benchmark_reassembly(&mut criterion);
    criterion.final_summary();
}
