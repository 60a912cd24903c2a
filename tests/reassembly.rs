//! TCP flow and IPv4 datagram reassembly driven through a controller.

use std::{net::Ipv4Addr, time::Duration};

use bytes::Bytes;
use flowframe::{
    Controller,
    DeliveryFilter,
    FlowAssembler,
    FlowError,
    FlowKey,
    Frame,
    IpFragmentAssembler,
    SequencerConfig,
    Timestamp,
    WindowConfig,
    assembler::TrackOptions,
    pipeline::ReplaySource,
    protocol::ProtocolSet,
    protocols::{
        IPV4,
        TCP,
        tcp::{FLAG_ACK, FLAG_FIN, FLAG_PSH, FLAG_SYN},
    },
    sequencer::SequenceEvent,
};
use flowframe_testing::{PacketBuilder, RecordingListener, RecordingSubscriber};
use futures::StreamExt;
use rstest::{fixture, rstest};
use tokio_util::sync::CancellationToken;

const ISN: u32 = 7_000;

fn client() -> FlowKey {
    FlowKey::new(Ipv4Addr::new(10, 0, 0, 1), 40_000, Ipv4Addr::new(10, 0, 0, 2), 80)
}

/// Client segment carrying `payload` at `offset` bytes into the stream.
fn segment(number: u64, secs: u64, offset: u32, flags: u8, payload: &[u8]) -> Frame {
    PacketBuilder::tcp(40_000, 80)
        .sequence(ISN.wrapping_add(1).wrapping_add(offset))
        .flags(flags)
        .payload(payload.to_vec())
        .frame(number, Timestamp::from_secs(secs))
}

fn syn(number: u64, secs: u64) -> Frame {
    PacketBuilder::tcp(40_000, 80)
        .sequence(ISN)
        .flags(FLAG_SYN)
        .frame(number, Timestamp::from_secs(secs))
}

#[fixture]
fn assembler() -> FlowAssembler {
    FlowAssembler::new(SequencerConfig {
        timeout: Duration::from_secs(5),
        ..SequencerConfig::default()
    })
}

fn controller(assembler: &FlowAssembler) -> Controller {
    Controller::builder()
        .analyzer(0, ProtocolSet::new().with(TCP), assembler.clone())
        .build()
        .expect("controller")
}

async fn replay(controller: &mut Controller, frames: Vec<Frame>) {
    controller
        .run(ReplaySource::new(frames), CancellationToken::new())
        .await
        .expect("replay");
}

#[rstest]
#[tokio::test]
async fn buffered_flow_is_rebuilt_from_shuffled_segments(assembler: FlowAssembler) {
    let flow = assembler.track_buffered(client(), TrackOptions::default());
    let mut controller = controller(&assembler);

    replay(
        &mut controller,
        vec![
            syn(1, 0),
            segment(2, 1, 10, FLAG_ACK | FLAG_PSH | FLAG_FIN, b"/1.1\r\n"),
            segment(3, 1, 0, FLAG_ACK, b"GET / HTTP"),
        ],
    )
    .await;
    controller.shutdown().await.expect("shutdown");

    assert_eq!(flow.await, Ok(Bytes::from_static(b"GET / HTTP/1.1\r\n")));
}

#[rstest]
#[tokio::test]
async fn stream_mode_yields_bytes_as_gaps_close(assembler: FlowAssembler) {
    let mut stream = assembler.track_stream(client(), TrackOptions::default());
    let mut controller = controller(&assembler);

    controller.next_frame(syn(1, 0)).await.expect("ingest");
    controller
        .next_frame(segment(2, 0, 3, FLAG_ACK, b"def"))
        .await
        .expect("ingest");
    controller
        .next_frame(segment(3, 0, 0, FLAG_ACK, b"abc"))
        .await
        .expect("ingest");
    assert_eq!(stream.next().await, Some(Ok(Bytes::from_static(b"abc"))));
    assert_eq!(stream.next().await, Some(Ok(Bytes::from_static(b"def"))));

    controller
        .next_frame(segment(4, 0, 6, FLAG_ACK | FLAG_FIN, b""))
        .await
        .expect("ingest");
    assert_eq!(stream.next().await, None);
    controller.shutdown().await.expect("shutdown");
}

#[rstest]
#[tokio::test]
async fn window_mode_bounds_memory(assembler: FlowAssembler) {
    let assembler = assembler.with_window_config(WindowConfig { capacity: 8 });
    let window = assembler.track_window(client(), TrackOptions::default());
    let mut controller = controller(&assembler);

    let mut frames = vec![syn(1, 0)];
    frames.extend((0..4_u32).map(|i| {
        let chunk = [b'a' + u8::try_from(i).expect("small index"); 5];
        segment(u64::from(i) + 2, 0, i * 5, FLAG_ACK, &chunk)
    }));
    frames.push(segment(6, 0, 20, FLAG_ACK | FLAG_FIN, b""));
    replay(&mut controller, frames).await;
    controller.shutdown().await.expect("shutdown");

    assert_eq!(window.end(), 20);
    assert_eq!(window.base(), 12);
    assert_eq!(&window.contents()[..], b"cccddddd");
    assert_eq!(window.outcome(), Some(Ok(())));
}

#[rstest]
#[tokio::test]
async fn later_traffic_expires_stalled_flows(assembler: FlowAssembler) {
    let listener = RecordingListener::default();
    let assembler = assembler.with_listener(listener.clone());
    let flow = assembler.track_buffered(client(), TrackOptions::default());
    let mut controller = controller(&assembler);

    let unrelated = PacketBuilder::tcp(50_000, 443).frame(4, Timestamp::from_secs(9));
    replay(
        &mut controller,
        vec![syn(1, 0), segment(2, 1, 0, FLAG_ACK, b"partial"), unrelated],
    )
    .await;

    assert_eq!(flow.await, Err(FlowError::TimedOut));
    assert_eq!(
        listener.count(|event| matches!(event, SequenceEvent::Timeout(_))),
        1
    );
    assert_eq!(
        listener.count(|event| matches!(event, SequenceEvent::Complete(_))),
        0
    );
    controller.shutdown().await.expect("shutdown");
}

#[rstest]
#[tokio::test]
async fn shutdown_abandons_unfinished_flows(assembler: FlowAssembler) {
    let flow = assembler.track_buffered(client(), TrackOptions::default());
    let mut controller = controller(&assembler);

    replay(&mut controller, vec![syn(1, 0), segment(2, 0, 0, FLAG_ACK, b"half")]).await;
    assert_eq!(assembler.in_flight(), 1);
    controller.shutdown().await.expect("shutdown");

    assert_eq!(flow.await, Err(FlowError::Abandoned));
    assert_eq!(assembler.in_flight(), 0);
}

#[rstest]
#[tokio::test]
async fn auto_tracking_reports_each_flow(assembler: FlowAssembler) {
    let mut completions = assembler.auto_track();
    let mut controller = controller(&assembler);
    let other = |number, flags, payload: &[u8]| {
        PacketBuilder::tcp(40_001, 80)
            .sequence(1)
            .flags(flags)
            .payload(payload.to_vec())
            .frame(number, Timestamp::from_secs(1))
    };

    replay(
        &mut controller,
        vec![
            syn(1, 0),
            other(2, FLAG_ACK | FLAG_FIN, b"second"),
            segment(3, 1, 0, FLAG_ACK | FLAG_FIN, b"first"),
        ],
    )
    .await;
    controller.shutdown().await.expect("shutdown");

    let mut results = Vec::new();
    while let Some(done) = completions.recv().await {
        results.push((done.key.source_port, done.result));
    }
    results.sort_by_key(|(port, _)| *port);
    assert_eq!(
        results,
        vec![
            (40_000, Ok(Bytes::from_static(b"first"))),
            (40_001, Ok(Bytes::from_static(b"second"))),
        ]
    );
}

#[tokio::test]
async fn fragments_are_withheld_once_consumed() {
    let (fragments, mut datagrams) = IpFragmentAssembler::new(SequencerConfig::default());
    let recorder = RecordingSubscriber::default();
    let mut controller = Controller::builder()
        .delivery(DeliveryFilter::SkipConsumed)
        .analyzer(0, ProtocolSet::new().with(IPV4), fragments)
        .subscriber(recorder.clone())
        .build()
        .expect("controller");

    let payload: Vec<u8> = (0..120).collect();
    let pieces = PacketBuilder::udp(5_000, 6_000)
        .identification(0x0bad)
        .payload(payload.clone())
        .ipv4_fragments(48);
    let count = u64::try_from(pieces.len()).expect("few fragments");
    let mut frames: Vec<Frame> = pieces
        .into_iter()
        .zip(1_u64..)
        .map(|(bytes, number)| Frame::new(Timestamp::from_millis(number), number, bytes))
        .collect();
    frames.reverse();
    frames.push(PacketBuilder::tcp(1, 2).frame(count + 1, Timestamp::from_millis(count + 1)));
    replay(&mut controller, frames).await;
    controller.shutdown().await.expect("shutdown");

    assert_eq!(recorder.numbers(), vec![count + 1]);
    let datagram = datagrams.recv().await.expect("reassembled datagram");
    assert_eq!(&datagram.payload[8..], &payload[..]);
}
