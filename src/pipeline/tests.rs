use std::sync::{Arc, Mutex};

use rstest::rstest;
use tokio_util::sync::CancellationToken;

use super::{
    AnalysisContext,
    Analyzer,
    AnalyzerError,
    Controller,
    PipelineConfigError,
    ReplaySource,
};
use crate::{
    config::DeliveryFilter,
    frame::{DecodedFrame, Frame, Timestamp},
    protocol::ProtocolSet,
    protocols::TCP,
    test_helpers::PacketBuilder,
};

type Seen = Arc<Mutex<Vec<u64>>>;

fn recorder() -> (Seen, impl FnMut(&DecodedFrame) + Send + 'static) {
    let seen: Seen = Arc::default();
    let sink = Arc::clone(&seen);
    (seen, move |frame: &DecodedFrame| {
        sink.lock().expect("seen lock").push(frame.number());
    })
}

fn tcp_frame(number: u64, millis: u64) -> Frame {
    PacketBuilder::tcp(40_000, 80).frame(number, Timestamp::from_millis(millis))
}

/// Consumes every even-numbered frame and records the time it was told.
struct EvenConsumer {
    times: Arc<Mutex<Vec<Timestamp>>>,
}

impl Analyzer for EvenConsumer {
    fn name(&self) -> &str { "even-consumer" }

    fn analyze(
        &mut self,
        frame: &DecodedFrame,
        ctx: &mut AnalysisContext,
    ) -> Result<(), AnalyzerError> {
        if frame.number() % 2 == 0 {
            ctx.consume();
        }
        Ok(())
    }

    fn advance_time(&mut self, now: Timestamp) { self.times.lock().expect("times lock").push(now); }
}

#[tokio::test]
async fn held_frames_are_released_in_capture_order() {
    let (seen, subscriber) = recorder();
    let mut controller = Controller::builder()
        .subscriber(subscriber)
        .build()
        .expect("controller");

    controller.hold();
    for (number, millis) in [(3, 30), (1, 10), (2, 10), (4, 5)] {
        controller
            .next_frame(tcp_frame(number, millis))
            .await
            .expect("ingest");
    }
    assert_eq!(controller.pending_outbound(), 4);

    assert_eq!(controller.release(), 0);
    controller.flush().await.expect("flush");
    assert_eq!(controller.pending_outbound(), 0);
    controller.shutdown().await.expect("shutdown");

    assert_eq!(*seen.lock().expect("seen lock"), vec![4, 1, 2, 3]);
}

#[tokio::test]
async fn nested_holds_need_matching_releases() {
    let (seen, subscriber) = recorder();
    let mut controller = Controller::builder()
        .subscriber(subscriber)
        .build()
        .expect("controller");

    controller.hold();
    controller.hold();
    controller.next_frame(tcp_frame(1, 1)).await.expect("ingest");
    controller.release();
    controller.flush().await.expect("flush");
    assert_eq!(controller.pending_outbound(), 1);

    controller.release();
    controller.flush().await.expect("flush");
    assert_eq!(controller.pending_outbound(), 0);
    controller.shutdown().await.expect("shutdown");
    assert_eq!(*seen.lock().expect("seen lock"), vec![1]);
}

#[tokio::test]
async fn last_release_sends_held_frames_without_further_input() {
    let (seen, subscriber) = recorder();
    let mut controller = Controller::builder()
        .subscriber(subscriber)
        .build()
        .expect("controller");

    controller.hold();
    controller.hold();
    controller.next_frame(tcp_frame(2, 20)).await.expect("ingest");
    controller.next_frame(tcp_frame(1, 10)).await.expect("ingest");

    assert_eq!(controller.release_and_flush().await.expect("flush"), 1);
    assert_eq!(controller.pending_outbound(), 2);
    assert_eq!(controller.release_and_flush().await.expect("flush"), 0);
    assert_eq!(controller.pending_outbound(), 0);

    controller.shutdown().await.expect("shutdown");
    assert_eq!(*seen.lock().expect("seen lock"), vec![1, 2]);
}

#[tokio::test]
async fn byte_budget_forces_dispatch_while_held() {
    let frame_len = tcp_frame(0, 0).buffer.len();
    let mut controller = Controller::builder()
        .byte_budget(frame_len * 2)
        .build()
        .expect("controller");
    controller.hold();

    for number in 1..=5 {
        controller
            .next_frame(tcp_frame(number, number))
            .await
            .expect("ingest");
        assert!(controller.buffered_bytes() <= frame_len * 2);
    }
    assert_eq!(controller.pending_outbound(), 2);
    assert!(controller.hold_handle().is_held());
    controller.shutdown().await.expect("shutdown");
}

#[rstest]
#[case::all(DeliveryFilter::All, vec![1, 2, 3, 4])]
#[case::skip_consumed(DeliveryFilter::SkipConsumed, vec![1, 3])]
#[tokio::test]
async fn delivery_filter_decides_on_consumed_frames(
    #[case] filter: DeliveryFilter,
    #[case] expected: Vec<u64>,
) {
    let (seen, subscriber) = recorder();
    let mut controller = Controller::builder()
        .delivery(filter)
        .analyzer(
            0,
            ProtocolSet::new().with(TCP),
            EvenConsumer {
                times: Arc::default(),
            },
        )
        .subscriber(subscriber)
        .build()
        .expect("controller");
    for number in 1..=4 {
        controller
            .next_frame(tcp_frame(number, number))
            .await
            .expect("ingest");
    }
    controller.shutdown().await.expect("shutdown");
    assert_eq!(*seen.lock().expect("seen lock"), expected);
}

#[tokio::test]
async fn analyzers_see_monotonic_processing_time() {
    let times: Arc<Mutex<Vec<Timestamp>>> = Arc::default();
    let mut controller = Controller::builder()
        .analyzer(
            0,
            ProtocolSet::new().with(TCP),
            EvenConsumer {
                times: Arc::clone(&times),
            },
        )
        .build()
        .expect("controller");
    for (number, millis) in [(1, 5), (2, 3), (3, 7)] {
        controller
            .next_frame(tcp_frame(number, millis))
            .await
            .expect("ingest");
    }
    assert_eq!(controller.now(), Timestamp::from_millis(7));
    controller.shutdown().await.expect("shutdown");
    assert_eq!(
        *times.lock().expect("times lock"),
        vec![
            Timestamp::from_millis(5),
            Timestamp::from_millis(5),
            Timestamp::from_millis(7)
        ]
    );
}

#[rstest]
#[case::zero_capacity(0, 1, "capacity")]
#[case::zero_budget(8, 0, "budget")]
#[tokio::test]
async fn build_rejects_zero_limits(
    #[case] capacity: usize,
    #[case] budget: usize,
    #[case] which: &str,
) {
    let err = Controller::builder()
        .dispatch_capacity(capacity)
        .byte_budget(budget)
        .build()
        .expect_err("invalid configuration");
    match (which, err) {
        ("capacity", PipelineConfigError::InvalidCapacity(0))
        | ("budget", PipelineConfigError::InvalidByteBudget(0)) => {}
        (_, other) => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn run_replays_until_exhausted() {
    let (seen, subscriber) = recorder();
    let mut controller = Controller::builder()
        .dispatch_capacity(1)
        .subscriber(subscriber)
        .build()
        .expect("controller");
    let source: ReplaySource = (1..=20).map(|n| tcp_frame(n, n)).collect();

    let ingested = controller
        .run(source, CancellationToken::new())
        .await
        .expect("run");
    controller.shutdown().await.expect("shutdown");

    assert_eq!(ingested, 20);
    assert_eq!(*seen.lock().expect("seen lock"), (1..=20).collect::<Vec<_>>());
}

#[tokio::test]
async fn cancelled_run_ingests_nothing() {
    let mut controller = Controller::builder().build().expect("controller");
    let stop = CancellationToken::new();
    stop.cancel();
    let ingested = controller
        .run(ReplaySource::new([tcp_frame(1, 1)]), stop)
        .await
        .expect("run");
    assert_eq!(ingested, 0);
    controller.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn subscriber_panics_do_not_stop_delivery() {
    let (seen, recorder) = recorder();
    let mut controller = Controller::builder()
        .subscriber(|frame: &DecodedFrame| {
            assert_ne!(frame.number(), 2, "subscriber rejects frame 2");
        })
        .subscriber(recorder)
        .build()
        .expect("controller");
    for number in 1..=3 {
        controller
            .next_frame(tcp_frame(number, number))
            .await
            .expect("ingest");
    }
    controller.shutdown().await.expect("shutdown");
    assert_eq!(*seen.lock().expect("seen lock"), vec![1, 2, 3]);
}
