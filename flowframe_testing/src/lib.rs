//! Utilities for exercising `flowframe` pipelines in tests.
//!
//! Synthetic packets come from [`PacketBuilder`]; [`RecordingSubscriber`]
//! and [`RecordingListener`] capture what the pipeline and sequencer emit.
//!
//! ```rust
//! use flowframe_testing::{PacketBuilder, RecordingSubscriber};
//! use flowframe::Timestamp;
//!
//! let frame = PacketBuilder::tcp(40_000, 80)
//!     .payload(b"GET /".to_vec())
//!     .frame(1, Timestamp::ZERO);
//! assert_eq!(frame.number, 1);
//! let recorder = RecordingSubscriber::default();
//! assert!(recorder.numbers().is_empty());
//! ```

pub mod logging;
pub mod metrics;
pub mod recording;

pub use crate::metrics::{SnapshotEntry, counter_value, snapshot};
pub use flowframe::test_helpers::{PacketBuilder, raw_ipv4_frame};
pub use logging::{LoggerHandle, logger};
pub use recording::{RecordingListener, RecordingSubscriber};
