#![doc(html_root_url = "https://docs.rs/flowframe/latest")]
//! Public API for the `flowframe` library.
//!
//! This crate resolves protocol header chains for captured frames through a
//! declarative binding graph, reassembles fragmented and out-of-order
//! payloads in capture time, and moves decoded frames through an ordered,
//! back-pressured analysis and dispatch pipeline.

pub mod assembler;
pub mod buffer;
pub mod byte_order;
pub mod chain;
pub mod config;
pub mod frame;
pub mod metrics;
pub mod panic;
pub mod pipeline;
pub mod protocol;
pub mod protocols;
pub mod sequencer;
pub mod test_helpers;

pub use assembler::{FlowAssembler, FlowError, FlowKey, IpFragmentAssembler};
pub use buffer::FrameBuffer;
pub use chain::{HeaderChain, HeaderScanner, HeaderView};
pub use config::{DeliveryFilter, PipelineConfig, SequencerConfig, WindowConfig};
pub use frame::{DecodedFrame, Frame, LinkType, Timestamp};
pub use metrics::{ANALYZER_FAILURES, FRAMES_PROCESSED, OUTBOUND_BUFFERED_BYTES, SEQUENCES_TOTAL};
pub use pipeline::{Analyzer, Controller, FrameSubscriber, HoldHandle, PipelineError};
pub use protocol::{Binding, ProtocolDescriptor, ProtocolId, ProtocolRegistry, RegistryError};
pub use sequencer::{FlowHash, Fragment, FragmentSequence, SequenceListener, Sequencer};
