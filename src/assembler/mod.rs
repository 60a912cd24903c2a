//! Reassembly analyzers built on the [`Sequencer`](crate::sequencer::Sequencer).
//!
//! [`FlowAssembler`] reconstructs TCP payloads for tracked flows and exposes
//! them as a buffer, a stream or a sliding window.
//! [`IpFragmentAssembler`] rebuilds fragmented IPv4 datagrams.

pub mod error;
pub mod flow_key;
pub mod ip;
pub mod segment;
pub mod stream;
pub mod tcp;
pub mod window;

pub use error::FlowError;
pub use flow_key::FlowKey;
pub use ip::{IpFragmentAssembler, ReassembledDatagram};
pub use segment::SegmentEvent;
pub use stream::FlowStream;
pub use tcp::{BufferedFlow, CompletedFlow, FlowAssembler, TrackOptions};
pub use window::FlowWindow;
