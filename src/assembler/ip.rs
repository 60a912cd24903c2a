//! IPv4 fragment reassembly on top of the generic sequencer.

use std::{
    collections::HashMap,
    hash::{DefaultHasher, Hash, Hasher},
    net::Ipv4Addr,
};

use bytes::Bytes;
use log::{debug, warn};
use tokio::sync::mpsc;

use crate::{
    config::SequencerConfig,
    frame::{DecodedFrame, Timestamp},
    pipeline::{AnalysisContext, Analyzer, AnalyzerError},
    protocols::{IPV4, Ipv4View},
    sequencer::{AddOutcome, FlowHash, Fragment, SequenceListener, Sequencer},
};

/// A datagram rebuilt from its fragments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReassembledDatagram {
    pub hash: FlowHash,
    /// IP header of the first fragment, as captured.
    pub header: Bytes,
    /// The reassembled IP payload.
    pub payload: Bytes,
}

/// Analyzer folding IPv4 fragments back into whole datagrams.
///
/// Fragments are keyed by source, destination, identification and
/// protocol, and are marked consumed so a
/// [`DeliveryFilter::SkipConsumed`](crate::config::DeliveryFilter::SkipConsumed)
/// controller withholds them from subscribers.
pub struct IpFragmentAssembler {
    sequencer: Sequencer,
    headers: HashMap<FlowHash, Bytes>,
    datagrams: mpsc::UnboundedSender<ReassembledDatagram>,
}

impl IpFragmentAssembler {
    /// Assembler and the receiving end of its datagram channel.
    #[must_use]
    pub fn new(config: SequencerConfig) -> (Self, mpsc::UnboundedReceiver<ReassembledDatagram>) {
        let (datagrams, rx) = mpsc::unbounded_channel();
        (
            Self {
                sequencer: Sequencer::new(config),
                headers: HashMap::new(),
                datagrams,
            },
            rx,
        )
    }

    /// Observe the lifecycle of every fragment group.
    #[must_use]
    pub fn with_listener(mut self, listener: impl SequenceListener + 'static) -> Self {
        self.sequencer.add_listener(listener);
        self
    }

    /// Number of datagrams still missing fragments.
    #[must_use]
    pub fn in_flight(&self) -> usize { self.sequencer.len() }
}

fn fragment_key(source: Ipv4Addr, destination: Ipv4Addr, id: u16, protocol: u8) -> FlowHash {
    let mut hasher = DefaultHasher::new();
    (source, destination, id, protocol).hash(&mut hasher);
    FlowHash::new(hasher.finish())
}

impl Analyzer for IpFragmentAssembler {
    fn name(&self) -> &str { "ipv4-fragment-assembler" }

    fn analyze(
        &mut self,
        frame: &DecodedFrame,
        ctx: &mut AnalysisContext,
    ) -> Result<(), AnalyzerError> {
        let Some(ip) = frame.header(IPV4).and_then(Ipv4View::new) else {
            return Ok(());
        };
        if !ip.is_fragment() {
            return Ok(());
        }
        let (Some(source), Some(destination), Some(id), Some(protocol), Some(offset)) = (
            ip.source(),
            ip.destination(),
            ip.identification(),
            ip.protocol(),
            ip.fragment_offset(),
        ) else {
            return Err(AnalyzerError::msg("truncated IPv4 fragment header"));
        };
        ctx.consume();

        let hash = fragment_key(source, destination, id, protocol);
        let header = ip.view();
        let start = header.offset() + header.len();
        let data = frame
            .buffer()
            .slice(start, ip.datagram_end().saturating_sub(start))
            .unwrap_or_default();
        if offset == 0 {
            self.headers
                .entry(hash)
                .or_insert_with(|| Bytes::copy_from_slice(header.bytes()));
        }

        let fragment = Fragment::with_data(frame.number(), frame.timestamp(), offset, data);
        let fragment = if ip.more_fragments() {
            fragment
        } else {
            fragment.last()
        };
        match self.sequencer.add_fragment(hash, fragment) {
            Ok(AddOutcome::Complete(sequence)) => {
                let header = self.headers.remove(&hash).unwrap_or_default();
                let payload = sequence.reassemble().map_err(|err| {
                    AnalyzerError::new(format!("datagram {id:#06x} could not be laid out"), err)
                })?;
                debug!(
                    "reassembled datagram {id:#06x} from {} fragments ({} bytes)",
                    sequence.members().len(),
                    payload.len()
                );
                let _ = self.datagrams.send(ReassembledDatagram {
                    hash,
                    header,
                    payload,
                });
                Ok(())
            }
            Ok(AddOutcome::Pending | AddOutcome::Duplicate) => Ok(()),
            Err(err) => {
                warn!("dropping fragment of datagram {id:#06x} from {source}: {err}");
                Err(AnalyzerError::new("fragment rejected", err))
            }
        }
    }

    fn advance_time(&mut self, now: Timestamp) {
        for sequence in self.sequencer.advance_time(now) {
            self.headers.remove(&sequence.hash());
        }
    }

    fn shutdown(&mut self) {
        self.sequencer.abandon_all();
        self.headers.clear();
    }
}

impl std::fmt::Debug for IpFragmentAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpFragmentAssembler")
            .field("sequencer", &self.sequencer)
            .finish_non_exhaustive()
    }
}
