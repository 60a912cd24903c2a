//! Greedy header-chain resolution.
//!
//! Starting from a root protocol, the scanner repeatedly asks the current
//! descriptor for its header length, appends the header and picks the next
//! protocol from the first matching binding. The walk never backtracks:
//! once a binding has fired its choice is final. Malformed input only ever
//! shortens the chain; it is never reported as an error.

use std::sync::Arc;

use tracing::trace;

use super::{HeaderChain, HeaderEntry, HeaderView};
use crate::{
    buffer::FrameBuffer,
    protocol::{BindingInput, ProtocolId, ProtocolRegistry},
};

/// Default bound on the number of headers resolved per frame.
pub const DEFAULT_MAX_CHAIN_DEPTH: usize = 32;

/// Resolves [`HeaderChain`]s against a shared [`ProtocolRegistry`].
#[derive(Clone, Debug)]
pub struct HeaderScanner {
    registry: Arc<ProtocolRegistry>,
    max_depth: usize,
}

impl HeaderScanner {
    /// Create a scanner using the default depth bound.
    #[must_use]
    pub fn new(registry: Arc<ProtocolRegistry>) -> Self {
        Self {
            registry,
            max_depth: DEFAULT_MAX_CHAIN_DEPTH,
        }
    }

    /// Override the maximum number of headers per chain.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Registry consulted by this scanner.
    #[must_use]
    pub fn registry(&self) -> &Arc<ProtocolRegistry> { &self.registry }

    /// Resolve the header chain of `buffer`, starting with `root`.
    ///
    /// The result is a pure function of the registry and the buffer bytes.
    /// A header whose computed length is zero or extends past the end of the
    /// buffer terminates the chain at its offset; the remainder becomes
    /// payload.
    #[must_use]
    pub fn resolve_chain(&self, buffer: &FrameBuffer, root: ProtocolId) -> HeaderChain {
        let mut chain = HeaderChain::new(buffer.len());
        let mut current = root;
        let mut offset = 0;

        while !current.is_payload() && chain.len() < self.max_depth {
            let Some(descriptor) = self.registry.descriptor(current) else {
                trace!(protocol = %current, offset, "no descriptor; treating remainder as payload");
                break;
            };

            let view = HeaderView::to_end(buffer, current, offset);
            let length = descriptor.header_length(&view);
            if length == 0 || length > view.len() {
                trace!(
                    protocol = %current,
                    offset,
                    length,
                    available = view.len(),
                    "header truncated; chain ends"
                );
                break;
            }

            let entry = HeaderEntry {
                id: current,
                offset,
                length,
            };
            chain.push(entry);
            offset = entry.end();
            current = self.next_protocol(buffer, &chain, entry);
        }

        chain
    }

    /// First-match selection of the protocol following `source`.
    fn next_protocol(
        &self,
        buffer: &FrameBuffer,
        chain: &HeaderChain,
        source: HeaderEntry,
    ) -> ProtocolId {
        let input = BindingInput::new(buffer, chain, source);
        self.registry
            .bindings_for(source.id)
            .iter()
            .filter(|binding| binding.dependencies_met(chain))
            .find(|binding| binding.matches(&input))
            .map_or(ProtocolId::PAYLOAD, |binding| binding.target())
    }
}
