//! Conditional edges between protocols.
//!
//! A [`Binding`] says "after a header of `source`, a header of `target`
//! follows if the predicate holds". Bindings are evaluated by the
//! [`HeaderScanner`](crate::chain::HeaderScanner) in tier order
//! ([`BindingPriority::Primary`] before [`BindingPriority::Heuristic`]) and
//! declaration order within a tier.

use std::{fmt, sync::Arc};

use super::ProtocolId;
use crate::{
    buffer::FrameBuffer,
    chain::{HeaderChain, HeaderEntry, HeaderView},
};

/// Evaluation tier of a binding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BindingPriority {
    /// Authoritative mapping, typically a type/port field lookup.
    Primary,
    /// Content sniffing, tried only when no primary binding matched.
    Heuristic,
}

/// Predicate deciding whether a binding fires for the current frame.
pub type BindingPredicate = Arc<dyn Fn(&BindingInput<'_>) -> bool + Send + Sync>;

/// Everything a predicate may inspect.
#[derive(Clone, Copy, Debug)]
pub struct BindingInput<'a> {
    buffer: &'a FrameBuffer,
    chain: &'a HeaderChain,
    source: HeaderEntry,
}

impl<'a> BindingInput<'a> {
    pub(crate) fn new(buffer: &'a FrameBuffer, chain: &'a HeaderChain, source: HeaderEntry) -> Self {
        Self {
            buffer,
            chain,
            source,
        }
    }

    /// Whole captured frame.
    #[must_use]
    pub fn buffer(&self) -> &'a FrameBuffer { self.buffer }

    /// Headers resolved so far, ending with the source header.
    #[must_use]
    pub fn chain(&self) -> &'a HeaderChain { self.chain }

    /// View over the header the binding is evaluated against.
    #[must_use]
    pub fn source_view(&self) -> HeaderView<'a> { HeaderView::from_entry(self.buffer, self.source) }

    /// Offset at which the candidate next header would start.
    #[must_use]
    pub fn next_offset(&self) -> usize { self.source.end() }

    /// Bytes from the candidate next header to the end of the frame.
    #[must_use]
    pub fn remainder(&self) -> &'a [u8] { self.buffer.tail(self.next_offset()) }

    /// View over the first earlier header with `id`, if present.
    #[must_use]
    pub fn header(&self, id: ProtocolId) -> Option<HeaderView<'a>> {
        self.chain
            .entry(id)
            .map(|entry| HeaderView::from_entry(self.buffer, entry))
    }
}

/// Directed, conditional edge from one protocol to another.
#[derive(Clone)]
pub struct Binding {
    source: Option<ProtocolId>,
    target: ProtocolId,
    priority: BindingPriority,
    dependencies: Vec<ProtocolId>,
    predicate: BindingPredicate,
}

impl Binding {
    /// Create a binding from `source` to `target` with an explicit tier.
    ///
    /// A `source` of `None` makes the binding a wildcard evaluated after
    /// every header, following the source-specific bindings of its tier.
    #[must_use]
    pub fn new(
        source: Option<ProtocolId>,
        target: ProtocolId,
        priority: BindingPriority,
        predicate: impl Fn(&BindingInput<'_>) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            source,
            target,
            priority,
            dependencies: Vec::new(),
            predicate: Arc::new(predicate),
        }
    }

    /// Shorthand for a [`BindingPriority::Primary`] binding.
    #[must_use]
    pub fn primary(
        source: ProtocolId,
        target: ProtocolId,
        predicate: impl Fn(&BindingInput<'_>) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::new(Some(source), target, BindingPriority::Primary, predicate)
    }

    /// Shorthand for a [`BindingPriority::Heuristic`] binding.
    #[must_use]
    pub fn heuristic(
        source: ProtocolId,
        target: ProtocolId,
        predicate: impl Fn(&BindingInput<'_>) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::new(Some(source), target, BindingPriority::Heuristic, predicate)
    }

    /// Require `ids` to be present earlier in the chain before the predicate
    /// may run.
    #[must_use]
    pub fn depends_on(mut self, ids: impl IntoIterator<Item = ProtocolId>) -> Self {
        self.dependencies.extend(ids);
        self
    }

    /// Source protocol, or `None` for a wildcard.
    #[must_use]
    pub const fn source(&self) -> Option<ProtocolId> { self.source }

    /// Protocol selected when the binding fires.
    #[must_use]
    pub const fn target(&self) -> ProtocolId { self.target }

    /// Evaluation tier.
    #[must_use]
    pub const fn priority(&self) -> BindingPriority { self.priority }

    /// Declared dependency ids.
    #[must_use]
    pub fn dependencies(&self) -> &[ProtocolId] { &self.dependencies }

    /// Whether every dependency already appears in `chain`.
    #[must_use]
    pub fn dependencies_met(&self, chain: &HeaderChain) -> bool {
        self.dependencies.iter().all(|id| chain.contains(*id))
    }

    /// Run the predicate.
    #[must_use]
    pub fn matches(&self, input: &BindingInput<'_>) -> bool { (self.predicate)(input) }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("source", &self.source)
            .field("target", &self.target)
            .field("priority", &self.priority)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}
