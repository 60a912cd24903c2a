//! Consuming builder for [`Controller`].

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use super::{
    Controller,
    analyzer::{Analyzer, AnalyzerTable},
    dispatch::{self, FrameSubscriber},
    error::PipelineConfigError,
    hold::HoldHandle,
    ordering::OrderingQueue,
};
use crate::{
    chain::HeaderScanner,
    config::{DeliveryFilter, PipelineConfig},
    protocol::{ProtocolRegistry, ProtocolSet},
    protocols,
    sequencer::ProcessingClock,
};

/// Configures analyzers, subscribers and limits before a [`Controller`]
/// is started.
///
/// ```
/// use flowframe::{
///     frame::DecodedFrame,
///     pipeline::Controller,
/// };
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let controller = Controller::builder()
///     .dispatch_capacity(16)
///     .subscriber(|frame: &DecodedFrame| println!("frame {}", frame.number()))
///     .build()
///     .expect("valid configuration");
/// controller.shutdown().await.expect("clean shutdown");
/// # }
/// ```
#[must_use]
pub struct ControllerBuilder {
    registry: Option<Arc<ProtocolRegistry>>,
    config: PipelineConfig,
    analyzers: AnalyzerTable,
    subscribers: Vec<Box<dyn FrameSubscriber>>,
    hold: HoldHandle,
}

impl Default for ControllerBuilder {
    fn default() -> Self {
        Self {
            registry: None,
            config: PipelineConfig::default(),
            analyzers: AnalyzerTable::default(),
            subscribers: Vec::new(),
            hold: HoldHandle::default(),
        }
    }
}

impl ControllerBuilder {
    /// Builder with default configuration and the standard protocol table.
    pub fn new() -> Self { Self::default() }

    /// Resolve header chains against `registry` instead of
    /// [`protocols::standard_registry`].
    pub fn registry(mut self, registry: Arc<ProtocolRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Replace every setting with `config`.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Outbound bytes above which frames are dispatched even while held.
    pub fn byte_budget(mut self, bytes: usize) -> Self {
        self.config.byte_budget = bytes;
        self
    }

    /// Capacity of the queue feeding the dispatch worker.
    pub fn dispatch_capacity(mut self, capacity: usize) -> Self {
        self.config.dispatch_capacity = capacity;
        self
    }

    /// Choose which analyzed frames reach subscribers.
    pub fn delivery(mut self, filter: DeliveryFilter) -> Self {
        self.config.delivery = filter;
        self
    }

    /// Register an analyzer for frames containing any of `protocols`.
    ///
    /// Lower priorities run first; equal priorities run in registration
    /// order.
    pub fn analyzer(
        mut self,
        priority: i32,
        protocols: ProtocolSet,
        analyzer: impl Analyzer + 'static,
    ) -> Self {
        self.analyzers.insert(priority, protocols, Box::new(analyzer));
        self
    }

    /// Register a subscriber. Subscribers run on the dispatch worker in
    /// registration order.
    pub fn subscriber(mut self, subscriber: impl FrameSubscriber + 'static) -> Self {
        self.subscribers.push(Box::new(subscriber));
        self
    }

    /// Handle on the hold counter of the controller being built, for
    /// subscribers that pause dispatch themselves.
    #[must_use]
    pub fn hold_handle(&self) -> HoldHandle { self.hold.clone() }

    /// Validate the configuration and start the dispatch worker.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineConfigError`] for a zero capacity or budget, or if
    /// the standard registry cannot be built.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn build(self) -> Result<Controller, PipelineConfigError> {
        let Self {
            registry,
            config,
            analyzers,
            subscribers,
            hold,
        } = self;
        if config.dispatch_capacity == 0 {
            return Err(PipelineConfigError::InvalidCapacity(config.dispatch_capacity));
        }
        if config.byte_budget == 0 {
            return Err(PipelineConfigError::InvalidByteBudget(config.byte_budget));
        }
        let registry = match registry {
            Some(registry) => registry,
            None => protocols::standard_registry()?,
        };
        let scanner = HeaderScanner::new(registry).with_max_depth(config.max_chain_depth);

        let (tx, rx) = mpsc::channel(config.dispatch_capacity);
        let worker = dispatch::spawn_worker(rx, subscribers);
        debug!(
            analyzers = analyzers.len(),
            capacity = config.dispatch_capacity,
            byte_budget = config.byte_budget,
            "controller started"
        );
        Ok(Controller {
            scanner,
            analyzers,
            inbound: OrderingQueue::new(),
            outbound: OrderingQueue::new(),
            hold,
            config,
            clock: ProcessingClock::default(),
            tx: Some(tx),
            worker: Some(worker),
        })
    }
}

impl std::fmt::Debug for ControllerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerBuilder")
            .field("config", &self.config)
            .field("analyzers", &self.analyzers)
            .field("subscribers", &self.subscribers.len())
            .finish_non_exhaustive()
    }
}
