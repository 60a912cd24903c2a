//! Analyzer trait and the priority-ordered analyzer table.
//!
//! Analyzers run synchronously on the controller's drain loop, once per
//! frame whose header bitmap intersects their subscription. A failing or
//! panicking analyzer is logged and skipped; the remaining analyzers and
//! frames are unaffected.

use std::{borrow::Cow, error::Error as StdError};

use thiserror::Error;
use tracing::warn;

use crate::{
    frame::{DecodedFrame, Timestamp},
    metrics,
    panic,
    protocol::ProtocolSet,
};

/// Failure reported by an [`Analyzer`].
#[derive(Debug, Error)]
#[error("{message}")]
pub struct AnalyzerError {
    message: Cow<'static, str>,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl AnalyzerError {
    /// Error with a message only.
    #[must_use]
    pub fn msg(message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Error wrapping an underlying cause.
    #[must_use]
    pub fn new(
        message: impl Into<Cow<'static, str>>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Per-frame scratch space handed to analyzers.
#[derive(Debug, Default)]
pub struct AnalysisContext {
    now: Timestamp,
    consumed: bool,
}

impl AnalysisContext {
    pub(crate) fn new(now: Timestamp) -> Self {
        Self {
            now,
            consumed: false,
        }
    }

    /// Current processing time.
    #[must_use]
    pub const fn now(&self) -> Timestamp { self.now }

    /// Mark the frame as consumed. Whether consumed frames still reach
    /// subscribers is decided by the
    /// [`DeliveryFilter`](crate::config::DeliveryFilter).
    pub fn consume(&mut self) { self.consumed = true; }

    /// Whether an analyzer consumed the frame.
    #[must_use]
    pub const fn is_consumed(&self) -> bool { self.consumed }
}

/// Stateful per-frame processing stage, such as a reassembler.
pub trait Analyzer: Send {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Process one frame.
    ///
    /// # Errors
    ///
    /// Any error is logged by the controller and otherwise ignored.
    fn analyze(
        &mut self,
        frame: &DecodedFrame,
        ctx: &mut AnalysisContext,
    ) -> Result<(), AnalyzerError>;

    /// Processing time moved to `now`. Called before the frame carrying that
    /// timestamp is analyzed.
    fn advance_time(&mut self, _now: Timestamp) {}

    /// The controller is shutting down.
    fn shutdown(&mut self) {}
}

struct Registered {
    priority: i32,
    protocols: ProtocolSet,
    analyzer: Box<dyn Analyzer>,
}

/// Analyzers sorted by ascending priority, ties in registration order.
#[derive(Default)]
pub(crate) struct AnalyzerTable {
    entries: Vec<Registered>,
}

impl AnalyzerTable {
    pub fn insert(&mut self, priority: i32, protocols: ProtocolSet, analyzer: Box<dyn Analyzer>) {
        let at = self.entries.partition_point(|entry| entry.priority <= priority);
        self.entries.insert(
            at,
            Registered {
                priority,
                protocols,
                analyzer,
            },
        );
    }

    pub fn len(&self) -> usize { self.entries.len() }

    /// Run every subscribed analyzer on `frame`, isolating failures.
    pub fn dispatch(&mut self, frame: &mut DecodedFrame, now: Timestamp) {
        let present = frame.protocols();
        let mut ctx = AnalysisContext::new(now);
        for entry in &mut self.entries {
            if !entry.protocols.intersects(&present) {
                continue;
            }
            let analyzer = &mut entry.analyzer;
            let shared: &DecodedFrame = frame;
            match panic::contain(|| analyzer.analyze(shared, &mut ctx)) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    metrics::inc_analyzer_failures();
                    warn!(
                        analyzer = analyzer.name(),
                        frame = shared.number(),
                        error = %err,
                        "analyzer failed"
                    );
                }
                Err(panic) => {
                    metrics::inc_analyzer_failures();
                    warn!(
                        analyzer = analyzer.name(),
                        frame = shared.number(),
                        panic = %panic,
                        "analyzer panicked"
                    );
                }
            }
        }
        if ctx.is_consumed() {
            frame.set_consumed();
        }
    }

    pub fn advance_time(&mut self, now: Timestamp) {
        for entry in &mut self.entries {
            let analyzer = &mut entry.analyzer;
            if let Err(panic) = panic::contain(|| analyzer.advance_time(now)) {
                metrics::inc_analyzer_failures();
                warn!(analyzer = analyzer.name(), panic = %panic, "analyzer panicked advancing time");
            }
        }
    }

    pub fn shutdown(&mut self) {
        for entry in &mut self.entries {
            let analyzer = &mut entry.analyzer;
            if let Err(panic) = panic::contain(|| analyzer.shutdown()) {
                warn!(analyzer = analyzer.name(), panic = %panic, "analyzer panicked on shutdown");
            }
        }
    }
}

impl std::fmt::Debug for AnalyzerTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(
                self.entries
                    .iter()
                    .map(|entry| (entry.priority, entry.analyzer.name())),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tracing_test::traced_test;

    use super::{AnalysisContext, Analyzer, AnalyzerError, AnalyzerTable};
    use crate::{
        chain::HeaderScanner,
        frame::{DecodedFrame, Timestamp},
        protocol::{ProtocolId, ProtocolSet},
        protocols::{self, TCP, UDP},
        test_helpers::PacketBuilder,
    };

    struct Probe {
        name: &'static str,
        seen: Arc<Mutex<Vec<&'static str>>>,
        behaviour: Behaviour,
    }

    #[derive(Clone, Copy)]
    enum Behaviour {
        Ok,
        Fail,
        Panic,
        Consume,
    }

    impl Analyzer for Probe {
        fn name(&self) -> &str { self.name }

        fn analyze(
            &mut self,
            _frame: &DecodedFrame,
            ctx: &mut AnalysisContext,
        ) -> Result<(), AnalyzerError> {
            self.seen.lock().expect("seen lock").push(self.name);
            match self.behaviour {
                Behaviour::Ok => Ok(()),
                Behaviour::Fail => Err(AnalyzerError::msg("bad segment")),
                Behaviour::Panic => panic!("analyzer exploded"),
                Behaviour::Consume => {
                    ctx.consume();
                    Ok(())
                }
            }
        }
    }

    fn tcp_frame() -> DecodedFrame {
        let scanner = HeaderScanner::new(protocols::standard_registry().expect("registry"));
        PacketBuilder::tcp(1, 2).frame(1, Timestamp::ZERO).decode(&scanner)
    }

    #[test]
    #[traced_test]
    fn failures_do_not_stop_later_analyzers() {
        let seen: Arc<Mutex<Vec<&'static str>>> = Arc::default();
        let mut table = AnalyzerTable::default();
        let tcp = ProtocolSet::new().with(TCP);
        for (priority, name, behaviour) in [
            (30, "last", Behaviour::Consume),
            (10, "panics", Behaviour::Panic),
            (20, "fails", Behaviour::Fail),
            (10, "second", Behaviour::Ok),
        ] {
            table.insert(
                priority,
                tcp,
                Box::new(Probe {
                    name,
                    seen: Arc::clone(&seen),
                    behaviour,
                }),
            );
        }
        table.insert(
            0,
            ProtocolSet::new().with(UDP).with(ProtocolId::new(300)),
            Box::new(Probe {
                name: "udp-only",
                seen: Arc::clone(&seen),
                behaviour: Behaviour::Ok,
            }),
        );

        let mut frame = tcp_frame();
        table.dispatch(&mut frame, Timestamp::ZERO);

        assert_eq!(
            *seen.lock().expect("seen lock"),
            vec!["panics", "second", "fails", "last"]
        );
        assert!(frame.is_consumed());
        assert!(logs_contain("analyzer panicked"));
        assert!(logs_contain("analyzer exploded"));
        assert!(logs_contain("bad segment"));
    }
}
