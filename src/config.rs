//! Configuration records consumed by the builders.
//!
//! All records deserialize with `serde`, filling missing fields from
//! [`Default`]. Loading them from a file is left to the embedding
//! application.

use std::time::Duration;

use serde::Deserialize;

use crate::chain::DEFAULT_MAX_CHAIN_DEPTH;

/// Which analyzed frames reach subscribers.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryFilter {
    /// Deliver every frame, consumed or not.
    #[default]
    All,
    /// Withhold frames an analyzer marked as consumed, such as IP fragments
    /// that were folded into a reassembled datagram.
    SkipConsumed,
}

impl DeliveryFilter {
    /// Whether a frame with the given consumed flag should be delivered.
    #[must_use]
    pub const fn admits(self, consumed: bool) -> bool {
        match self {
            Self::All => true,
            Self::SkipConsumed => !consumed,
        }
    }
}

/// Controller settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Outbound bytes above which frames are dispatched even while held.
    pub byte_budget: usize,
    /// Capacity of the bounded queue feeding the dispatch worker.
    pub dispatch_capacity: usize,
    /// Delivery filter applied before frames enter the dispatch queue.
    pub delivery: DeliveryFilter,
    /// Maximum number of headers resolved per frame.
    pub max_chain_depth: usize,
}

impl PipelineConfig {
    /// Default outbound byte budget: 16 MiB.
    pub const DEFAULT_BYTE_BUDGET: usize = 16 * 1024 * 1024;
    /// Default dispatch queue capacity.
    pub const DEFAULT_DISPATCH_CAPACITY: usize = 1024;
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            byte_budget: Self::DEFAULT_BYTE_BUDGET,
            dispatch_capacity: Self::DEFAULT_DISPATCH_CAPACITY,
            delivery: DeliveryFilter::default(),
            max_chain_depth: DEFAULT_MAX_CHAIN_DEPTH,
        }
    }
}

/// Sequencer settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    /// Flow-time after which an incomplete sequence is evicted.
    pub timeout: Duration,
    /// Upper bound on the bytes one sequence may accumulate.
    pub max_sequence_bytes: usize,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_sequence_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Sliding-window read mode settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Maximum number of bytes kept in the window.
    pub capacity: usize,
}

impl Default for WindowConfig {
    fn default() -> Self { Self { capacity: 64 * 1024 } }
}

#[cfg(test)]
mod tests {
    use serde::{
        Deserialize,
        de::{
            IntoDeserializer,
            value::{Error, MapDeserializer, StrDeserializer},
        },
    };

    use super::{DeliveryFilter, PipelineConfig};
    use crate::chain::DEFAULT_MAX_CHAIN_DEPTH;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let fields = MapDeserializer::<_, Error>::new(
            vec![("byte_budget", 4096_usize), ("dispatch_capacity", 8)].into_iter(),
        );
        let config = PipelineConfig::deserialize(fields).expect("valid config");
        assert_eq!(config.byte_budget, 4096);
        assert_eq!(config.dispatch_capacity, 8);
        assert_eq!(config.delivery, DeliveryFilter::All);
        assert_eq!(config.max_chain_depth, DEFAULT_MAX_CHAIN_DEPTH);
    }

    #[test]
    fn delivery_filter_uses_snake_case() {
        let raw: StrDeserializer<'_, Error> = "skip_consumed".into_deserializer();
        let filter = DeliveryFilter::deserialize(raw).expect("known variant");
        assert_eq!(filter, DeliveryFilter::SkipConsumed);
        assert!(!filter.admits(true));
        assert!(DeliveryFilter::All.admits(true));
    }
}
