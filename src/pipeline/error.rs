//! Errors surfaced by the controller.

use thiserror::Error;

use crate::protocol::RegistryError;

/// Errors returned while feeding or shutting down a
/// [`Controller`](crate::pipeline::Controller).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The dispatch worker is gone, so frames can no longer be delivered.
    #[error("dispatch worker stopped")]
    WorkerStopped,
    /// The dispatch worker panicked outside a subscriber callback.
    #[error("dispatch worker panicked: {0}")]
    WorkerPanicked(String),
}

/// Errors returned when building a controller.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum PipelineConfigError {
    /// The dispatch queue needs room for at least one frame.
    #[error("invalid dispatch capacity {0}; must be at least 1")]
    InvalidCapacity(usize),
    /// A zero byte budget would make hold ineffective.
    #[error("invalid byte budget {0}; must be at least 1")]
    InvalidByteBudget(usize),
    /// The default protocol registry could not be built.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}
