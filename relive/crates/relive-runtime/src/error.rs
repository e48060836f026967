//! Error types for the runtime

use relive_build::BuildError;
use relive_core::{ConfigError, HistoryError, RegistryError, SwapError};
use thiserror::Error;

/// Error type for runtime operations
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Swap(#[from] SwapError),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The runtime was created without a build orchestrator
    #[error("no build projects are configured")]
    NoOrchestrator,
}

/// Result type alias for runtime operations
pub type RuntimeResult<T> = std::result::Result<T, RuntimeError>;
