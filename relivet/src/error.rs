//! Error handling module for the relivet CLI.

use relive_build::BuildError;
use relive_core::ConfigError;
use thiserror::Error;

/// Main error type for the relivet CLI application.
#[derive(Error, Debug)]
pub enum RelivetError {
    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error when input validation fails.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A build or module load failed.
    #[error("Command execution failed: {0}")]
    CommandExecution(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<ConfigError> for RelivetError {
    fn from(err: ConfigError) -> Self {
        RelivetError::Config(err.to_string())
    }
}

impl From<BuildError> for RelivetError {
    fn from(err: BuildError) -> Self {
        match err {
            BuildError::Config(err) => err.into(),
            BuildError::UnknownProject(name) => {
                RelivetError::Validation(format!("unknown project `{}`", name))
            },
            other => RelivetError::CommandExecution(other.to_string()),
        }
    }
}

/// Result type alias using RelivetError.
pub type Result<T> = std::result::Result<T, RelivetError>;
