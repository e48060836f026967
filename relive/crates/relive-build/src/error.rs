//! Error types for module builds

use std::path::PathBuf;

use relive_core::ConfigError;
use thiserror::Error;

/// Error type for the build orchestrator
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to start compiler `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no project named `{0}`")]
    UnknownProject(String),

    /// Only one compile per project may be in flight
    #[error("project `{0}` is already compiling")]
    AlreadyCompiling(String),

    #[error("nothing to compile for project `{0}`")]
    NothingToCompile(String),

    #[error("failed to load module {path}: {reason}")]
    Load { path: PathBuf, reason: String },

    #[error("module {path} does not export `{symbol}`")]
    MissingEntryPoint { path: PathBuf, symbol: &'static str },

    #[error("failed to watch {path}: {reason}")]
    Watch { path: PathBuf, reason: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type alias for build operations
pub type BuildResult<T> = std::result::Result<T, BuildError>;
