//! Error types for relive-core
//!
//! One enum per concern. Swap faults are values, not panics: a
//! [`SwapError::Faulted`] means the swap rolled back and the previous
//! Constructor set is live again.

use relive_guard::{FaultInfo, GuardError};
use thiserror::Error;

use crate::ids::{ConstructorId, ObjectId};
use crate::swap::SwapPhase;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A Constructor with this name exists; replacements go through a swap
    #[error("constructor `{name}` is already registered as {id}")]
    AlreadyRegistered { name: String, id: ConstructorId },

    #[error("no constructor with id {0}")]
    UnknownConstructor(ConstructorId),

    #[error("no constructor named `{0}`")]
    UnknownName(String),

    #[error("no live instance {0}")]
    UnknownObject(ObjectId),
}

/// Error type for swap transactions
#[derive(Debug, Clone, Error)]
pub enum SwapError {
    /// A swap was requested from inside a guarded call
    #[error("swap requested while a guarded call is active on this thread")]
    NestedGuard,

    /// A phase faulted and the swap was rolled back
    #[error("swap faulted during {phase}: {fault}")]
    Faulted { phase: SwapPhase, fault: FaultInfo },

    /// The fault guard itself failed
    #[error(transparent)]
    Guard(GuardError),
}

impl SwapError {
    pub fn phase(&self) -> Option<SwapPhase> {
        match self {
            SwapError::Faulted { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}

/// Error type for generation history navigation
#[derive(Debug, Clone, Error)]
pub enum HistoryError {
    #[error("no more history")]
    NoMoreHistory,

    /// New generations are only recorded at the present
    #[error("cannot record while {cursor} step(s) in the past")]
    NotAtPresent { cursor: usize },

    #[error("cannot shrink history to {requested}, {cursor} undo step(s) are in use")]
    ResizeBelowCursor { requested: usize, cursor: usize },

    /// Re-applying a generation failed; the cursor did not move
    #[error("history step failed: {0}")]
    Swap(#[from] SwapError),
}

/// Error type for configuration validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid history size: {0}")]
    InvalidHistorySize(String),

    #[error("project name must not be empty")]
    EmptyProjectName,

    #[error("project `{0}` is configured more than once")]
    DuplicateProject(String),

    #[error("project `{0}` has no compiler configured")]
    MissingCompiler(String),

    /// A flag style with an empty prefix would glue values onto nothing
    #[error("project `{project}`: flag style has an empty `{flag}` prefix")]
    EmptyFlagPrefix { project: String, flag: &'static str },

    #[error("failed to read config: {0}")]
    Read(String),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid value for environment variable {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },
}

/// Result type alias for registry operations
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

/// Result type alias for swap transactions
pub type SwapResult<T> = std::result::Result<T, SwapError>;

/// Result type alias for history navigation
pub type HistoryResult<T> = std::result::Result<T, HistoryError>;

#[cfg(test)]
mod tests {
    use super::*;
    use relive_guard::FaultKind;

    #[test]
    fn test_faulted_swap_names_phase() {
        let err = SwapError::Faulted {
            phase: SwapPhase::SerializeIn,
            fault: FaultInfo::unknown(),
        };
        assert_eq!(err.phase(), Some(SwapPhase::SerializeIn));
        assert_eq!(err.to_string(), "swap faulted during SERIALIZE_IN: unknown fault");
        assert_eq!(FaultInfo::unknown().kind, FaultKind::Unknown);
    }

    #[test]
    fn test_history_wraps_swap_error() {
        let err: HistoryError = SwapError::NestedGuard.into();
        assert!(matches!(err, HistoryError::Swap(SwapError::NestedGuard)));
    }
}
