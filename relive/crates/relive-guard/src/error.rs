//! Error Module - Guarded Call Outcomes
//!
//! A guarded call either returns its value or one of these errors.
//! `Faulted` and `Skipped` both carry the fault that was observed; the
//! difference is whether the work actually ran this time.

use crate::fault::FaultInfo;
use thiserror::Error;

/// Failure of a guarded call.
#[derive(Debug, Clone, Error)]
pub enum GuardError {
    /// The work ran and was stopped by a trap or a panic.
    #[error("guarded call faulted: {0}")]
    Faulted(FaultInfo),

    /// The call site is latched by an earlier fault and the work was not run.
    #[error("guarded call skipped, latched since: {0}")]
    Skipped(FaultInfo),

    /// The platform trap handler could not be installed.
    #[error("failed to install fault handler: {0}")]
    HandlerInstall(String),
}

impl GuardError {
    /// The fault behind this error, if any.
    pub fn fault(&self) -> Option<&FaultInfo> {
        match self {
            GuardError::Faulted(fault) | GuardError::Skipped(fault) => Some(fault),
            GuardError::HandlerInstall(_) => None,
        }
    }

    /// Consume the error, yielding the fault (or an unknown fault if the
    /// handler itself failed).
    pub fn into_fault(self) -> FaultInfo {
        match self {
            GuardError::Faulted(fault) | GuardError::Skipped(fault) => fault,
            GuardError::HandlerInstall(_) => FaultInfo::unknown(),
        }
    }

    /// Whether the work was skipped without running.
    pub fn is_skipped(&self) -> bool {
        matches!(self, GuardError::Skipped(_))
    }
}

/// Result alias for guarded calls.
pub type Result<T> = std::result::Result<T, GuardError>;
