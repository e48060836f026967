//! Sticky per-call-site fault state.
//!
//! Code that faulted once has probably left shared state half-updated, so
//! running it again right away tends to fault the same way. A [`FaultLatch`]
//! guards one call site: after a fault it refuses to run the work again until
//! the host reports that a newer module has been loaded.

use crate::error::{GuardError, Result};
use crate::fault::FaultInfo;
use crate::frame;

/// Remembers whether a guarded call site has faulted.
#[derive(Debug, Default, Clone)]
pub struct FaultLatch {
    last_fault: Option<FaultInfo>,
    /// Module generation at which the latch closed.
    latched_at: Option<u64>,
    faults_recorded: u64,
}

impl FaultLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `work` under the fault guard unless the latch is closed.
    ///
    /// `module_generation` is the host's count of successful module loads.
    /// A latch closed at an older generation reopens before running.
    ///
    /// # Returns
    /// - `Ok(value)` when the work completed
    /// - `Err(GuardError::Faulted)` when it faulted now; the latch closes
    /// - `Err(GuardError::Skipped)` when the latch was already closed at this
    ///   generation; the work did not run
    pub fn run<R, F>(&mut self, module_generation: u64, work: F) -> Result<R>
    where
        F: FnOnce() -> R,
    {
        if let Some(latched_at) = self.latched_at {
            if module_generation > latched_at {
                log::debug!(
                    "fault latch reopened by module generation {} (closed at {})",
                    module_generation,
                    latched_at
                );
                self.latched_at = None;
            } else {
                let fault = self.last_fault.clone().unwrap_or_else(FaultInfo::unknown);
                return Err(GuardError::Skipped(fault));
            }
        }

        match frame::run(work) {
            Ok(value) => Ok(value),
            Err(GuardError::Faulted(fault)) => {
                self.faults_recorded += 1;
                self.latched_at = Some(module_generation);
                self.last_fault = Some(fault.clone());
                Err(GuardError::Faulted(fault))
            },
            Err(other) => Err(other),
        }
    }

    pub fn is_latched(&self) -> bool {
        self.latched_at.is_some()
    }

    /// Module generation at which the latch closed, if closed.
    pub fn latched_at(&self) -> Option<u64> {
        self.latched_at
    }

    /// Most recent fault, kept after the latch reopens.
    pub fn last_fault(&self) -> Option<&FaultInfo> {
        self.last_fault.as_ref()
    }

    /// Faults observed over the latch's lifetime.
    pub fn faults_recorded(&self) -> u64 {
        self.faults_recorded
    }

    /// Reopen the latch without waiting for a module load.
    pub fn reset(&mut self) {
        self.latched_at = None;
    }
}
