//! Platform trap handlers.
//!
//! The handler is process-wide, so installation is reference counted: the
//! first active guard on any thread installs it and the last one to return
//! restores the handlers that were in place before.
//!
//! Platform Support:
//! - Unix: `sigaction` for SIGSEGV, SIGBUS, SIGILL, SIGFPE
//! - Windows: a first-chance vectored exception handler

use parking_lot::Mutex;

use crate::error::Result;

#[cfg(unix)]
mod unix;
#[cfg(unix)]
use unix as sys;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
use windows as sys;

/// Number of live registrations across all threads.
static ACTIVE: Mutex<usize> = parking_lot::const_mutex(0);

/// Keeps the trap handler installed while alive.
pub(crate) struct HandlerRegistration {
    _private: (),
}

impl HandlerRegistration {
    pub(crate) fn acquire() -> Result<Self> {
        let mut active = ACTIVE.lock();
        if *active == 0 {
            // SAFETY: serialized by ACTIVE; no guard is active, so no handler
            // can be reading the saved previous handlers.
            unsafe { sys::install()? };
            log::debug!("fault handlers installed");
        }
        *active += 1;
        Ok(Self { _private: () })
    }
}

impl Drop for HandlerRegistration {
    fn drop(&mut self) {
        let mut active = ACTIVE.lock();
        *active -= 1;
        if *active == 0 {
            // SAFETY: serialized by ACTIVE and paired with a successful install.
            unsafe { sys::restore() };
            log::debug!("fault handlers restored");
        }
    }
}
