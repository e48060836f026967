//! # relive-guard - Fault Isolation for Hot-Reloaded Code
//!
//! Runs a unit of work so that a hardware trap raised inside it (invalid
//! memory access, illegal instruction) comes back to the caller as an
//! ordinary `Err` instead of terminating the process.
//!
//! ## Overview
//!
//! ```text
//!  caller ──► run(work) ──► C trampoline (sigsetjmp) ──► work()
//!                 ▲                                        │
//!                 │              trap (SIGSEGV/SIGILL/..)  │
//!                 └──── siglongjmp ◄── trap handler ◄──────┘
//! ```
//!
//! - A process-wide trap handler is installed while at least one guarded
//!   call is active on any thread, and the previous handlers are restored
//!   when the last one returns.
//! - Each thread keeps a chain of guard frames. A trap is delivered to the
//!   innermost frame of the faulting thread; traps on threads without an
//!   active guard are forwarded to whatever handler was installed before.
//! - Panics inside the work are caught as well and reported as
//!   [`FaultKind::Panic`].
//! - [`FaultLatch`] remembers a faulted call site and skips it until the
//!   next module load.
//!
//! ## Example
//!
//! ```rust
//! use relive_guard::{run, GuardError};
//!
//! let value = run(|| 40 + 2).unwrap();
//! assert_eq!(value, 42);
//!
//! let result: Result<(), GuardError> = run(|| panic!("bad reload"));
//! assert!(result.is_err());
//! ```
//!
//! ## Caveat
//!
//! A trapped call is abandoned, not unwound: destructors of values owned by
//! the abandoned frames do not run. This is a recovery mechanism for
//! developer mistakes in freshly compiled code, not a security boundary.

pub mod error;
pub mod fault;
mod frame;
pub mod latch;
mod platform;

pub use error::{GuardError, Result};
pub use fault::{Access, FaultInfo, FaultKind};
pub use frame::{depth, is_guarding, run};
pub use latch::FaultLatch;
