//! relive-runtime - Host Reload Context
//!
//! ============================================================================
//! MODULE OVERVIEW
//! ============================================================================
//!
//! Glues the object swap engine to the build orchestrator for a host
//! process:
//!
//! ```text
//!   host loop ──► Runtime::update ──► BuildOrchestrator::update
//!                      │                     │ BuildEvent::Loaded
//!                      ▼                     ▼
//!               GenerationHistory ◄── SwapCoordinator ──► Registry
//! ```
//!
//! The runtime also counts module generations. Host call sites guarded
//! with a [`FaultLatch`](relive_guard::FaultLatch) through
//! [`Runtime::guarded`] stay skipped after a fault until the count moves.
//!
//! ```rust,no_run
//! use relive_guard::FaultLatch;
//! use relive_runtime::{Runtime, RuntimeConfig};
//!
//! let config = RuntimeConfig::load()?;
//! let mut runtime = Runtime::from_config(&config)?;
//! let mut frame = FaultLatch::new();
//! loop {
//!     for event in runtime.update() {
//!         println!("{}: reloaded={}", event.project(), event.is_reloaded());
//!     }
//!     let _ = runtime.guarded(&mut frame, || { /* per-frame work */ });
//! #   break;
//! }
//! # Ok::<(), relive_runtime::RuntimeError>(())
//! ```

pub mod config;
pub mod error;
pub mod runtime;

pub use config::{
    RuntimeConfig, WatchBackend, CONFIG_FILE_NAME, ENV_HISTORY_SIZE, ENV_SELF_VERIFY,
};
pub use error::{RuntimeError, RuntimeResult};
pub use runtime::{LoadedModule, Runtime, RuntimeEvent};
