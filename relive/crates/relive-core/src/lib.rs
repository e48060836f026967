//! relive-core - Object Swap Engine
//!
//! ============================================================================
//! MODULE OVERVIEW
//! ============================================================================
//!
//! The in-process half of live code reload: the registry of reloadable types
//! and their live instances, the transaction that replaces a type's
//! implementation while keeping its instances' identity and state, and the
//! history that lets a developer step back and forth between
//! implementations.
//!
//! ```text
//!   ModuleExports ──► SwapCoordinator ──► Registry ◄── resolve(ObjectId)
//!     (factories)          │                 │
//!                          ▼                 ▼
//!                  GenerationHistory    Constructor ─► slots of Box<dyn Object>
//! ```
//!
//! COMPONENTS:
//! -----------
//! - [`Registry`]: type name / [`ConstructorId`] to [`Constructor`], and
//!   [`ObjectId`] resolution.
//! - [`PropertyBag`]: named values moved across a swap.
//! - [`SwapCoordinator`]: the phased, guarded swap transaction with rollback.
//! - [`GenerationHistory`]: bounded undo/redo over swap generations.
//! - [`LogSink`]: the severity-only logging boundary.
//!
//! IDENTITY:
//! ---------
//! Instances never refer to each other by reference. They keep
//! [`ObjectId`]s and resolve them through the registry at the point of use;
//! a swap keeps every surviving id pointing at the replacement instance.
//!
//! ```rust
//! use relive_core::{Object, PropertyPass, Registry, SimpleFactory, SwapCoordinator};
//!
//! #[derive(Default)]
//! struct Counter {
//!     count: i64,
//! }
//!
//! impl Object for Counter {
//!     fn serialize(&mut self, pass: &mut PropertyPass<'_>) {
//!         pass.property("count", &mut self.count);
//!     }
//! }
//!
//! let v1 = SimpleFactory::new("Counter", "src/counter.rs", |_| Box::new(Counter::default()));
//! let mut registry = Registry::new();
//! let ctor = registry.register(v1.shared()).unwrap();
//! let id = registry.construct(ctor).unwrap();
//! registry.resolve_as_mut::<Counter>(id).unwrap().count = 3;
//!
//! let v2 = SimpleFactory::new("Counter", "src/counter.rs", |_| Box::new(Counter::default()));
//! let mut coordinator = SwapCoordinator::with_defaults();
//! coordinator.swap(&mut registry, vec![v2.shared()]).unwrap();
//! assert_eq!(registry.resolve_as::<Counter>(id).unwrap().count, 3);
//! ```

pub mod config;
pub mod constructor;
pub mod error;
pub mod history;
pub mod ids;
pub mod index;
pub mod logging;
pub mod module;
pub mod object;
pub mod property;
pub mod registry;
pub mod swap;

pub use config::{HistoryConfig, SwapConfig, DEFAULT_HISTORY_SIZE};
pub use constructor::Constructor;
pub use error::{ConfigError, HistoryError, RegistryError, SwapError};
pub use history::GenerationHistory;
pub use ids::{ConstructorId, ObjectId, PerTypeId};
pub use logging::{FacadeSink, LogEntry, LogSink, MemorySink, Severity};
pub use module::{ModuleEntryFn, ModuleExports, MODULE_ENTRY_SYMBOL};
pub use object::{IncludeDecl, Object, ObjectFactory, SimpleFactory, SingletonMode};
pub use property::{PassMode, PropertyBag, PropertyError, PropertyPass};
pub use registry::Registry;
pub use swap::{
    Addition, DeleteLeak, Generation, Replacement, SwapCoordinator, SwapPhase, SwapReport,
    VerifyMismatch,
};

pub use relive_guard::{FaultInfo, FaultKind};
