//! relive-build - Change-Driven Module Rebuilds
//!
//! ============================================================================
//! MODULE OVERVIEW
//! ============================================================================
//!
//! Watches the source files of reloadable types, works out which translation
//! units an edit affects, compiles them into a fresh dynamically loadable
//! module with an external compiler and loads the result.
//!
//! ```text
//!   FileWatcher ──► ChangeQueue ──► DependencyIndex ──► BuildProject
//!                                                           │ CompileCommand
//!                                                           ▼
//!   BuildEvent ◄── ModuleLoader ◄── artifact ◄── CompilerProcess (async)
//! ```
//!
//! The orchestrator never blocks its caller: compiles run in a separate OS
//! process whose output is read on background threads, and completion is
//! observed by polling from [`BuildOrchestrator::update`].

pub mod command;
pub mod config;
pub mod dependency;
pub mod error;
pub mod loader;
#[cfg(feature = "watch")]
pub mod notify_watch;
pub mod orchestrator;
pub mod process;
pub mod project;
pub mod watch;

pub use command::CompileCommand;
pub use config::{validate_projects, FlagSet, FlagStyle, Optimization, ProjectConfig};
pub use dependency::{DependencyIndex, UnitInfo};
pub use error::{BuildError, BuildResult};
pub use loader::{DylibLoader, ModuleLoader};
#[cfg(feature = "watch")]
pub use notify_watch::NotifyWatcher;
pub use orchestrator::BuildOrchestrator;
pub use process::{classify, CompilerProcess, OutputLine, ProcessState, Stream};
pub use project::{BuildEvent, BuildOutcome, BuildProject, BuildState};
pub use watch::{ChangeQueue, ChangeSender, FileWatcher, NullWatcher, PollingWatcher};
