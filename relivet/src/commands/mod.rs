//! Command modules for the relivet CLI.
//!
//! Each subcommand lives in its own file and implements
//! [`traits::Command`].

pub mod common;
pub mod traits;

pub mod build;
pub mod init;
pub mod inspect;

pub use build::{run_build, BuildArgs};
pub use init::{run_init, InitArgs};
pub use inspect::{run_inspect, InspectArgs};
