//! Relivet CLI - tooling for live-reload projects.
//!
//! Parses arguments with clap, sets up logging and dispatches to the
//! command handlers in [`commands`].

mod commands;
mod error;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{
    common::load_config, run_build, run_init, run_inspect, BuildArgs, InitArgs, InspectArgs,
};
use error::{RelivetError, Result};

/// Relivet - tooling for live-reload projects
///
/// Writes starter configuration, runs one-off module builds the way the
/// runtime does, and inspects what built modules export.
#[derive(Parser, Debug)]
#[command(name = "relivet")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Tooling for relive live-reload projects", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true, env = "RELIVET_VERBOSE")]
    verbose: bool,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "RELIVET_CONFIG")]
    config: Option<PathBuf>,

    /// Disable color output
    #[arg(long, global = true, env = "RELIVET_NO_COLOR")]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands for the relivet CLI.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a starter relive.toml
    Init(InitCommand),

    /// Compile sources of a project into a module and load it
    ///
    /// The module is built with the project's compiler and flags exactly as
    /// a running host would rebuild it.
    Build(BuildCommand),

    /// List the constructors a built module exports
    Inspect(InspectCommand),
}

/// Arguments for the init subcommand.
#[derive(Parser, Debug)]
struct InitCommand {
    /// Project name (default: the directory name)
    #[arg(short, long)]
    name: Option<String>,

    /// Directory to initialize (default: current directory)
    #[arg(short, long)]
    path: Option<PathBuf>,

    /// Compiler program for the project
    #[arg(long)]
    compiler: Option<PathBuf>,

    /// Overwrite an existing relive.toml
    #[arg(short, long)]
    force: bool,
}

/// Arguments for the build subcommand.
#[derive(Parser, Debug)]
struct BuildCommand {
    /// Translation units to compile
    #[arg(required = true)]
    sources: Vec<PathBuf>,

    /// Project to build (default: the only configured project)
    #[arg(short, long)]
    project: Option<String>,

    /// Remove artifacts of earlier builds first
    #[arg(long)]
    clean: bool,

    /// Compiler poll interval in milliseconds
    #[arg(long, default_value_t = 20)]
    poll_ms: u64,
}

/// Arguments for the inspect subcommand.
#[derive(Parser, Debug)]
struct InspectCommand {
    /// Built module to load
    module: PathBuf,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.no_color)?;

    execute_command(cli.command, cli.config)
}

/// Initialize the logging system.
///
/// Records from the `log` facade used by the relive crates are bridged into
/// the same subscriber.
fn init_logging(verbose: bool, no_color: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    let subscriber = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(!no_color)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(subscriber)
        .try_init()
        .map_err(|e| RelivetError::Config(format!("Failed to initialize logging: {}", e)))?;

    Ok(())
}

fn execute_command(command: Commands, config: Option<PathBuf>) -> Result<()> {
    match command {
        Commands::Init(args) => execute_init(args),
        Commands::Build(args) => execute_build(args, config),
        Commands::Inspect(args) => execute_inspect(args),
    }
}

fn execute_init(args: InitCommand) -> Result<()> {
    let path = run_init(InitArgs {
        path: args.path,
        name: args.name,
        compiler: args.compiler,
        force: args.force,
    })?;
    println!("Created {}", path.display());
    Ok(())
}

fn execute_build(args: BuildCommand, config: Option<PathBuf>) -> Result<()> {
    let summary = run_build(BuildArgs {
        config: load_config(config.as_deref())?,
        project: args.project,
        sources: args.sources,
        clean: args.clean,
        poll_interval: Duration::from_millis(args.poll_ms),
    })?;
    println!("{}", summary);
    Ok(())
}

fn execute_inspect(args: InspectCommand) -> Result<()> {
    let report = run_inspect(InspectArgs {
        module: args.module,
    })?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report);
    }
    Ok(())
}
