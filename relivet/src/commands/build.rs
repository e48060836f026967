//! Build command implementation.
//!
//! Runs one orchestrated compile of the given sources for a configured
//! project, loads the artifact and reports what it exports.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use relive_build::{
    BuildOrchestrator, BuildOutcome, DependencyIndex, DylibLoader, NullWatcher,
};
use relive_core::{FacadeSink, Severity};
use relive_runtime::RuntimeConfig;

use crate::commands::common::select_project;
use crate::commands::traits::{execute, Command};
use crate::error::{RelivetError, Result};

/// Arguments for the build command.
#[derive(Debug, Clone)]
pub struct BuildArgs {
    pub config: RuntimeConfig,
    /// Project to build (default: the only configured project).
    pub project: Option<String>,
    /// Translation units to compile.
    pub sources: Vec<PathBuf>,
    /// Remove earlier artifacts before building.
    pub clean: bool,
    /// How often the compiler is polled.
    pub poll_interval: Duration,
}

/// Result of a successful build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSummary {
    pub project: String,
    pub artifact: PathBuf,
    pub constructors: Vec<String>,
    pub warnings: usize,
    pub cleaned: usize,
}

impl fmt::Display for BuildSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.cleaned > 0 {
            writeln!(f, "removed {} old artifact(s)", self.cleaned)?;
        }
        writeln!(f, "built `{}` -> {}", self.project, self.artifact.display())?;
        if self.warnings > 0 {
            writeln!(f, "{} warning(s)", self.warnings)?;
        }
        write!(f, "{} constructor(s)", self.constructors.len())?;
        for name in &self.constructors {
            write!(f, "\n  {}", name)?;
        }
        Ok(())
    }
}

/// Build command handler.
pub struct Build {
    args: BuildArgs,
}

impl Command for Build {
    type Args = BuildArgs;
    type Output = BuildSummary;

    fn new(args: Self::Args) -> Self {
        Self { args }
    }

    fn execute(&self) -> Result<Self::Output> {
        let config = &self.args.config;
        let project = select_project(config, self.args.project.as_deref())?.clone();
        let name = project.name.clone();

        let mut orchestrator = BuildOrchestrator::new(
            vec![project],
            Box::new(NullWatcher),
            Box::new(DylibLoader::new()),
            Arc::new(FacadeSink),
        )?
        .with_index(DependencyIndex::with_base(config.resolved_base_dir()));

        let cleaned = if self.args.clean {
            orchestrator.clean_intermediates()?
        } else {
            0
        };

        let units: BTreeSet<PathBuf> = self
            .args
            .sources
            .iter()
            .map(|source| orchestrator.index().resolve(source))
            .collect();
        if units.is_empty() {
            return Err(RelivetError::Validation("no sources given".to_string()));
        }
        if let Some(missing) = units.iter().find(|unit| !unit.exists()) {
            return Err(RelivetError::Validation(format!(
                "source not found: {}",
                missing.display()
            )));
        }

        tracing::info!("compiling {} unit(s) for `{}`", units.len(), name);
        orchestrator.build_now(&name, units)?;
        let event = orchestrator
            .wait(&name, self.args.poll_interval)?
            .ok_or_else(|| RelivetError::CommandExecution("no compile was started".to_string()))?;

        let warnings = event
            .output
            .iter()
            .filter(|line| line.severity == Severity::Warning)
            .count();
        match event.outcome {
            BuildOutcome::Loaded { artifact, exports } => Ok(BuildSummary {
                project: name,
                artifact,
                constructors: exports.type_names().into_iter().map(str::to_string).collect(),
                warnings,
                cleaned,
            }),
            BuildOutcome::Failed { reason } => {
                let mut message = format!("build of `{}` failed: {}", name, reason);
                for line in event.output.iter().filter(|line| line.severity == Severity::Error) {
                    message.push('\n');
                    message.push_str(&line.text);
                }
                Err(RelivetError::CommandExecution(message))
            },
            BuildOutcome::Abandoned => Err(RelivetError::CommandExecution(format!(
                "build of `{}` was abandoned",
                name
            ))),
        }
    }

    fn name() -> &'static str {
        "build"
    }
}

pub fn run_build(args: BuildArgs) -> Result<BuildSummary> {
    execute::<Build>(args)
}
