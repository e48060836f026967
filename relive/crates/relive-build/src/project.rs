//! One project's build cycle.
//!
//! ```text
//!   IDLE ──select──► FILES_SELECTED ──start──► COMPILING ──exit──► SUCCEEDED
//!    ▲                                             │                   │
//!    │                                             └────────────► FAILED
//!    └──────────────────────── settle ◄────────────────────────────────┘
//! ```
//!
//! - Only one compile is in flight at a time. Units selected while
//!   compiling are queued and start the next cycle.
//! - With `abandon_on_change`, a selection during a compile marks that
//!   compile abandoned: the process runs to completion but its output is
//!   discarded, and its units are queued again together with the new ones.
//! - A cycle succeeds when the compiler exits successfully, the artifact
//!   exists and the loader accepts it. Units of a failed cycle are retried
//!   with the next selection.

use std::collections::BTreeSet;
use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};
use std::fs;
use std::mem;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use relive_core::{LogSink, ModuleExports};

use crate::command::CompileCommand;
use crate::config::ProjectConfig;
use crate::dependency::DependencyIndex;
use crate::error::{BuildError, BuildResult};
use crate::loader::ModuleLoader;
use crate::process::{CompilerProcess, OutputLine, ProcessState};

/// Where a project is in its build cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Idle,
    FilesSelected,
    Compiling,
    Succeeded,
    Failed,
}

/// How a finished cycle ended.
#[derive(Debug)]
pub enum BuildOutcome {
    Loaded {
        artifact: PathBuf,
        exports: ModuleExports,
    },
    Failed {
        reason: String,
    },
    /// Output of an abandoned compile was discarded.
    Abandoned,
}

/// A finished build cycle.
#[derive(Debug)]
pub struct BuildEvent {
    pub project: String,
    pub outcome: BuildOutcome,
    pub units: BTreeSet<PathBuf>,
    pub output: Vec<OutputLine>,
    pub elapsed: Duration,
}

impl BuildEvent {
    pub fn is_loaded(&self) -> bool {
        matches!(self.outcome, BuildOutcome::Loaded { .. })
    }
}

#[derive(Debug)]
struct InFlight {
    process: CompilerProcess,
    units: BTreeSet<PathBuf>,
    artifact: PathBuf,
    started: Instant,
    abandoned: bool,
    output: Vec<OutputLine>,
}

/// Build state of one project.
#[derive(Debug)]
pub struct BuildProject {
    config: ProjectConfig,
    state: BuildState,
    selected: BTreeSet<PathBuf>,
    queued: BTreeSet<PathBuf>,
    retry: BTreeSet<PathBuf>,
    always_compile: BTreeSet<PathBuf>,
    in_flight: Option<InFlight>,
    next_artifact: u64,
    builds_started: u64,
    last_output: Vec<OutputLine>,
}

impl BuildProject {
    pub fn new(config: ProjectConfig) -> Self {
        let always_compile = config.always_compile.iter().cloned().collect();
        Self {
            config,
            state: BuildState::Idle,
            selected: BTreeSet::new(),
            queued: BTreeSet::new(),
            retry: BTreeSet::new(),
            always_compile,
            in_flight: None,
            next_artifact: 0,
            builds_started: 0,
            last_output: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    pub fn is_compiling(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn selected(&self) -> &BTreeSet<PathBuf> {
        &self.selected
    }

    /// Units waiting for the compile in flight to finish.
    pub fn queued(&self) -> &BTreeSet<PathBuf> {
        &self.queued
    }

    pub fn builds_started(&self) -> u64 {
        self.builds_started
    }

    /// Output of the last finished, non-abandoned cycle.
    pub fn last_output(&self) -> &[OutputLine] {
        &self.last_output
    }

    pub fn always_compile(&self) -> &BTreeSet<PathBuf> {
        &self.always_compile
    }

    pub fn add_always_compile<I>(&mut self, paths: I)
    where
        I: IntoIterator<Item = PathBuf>,
    {
        self.always_compile.extend(paths);
    }

    /// Select units for the next compile.
    pub fn select(&mut self, units: BTreeSet<PathBuf>, sink: &dyn LogSink) {
        if units.is_empty() {
            return;
        }

        let abandon = self.config.abandon_on_change;
        if let Some(in_flight) = self.in_flight.as_mut() {
            if abandon && !in_flight.abandoned {
                in_flight.abandoned = true;
                self.queued.extend(in_flight.units.iter().cloned());
                sink.info(format_args!(
                    "project `{}`: abandoning compile in flight, new changes arrived",
                    self.config.name
                ));
            }
            self.queued.extend(units);
            return;
        }

        self.selected.append(&mut self.retry);
        self.selected.extend(units);
        self.state = BuildState::FilesSelected;
    }

    /// Leave SUCCEEDED/FAILED for the next cycle.
    pub fn settle(&mut self) {
        if matches!(self.state, BuildState::Succeeded | BuildState::Failed) {
            self.state = if self.selected.is_empty() {
                BuildState::Idle
            } else {
                BuildState::FilesSelected
            };
        }
    }

    /// Launch the compiler for the selected units. Does not wait.
    pub fn start(&mut self, index: &DependencyIndex, sink: &dyn LogSink) -> BuildResult<()> {
        if self.in_flight.is_some() {
            return Err(BuildError::AlreadyCompiling(self.config.name.clone()));
        }

        let units = mem::take(&mut self.selected);
        let mut sources = index.compile_sources(&units);
        sources.extend(self.always_compile.iter().map(|path| index.resolve(path)));
        if sources.is_empty() {
            self.state = BuildState::Idle;
            return Err(BuildError::NothingToCompile(self.config.name.clone()));
        }
        let libraries = index.link_libraries(&units);

        let spawned = fs::create_dir_all(&self.config.intermediate_dir)
            .map_err(BuildError::from)
            .and_then(|()| {
                let artifact = self.next_artifact_path();
                let command = CompileCommand::assemble(&self.config, &artifact, &sources, &libraries);
                sink.info(format_args!(
                    "project `{}`: compiling {} file(s)",
                    self.config.name,
                    sources.len()
                ));
                log::debug!("{}", command);
                CompilerProcess::spawn(&command).map(|process| (process, artifact))
            });

        match spawned {
            Ok((process, artifact)) => {
                self.builds_started += 1;
                self.in_flight = Some(InFlight {
                    process,
                    units,
                    artifact,
                    started: Instant::now(),
                    abandoned: false,
                    output: Vec::new(),
                });
                self.state = BuildState::Compiling;
                Ok(())
            },
            Err(err) => {
                self.retry.extend(units);
                self.state = BuildState::Failed;
                Err(err)
            },
        }
    }

    /// Check the compile in flight without blocking.
    ///
    /// Output lines are forwarded to `sink` as they arrive. Returns the
    /// event once the compile has finished.
    pub fn poll(&mut self, loader: &mut dyn ModuleLoader, sink: &dyn LogSink) -> Option<BuildEvent> {
        let in_flight = self.in_flight.as_mut()?;
        forward_output(in_flight, sink);

        let status = match in_flight.process.poll() {
            Ok(ProcessState::Running) => return None,
            Ok(ProcessState::Exited(status)) => Ok(status),
            Err(err) => Err(err),
        };
        let mut in_flight = self.in_flight.take()?;
        forward_output(&mut in_flight, sink);
        let elapsed = in_flight.started.elapsed();

        if in_flight.abandoned {
            sink.info(format_args!(
                "project `{}`: discarded output of abandoned compile",
                self.config.name
            ));
            self.promote_queued();
            self.state = if self.selected.is_empty() {
                BuildState::Idle
            } else {
                BuildState::FilesSelected
            };
            return Some(BuildEvent {
                project: self.config.name.clone(),
                outcome: BuildOutcome::Abandoned,
                units: in_flight.units,
                output: in_flight.output,
                elapsed,
            });
        }

        let outcome = match status {
            Err(err) => Err(err.to_string()),
            Ok(status) if !status.success() => Err(format!("compiler exited with {}", status)),
            Ok(_) if !in_flight.artifact.exists() => Err(format!(
                "compiler produced no artifact at {}",
                in_flight.artifact.display()
            )),
            Ok(_) => loader
                .load(&in_flight.artifact)
                .map_err(|err| err.to_string()),
        };

        let outcome = match outcome {
            Ok(exports) => {
                sink.info(format_args!(
                    "project `{}`: built {} in {:.2}s",
                    self.config.name,
                    in_flight.artifact.display(),
                    elapsed.as_secs_f64()
                ));
                self.state = BuildState::Succeeded;
                BuildOutcome::Loaded {
                    artifact: in_flight.artifact,
                    exports,
                }
            },
            Err(reason) => {
                sink.error(format_args!(
                    "project `{}`: build failed: {}",
                    self.config.name, reason
                ));
                self.retry.extend(in_flight.units.iter().cloned());
                self.state = BuildState::Failed;
                BuildOutcome::Failed { reason }
            },
        };

        self.promote_queued();
        self.last_output = in_flight.output.clone();
        Some(BuildEvent {
            project: self.config.name.clone(),
            outcome,
            units: in_flight.units,
            output: in_flight.output,
            elapsed,
        })
    }

    /// One step of the cycle: settle, start if files are selected, poll.
    pub fn update(
        &mut self,
        index: &DependencyIndex,
        loader: &mut dyn ModuleLoader,
        sink: &dyn LogSink,
    ) -> Option<BuildEvent> {
        self.settle();
        if self.state == BuildState::FilesSelected && self.in_flight.is_none() {
            let units = self.selected.clone();
            match self.start(index, sink) {
                Ok(()) => {},
                Err(BuildError::NothingToCompile(_)) => {},
                Err(err) => {
                    sink.error(format_args!(
                        "project `{}`: cannot start compile: {}",
                        self.config.name, err
                    ));
                    return Some(BuildEvent {
                        project: self.config.name.clone(),
                        outcome: BuildOutcome::Failed {
                            reason: err.to_string(),
                        },
                        units,
                        output: Vec::new(),
                        elapsed: Duration::ZERO,
                    });
                },
            }
        }
        self.poll(loader, sink)
    }

    /// Block until the compile in flight finishes, polling every
    /// `interval`.
    pub fn wait(
        &mut self,
        loader: &mut dyn ModuleLoader,
        sink: &dyn LogSink,
        interval: Duration,
    ) -> Option<BuildEvent> {
        while self.in_flight.is_some() {
            if let Some(event) = self.poll(loader, sink) {
                return Some(event);
            }
            std::thread::sleep(interval);
        }
        None
    }

    /// Path of the `n`th artifact of this project.
    pub fn artifact_path(&self, n: u64) -> PathBuf {
        self.config.intermediate_dir.join(format!(
            "{}{}_{}{}",
            DLL_PREFIX, self.config.name, n, DLL_SUFFIX
        ))
    }

    /// Remove artifacts of earlier runs from the intermediate directory.
    pub fn clean_intermediates(&self) -> BuildResult<usize> {
        let dir = &self.config.intermediate_dir;
        if !dir.is_dir() {
            return Ok(0);
        }

        let mut removed = 0;
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if !self.is_own_artifact(&path) {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(err) => log::warn!("could not remove {}: {}", path.display(), err),
            }
        }
        Ok(removed)
    }

    fn is_own_artifact(&self, path: &Path) -> bool {
        let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
            return false;
        };
        let prefix = format!("{}{}_", DLL_PREFIX, self.config.name);
        file_name
            .strip_prefix(prefix.as_str())
            .and_then(|rest| rest.strip_suffix(DLL_SUFFIX))
            .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
    }

    fn next_artifact_path(&mut self) -> PathBuf {
        loop {
            let path = self.artifact_path(self.next_artifact);
            self.next_artifact += 1;
            if !path.exists() {
                return path;
            }
        }
    }

    fn promote_queued(&mut self) {
        if self.queued.is_empty() {
            return;
        }
        self.selected.append(&mut self.retry);
        self.selected.append(&mut self.queued);
    }
}

fn forward_output(in_flight: &mut InFlight, sink: &dyn LogSink) {
    for line in in_flight.process.drain_output() {
        if !in_flight.abandoned {
            sink.log(line.severity, format_args!("{}", line.text));
        }
        in_flight.output.push(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relive_core::MemorySink;

    #[test]
    fn test_artifact_names_are_unique_per_build() {
        let dir = tempfile::tempdir().unwrap();
        let mut project = BuildProject::new(ProjectConfig::new("game").with_intermediate_dir(dir.path()));

        let first = project.next_artifact_path();
        fs::write(project.artifact_path(1), b"").unwrap();
        let second = project.next_artifact_path();

        assert_eq!(first, dir.path().join(format!("{}game_0{}", DLL_PREFIX, DLL_SUFFIX)));
        assert_eq!(second, project.artifact_path(2));
    }

    #[test]
    fn test_clean_removes_only_own_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let project = BuildProject::new(ProjectConfig::new("game").with_intermediate_dir(dir.path()));
        fs::write(project.artifact_path(0), b"").unwrap();
        fs::write(project.artifact_path(7), b"").unwrap();
        fs::write(dir.path().join(format!("{}gameplay_0{}", DLL_PREFIX, DLL_SUFFIX)), b"").unwrap();
        fs::write(dir.path().join("notes.txt"), b"").unwrap();

        assert_eq!(project.clean_intermediates().unwrap(), 2);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_select_moves_to_files_selected() {
        let sink = MemorySink::new();
        let mut project = BuildProject::new(ProjectConfig::new("game"));
        project.select(BTreeSet::new(), &sink);
        assert_eq!(project.state(), BuildState::Idle);

        project.select([PathBuf::from("/p/a.c")].into_iter().collect(), &sink);
        assert_eq!(project.state(), BuildState::FilesSelected);
        assert_eq!(project.selected().len(), 1);
    }

    #[test]
    fn test_nothing_to_compile_returns_to_idle() {
        let sink = MemorySink::new();
        let index = DependencyIndex::new();
        let mut project = BuildProject::new(ProjectConfig::new("game"));
        let result = project.start(&index, &sink);
        assert!(matches!(result, Err(BuildError::NothingToCompile(_))));
        assert_eq!(project.state(), BuildState::Idle);
    }

    #[test]
    fn test_missing_compiler_fails_and_retries_units() {
        let dir = tempfile::tempdir().unwrap();
        let sink = MemorySink::new();
        let index = DependencyIndex::new();
        let config = ProjectConfig::new("game")
            .with_compiler(dir.path().join("no-such-compiler"))
            .with_intermediate_dir(dir.path());
        let mut project = BuildProject::new(config);
        let mut loader = crate::loader::MockModuleLoader::new();

        project.select([PathBuf::from("/p/a.c")].into_iter().collect(), &sink);
        let event = project.update(&index, &mut loader, &sink).unwrap();

        assert!(matches!(event.outcome, BuildOutcome::Failed { .. }));
        assert_eq!(project.state(), BuildState::Failed);
        assert!(sink.contains(relive_core::Severity::Error, "cannot start compile"));

        project.select([PathBuf::from("/p/b.c")].into_iter().collect(), &sink);
        assert_eq!(project.selected().len(), 2);
    }
}
