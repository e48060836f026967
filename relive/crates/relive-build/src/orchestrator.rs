//! Build Orchestrator
//!
//! Ties the pieces of a rebuild together, driven by one non-blocking
//! [`update`](BuildOrchestrator::update) per host loop iteration:
//!
//! 1. drain the change queue fed by the file watcher
//! 2. map changed files to translation units through the dependency index
//! 3. hand each project its units; projects compile asynchronously
//! 4. report finished cycles as [`BuildEvent`]s; a loaded event carries the
//!    module's exports for the swap coordinator
//!
//! Watching is idempotent: each path is handed to the watcher once, however
//! often it is registered.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use relive_core::{LogSink, ModuleExports, ObjectFactory};

use crate::config::{validate_projects, ProjectConfig};
use crate::dependency::DependencyIndex;
use crate::error::{BuildError, BuildResult};
use crate::loader::ModuleLoader;
use crate::project::{BuildEvent, BuildProject};
use crate::watch::{ChangeQueue, ChangeSender, FileWatcher};

/// Change-driven rebuilds for a set of projects.
pub struct BuildOrchestrator {
    index: DependencyIndex,
    projects: Vec<BuildProject>,
    changes: ChangeQueue,
    watcher: Box<dyn FileWatcher>,
    watched: BTreeSet<PathBuf>,
    loader: Box<dyn ModuleLoader>,
    sink: Arc<dyn LogSink>,
}

impl BuildOrchestrator {
    pub fn new(
        projects: Vec<ProjectConfig>,
        watcher: Box<dyn FileWatcher>,
        loader: Box<dyn ModuleLoader>,
        sink: Arc<dyn LogSink>,
    ) -> BuildResult<Self> {
        validate_projects(&projects)?;
        Ok(Self {
            index: DependencyIndex::new(),
            projects: projects.into_iter().map(BuildProject::new).collect(),
            changes: ChangeQueue::new(),
            watcher,
            watched: BTreeSet::new(),
            loader,
            sink,
        })
    }

    /// Replace the (still empty) dependency index, e.g. with one that
    /// resolves relative paths against the project root.
    pub fn with_index(mut self, index: DependencyIndex) -> Self {
        self.index = index;
        self
    }

    pub fn index(&self) -> &DependencyIndex {
        &self.index
    }

    pub fn projects(&self) -> &[BuildProject] {
        &self.projects
    }

    pub fn project(&self, name: &str) -> Option<&BuildProject> {
        self.projects.iter().find(|project| project.name() == name)
    }

    fn project_mut(&mut self, name: &str) -> BuildResult<&mut BuildProject> {
        self.projects
            .iter_mut()
            .find(|project| project.name() == name)
            .ok_or_else(|| BuildError::UnknownProject(name.to_string()))
    }

    /// Sender for watchers or tools that report changes themselves.
    pub fn change_sender(&self) -> ChangeSender {
        self.changes.sender()
    }

    pub fn notify(&self, paths: Vec<PathBuf>) {
        if !self.changes.sender().send(paths) {
            log::debug!("change queue closed; dropping notification");
        }
    }

    pub fn is_compiling(&self) -> bool {
        self.projects.iter().any(BuildProject::is_compiling)
    }

    /// Index the declarations of `factories` under `project` and watch
    /// their files.
    pub fn register_factories(
        &mut self,
        project: &str,
        factories: &[Arc<dyn ObjectFactory>],
    ) -> BuildResult<()> {
        self.project_mut(project)?;
        for factory in factories {
            self.index.register_factory(project, factory.as_ref());
        }
        self.watch_all()
    }

    /// Index a loaded module's exports under `project`.
    pub fn register_exports(&mut self, project: &str, exports: &ModuleExports) -> BuildResult<()> {
        let always: Vec<PathBuf> = exports
            .always_compile
            .iter()
            .map(|path| self.index.resolve(path))
            .collect();
        self.project_mut(project)?.add_always_compile(always);
        self.register_factories(project, &exports.constructors)
    }

    fn watch_all(&mut self) -> BuildResult<()> {
        let mut paths = self.index.watched_paths();
        for project in &self.projects {
            paths.extend(project.always_compile().iter().map(|path| self.index.resolve(path)));
        }

        for path in paths {
            if self.watched.contains(&path) {
                continue;
            }
            self.watcher.watch(&path, self.changes.sender())?;
            self.watched.insert(path);
        }
        Ok(())
    }

    pub fn watched(&self) -> &BTreeSet<PathBuf> {
        &self.watched
    }

    /// Drain changes, select units, advance every project. Never blocks.
    pub fn update(&mut self) -> Vec<BuildEvent> {
        self.watcher.poll();

        let changed = self.changes.drain();
        if !changed.is_empty() {
            self.dispatch(&changed);
        }

        let Self {
            index,
            projects,
            loader,
            sink,
            ..
        } = self;
        projects
            .iter_mut()
            .filter_map(|project| project.update(&*index, &mut **loader, &**sink))
            .collect()
    }

    fn dispatch(&mut self, changed: &[PathBuf]) {
        let rebuild = self.index.rebuild_set(changed);
        let mut grouped = self.index.by_project(&rebuild);

        for project in &self.projects {
            let touched: BTreeSet<PathBuf> = project
                .always_compile()
                .iter()
                .map(|path| self.index.resolve(path))
                .filter(|path| changed.contains(path))
                .collect();
            if !touched.is_empty() {
                grouped
                    .entry(project.name().to_string())
                    .or_default()
                    .extend(touched);
            }
        }

        if grouped.is_empty() {
            log::debug!("{} changed file(s) affect no translation unit", changed.len());
            return;
        }

        let sink = self.sink.as_ref();
        for (name, units) in grouped {
            match self.projects.iter_mut().find(|project| project.name() == name) {
                Some(project) => project.select(units, sink),
                None => sink.warning(format_args!(
                    "{} unit(s) belong to unconfigured project `{}`",
                    units.len(),
                    name
                )),
            }
        }
    }

    /// Start a compile of `units` for `project` right away.
    pub fn build_now(&mut self, project: &str, units: BTreeSet<PathBuf>) -> BuildResult<()> {
        let sink = Arc::clone(&self.sink);
        let Self {
            index, projects, ..
        } = self;
        let project = projects
            .iter_mut()
            .find(|candidate| candidate.name() == project)
            .ok_or_else(|| BuildError::UnknownProject(project.to_string()))?;
        project.select(units, sink.as_ref());
        project.start(index, sink.as_ref())
    }

    /// Block until `project`'s compile in flight finishes.
    pub fn wait(&mut self, project: &str, interval: Duration) -> BuildResult<Option<BuildEvent>> {
        let sink = Arc::clone(&self.sink);
        let Self {
            projects, loader, ..
        } = self;
        let project = projects
            .iter_mut()
            .find(|candidate| candidate.name() == project)
            .ok_or_else(|| BuildError::UnknownProject(project.to_string()))?;
        Ok(project.wait(&mut **loader, sink.as_ref(), interval))
    }

    /// Remove stale artifacts of every project.
    pub fn clean_intermediates(&self) -> BuildResult<usize> {
        let mut removed = 0;
        for project in &self.projects {
            removed += project.clean_intermediates()?;
        }
        Ok(removed)
    }
}

impl std::fmt::Debug for BuildOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildOrchestrator")
            .field("projects", &self.projects.len())
            .field("units", &self.index.unit_count())
            .field("watched", &self.watched.len())
            .finish()
    }
}
