//! The host-side reload context.
//!
//! A [`Runtime`] owns everything live reload needs and is passed explicitly
//! to the host loop; there are no process-wide singletons. Each loop
//! iteration calls [`Runtime::update`], which advances the build
//! orchestrator and swaps in every module that finished building.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use relive_build::{
    BuildEvent, BuildOrchestrator, BuildOutcome, DependencyIndex, DylibLoader, FileWatcher,
    PollingWatcher,
};
use relive_core::{
    ConstructorId, FacadeSink, GenerationHistory, HistoryConfig, LogSink, ModuleExports, Object,
    ObjectId, Registry, SwapConfig, SwapCoordinator, SwapReport,
};
use relive_guard::FaultLatch;

use crate::config::{RuntimeConfig, WatchBackend};
use crate::error::{RuntimeError, RuntimeResult};

/// Record of one module swapped in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedModule {
    /// Build project the module belongs to; `None` for modules the host
    /// installed itself.
    pub project: Option<String>,
    pub artifact: Option<PathBuf>,
    pub type_names: Vec<String>,
    /// Module generation after the load.
    pub generation: u64,
}

/// What an [`update`](Runtime::update) did.
#[derive(Debug)]
pub enum RuntimeEvent {
    /// A rebuilt module was swapped in.
    Reloaded {
        project: String,
        artifact: PathBuf,
        report: SwapReport,
    },
    /// The compile failed; nothing was loaded.
    BuildFailed { project: String, reason: String },
    /// The module built and loaded but its swap rolled back.
    ReloadFailed {
        project: String,
        artifact: PathBuf,
        error: RuntimeError,
    },
    /// An in-flight build was discarded in favour of newer changes.
    Abandoned { project: String },
}

impl RuntimeEvent {
    pub fn project(&self) -> &str {
        match self {
            RuntimeEvent::Reloaded { project, .. }
            | RuntimeEvent::BuildFailed { project, .. }
            | RuntimeEvent::ReloadFailed { project, .. }
            | RuntimeEvent::Abandoned { project } => project,
        }
    }

    pub fn is_reloaded(&self) -> bool {
        matches!(self, RuntimeEvent::Reloaded { .. })
    }
}

fn file_watcher(config: &RuntimeConfig) -> Box<dyn FileWatcher> {
    let polling = || -> Box<dyn FileWatcher> {
        Box::new(PollingWatcher::new(Duration::from_millis(config.poll_interval_ms)))
    };
    match config.watcher {
        WatchBackend::Poll => polling(),
        #[cfg(feature = "watch")]
        WatchBackend::Notify => match relive_build::NotifyWatcher::new() {
            Ok(watcher) => Box::new(watcher),
            Err(err) => {
                log::warn!("{}; falling back to polling", err);
                polling()
            },
        },
        #[cfg(not(feature = "watch"))]
        WatchBackend::Notify => {
            log::warn!("built without file notifications; falling back to polling");
            polling()
        },
    }
}

/// Registry, swap coordinator, history and build orchestrator of one host.
pub struct Runtime {
    registry: Registry,
    coordinator: SwapCoordinator,
    history: GenerationHistory,
    orchestrator: Option<BuildOrchestrator>,
    modules: Vec<LoadedModule>,
    /// Successful module loads, undos and redos. Fault latches reopen when
    /// this moves past the value they closed at.
    module_generation: u64,
    sink: Arc<dyn LogSink>,
}

impl Runtime {
    /// A runtime without a build orchestrator; modules are handed in by the
    /// host through [`load_exports`](Self::load_exports).
    pub fn new(
        history: &HistoryConfig,
        swap: SwapConfig,
        sink: Arc<dyn LogSink>,
    ) -> RuntimeResult<Self> {
        history.validate()?;
        Ok(Self {
            registry: Registry::new(),
            coordinator: SwapCoordinator::new(swap, Arc::clone(&sink)),
            history: GenerationHistory::from_config(history),
            orchestrator: None,
            modules: Vec::new(),
            module_generation: 0,
            sink,
        })
    }

    /// A runtime that watches and rebuilds the configured projects, loading
    /// artifacts as dynamic libraries.
    pub fn from_config(config: &RuntimeConfig) -> RuntimeResult<Self> {
        config.validate()?;
        let sink: Arc<dyn LogSink> = Arc::new(FacadeSink);
        let runtime = Self::new(&config.history, config.swap.clone(), Arc::clone(&sink))?;
        if config.projects.is_empty() {
            return Ok(runtime);
        }

        let orchestrator = BuildOrchestrator::new(
            config.projects.clone(),
            file_watcher(config),
            Box::new(DylibLoader::new()),
            sink,
        )?
        .with_index(DependencyIndex::with_base(config.resolved_base_dir()));
        Ok(runtime.with_orchestrator(orchestrator))
    }

    pub fn with_orchestrator(mut self, orchestrator: BuildOrchestrator) -> Self {
        self.orchestrator = Some(orchestrator);
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn coordinator(&self) -> &SwapCoordinator {
        &self.coordinator
    }

    pub fn history(&self) -> &GenerationHistory {
        &self.history
    }

    pub fn orchestrator(&self) -> Option<&BuildOrchestrator> {
        self.orchestrator.as_ref()
    }

    pub fn orchestrator_mut(&mut self) -> Option<&mut BuildOrchestrator> {
        self.orchestrator.as_mut()
    }

    pub fn modules(&self) -> &[LoadedModule] {
        &self.modules
    }

    pub fn module_generation(&self) -> u64 {
        self.module_generation
    }

    pub fn set_self_verify(&mut self, enabled: bool) {
        self.coordinator.set_self_verify(enabled);
    }

    /// Swap in a module's constructors.
    ///
    /// With a `project`, the module's declarations are indexed so edits to
    /// its sources trigger rebuilds. When history is in the past it is
    /// first redone to the present; the new generation is then recorded.
    pub fn load_exports(
        &mut self,
        project: Option<&str>,
        exports: ModuleExports,
    ) -> RuntimeResult<SwapReport> {
        self.install(project, None, exports)
    }

    fn install(
        &mut self,
        project: Option<&str>,
        artifact: Option<PathBuf>,
        exports: ModuleExports,
    ) -> RuntimeResult<SwapReport> {
        // Indexed first: a fix to a module whose swap rolled back must
        // still trigger a rebuild.
        if let Some(project) = project {
            self.orchestrator
                .as_mut()
                .ok_or(RuntimeError::NoOrchestrator)?
                .register_exports(project, &exports)?;
        }

        let Self {
            registry,
            coordinator,
            history,
            sink,
            ..
        } = self;
        if history.can_redo() {
            let steps = history.redo_all(|factories| coordinator.swap(registry, factories))?;
            sink.info(format_args!("redid {} generation(s) before loading", steps));
        }

        let type_names: Vec<String> = exports.type_names().into_iter().map(str::to_string).collect();
        let report = coordinator.swap(registry, exports.constructors)?;
        history.record(report.generation.clone())?;

        self.module_generation += 1;
        self.modules.push(LoadedModule {
            project: project.map(str::to_string),
            artifact,
            type_names,
            generation: self.module_generation,
        });
        Ok(report)
    }

    /// Advance builds and swap in finished modules. Never blocks.
    pub fn update(&mut self) -> Vec<RuntimeEvent> {
        let events = match self.orchestrator.as_mut() {
            Some(orchestrator) => orchestrator.update(),
            None => return Vec::new(),
        };
        events.into_iter().map(|event| self.handle(event)).collect()
    }

    /// Compile `units` of `project` now and block until the module is
    /// swapped in or the build fails.
    pub fn rebuild_blocking(
        &mut self,
        project: &str,
        units: BTreeSet<PathBuf>,
        interval: Duration,
    ) -> RuntimeResult<Option<RuntimeEvent>> {
        let orchestrator = self
            .orchestrator
            .as_mut()
            .ok_or(RuntimeError::NoOrchestrator)?;
        orchestrator.build_now(project, units)?;
        let event = orchestrator.wait(project, interval)?;
        Ok(event.map(|event| self.handle(event)))
    }

    fn handle(&mut self, event: BuildEvent) -> RuntimeEvent {
        let BuildEvent {
            project, outcome, ..
        } = event;
        match outcome {
            BuildOutcome::Loaded { artifact, exports } => {
                match self.install(Some(&project), Some(artifact.clone()), exports) {
                    Ok(report) => {
                        self.sink.info(format_args!(
                            "reloaded `{}`: {} instance(s) swapped",
                            project, report.instances_swapped
                        ));
                        RuntimeEvent::Reloaded {
                            project,
                            artifact,
                            report,
                        }
                    },
                    Err(error) => {
                        self.sink
                            .error(format_args!("reload of `{}` failed: {}", project, error));
                        RuntimeEvent::ReloadFailed {
                            project,
                            artifact,
                            error,
                        }
                    },
                }
            },
            BuildOutcome::Failed { reason } => RuntimeEvent::BuildFailed { project, reason },
            BuildOutcome::Abandoned => RuntimeEvent::Abandoned { project },
        }
    }

    /// Step one generation back.
    pub fn undo(&mut self) -> RuntimeResult<SwapReport> {
        let Self {
            registry,
            coordinator,
            history,
            ..
        } = self;
        let report = history.undo(|factories| coordinator.swap(registry, factories))?;
        self.module_generation += 1;
        Ok(report)
    }

    /// Step one generation forward.
    pub fn redo(&mut self) -> RuntimeResult<SwapReport> {
        let Self {
            registry,
            coordinator,
            history,
            ..
        } = self;
        let report = history.redo(|factories| coordinator.swap(registry, factories))?;
        self.module_generation += 1;
        Ok(report)
    }

    pub fn set_history_size(&mut self, max_size: usize) -> RuntimeResult<()> {
        HistoryConfig { max_size }.validate()?;
        self.history.resize(max_size)?;
        Ok(())
    }

    /// Run a host call site under the fault guard, latched at the current
    /// module generation.
    pub fn guarded<R, F>(&self, latch: &mut FaultLatch, work: F) -> relive_guard::Result<R>
    where
        F: FnOnce() -> R,
    {
        latch.run(self.module_generation, work)
    }

    pub fn construct(&mut self, type_name: &str) -> RuntimeResult<ObjectId> {
        Ok(self.registry.construct_by_name(type_name)?)
    }

    pub fn destroy(&mut self, id: ObjectId) -> RuntimeResult<()> {
        Ok(self.registry.destroy(id)?)
    }

    pub fn lookup(&self, type_name: &str) -> Option<ConstructorId> {
        self.registry.lookup(type_name)
    }

    pub fn resolve_as<T: Object>(&self, id: ObjectId) -> Option<&T> {
        self.registry.resolve_as(id)
    }

    pub fn resolve_as_mut<T: Object>(&mut self, id: ObjectId) -> Option<&mut T> {
        self.registry.resolve_as_mut(id)
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("constructors", &self.registry.len())
            .field("instances", &self.registry.instance_count())
            .field("history", &self.history.len())
            .field("cursor", &self.history.cursor())
            .field("module_generation", &self.module_generation)
            .field("orchestrator", &self.orchestrator)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relive_core::{MemorySink, PropertyPass, SimpleFactory};
    use relive_guard::GuardError;

    #[derive(Default)]
    struct Beacon {
        level: u8,
    }

    impl Object for Beacon {
        fn serialize(&mut self, pass: &mut PropertyPass<'_>) {
            pass.property("level", &mut self.level);
        }
    }

    fn beacon() -> ModuleExports {
        ModuleExports::new(vec![SimpleFactory::new("Beacon", "src/beacon.rs", |_| {
            Box::new(Beacon::default())
        })
        .shared()])
    }

    fn runtime() -> (Runtime, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let runtime = Runtime::new(&HistoryConfig::default(), SwapConfig::default(), sink.clone()).unwrap();
        (runtime, sink)
    }

    #[test]
    fn test_zero_history_is_rejected() {
        let result = Runtime::new(
            &HistoryConfig { max_size: 0 },
            SwapConfig::default(),
            Arc::new(MemorySink::new()),
        );
        assert!(matches!(result, Err(RuntimeError::Config(_))));
    }

    #[test]
    fn test_load_records_module_and_generation() {
        let (mut runtime, _) = runtime();
        runtime.load_exports(None, beacon()).unwrap();

        assert_eq!(runtime.module_generation(), 1);
        assert!(runtime.lookup("Beacon").is_some());
        assert_eq!(
            runtime.modules(),
            &[LoadedModule {
                project: None,
                artifact: None,
                type_names: vec!["Beacon".to_string()],
                generation: 1,
            }]
        );
        assert_eq!(runtime.history().len(), 1);
    }

    #[test]
    fn test_project_load_needs_orchestrator() {
        let (mut runtime, _) = runtime();
        let result = runtime.load_exports(Some("game"), beacon());
        assert!(matches!(result, Err(RuntimeError::NoOrchestrator)));
        assert_eq!(runtime.module_generation(), 0);
    }

    #[test]
    fn test_update_without_orchestrator_is_empty() {
        let (mut runtime, _) = runtime();
        assert!(runtime.update().is_empty());
    }

    #[test]
    fn test_latch_reopens_after_load() {
        let (mut runtime, _) = runtime();
        let mut latch = FaultLatch::new();

        let first = runtime.guarded(&mut latch, || panic!("bad frame"));
        assert!(matches!(first, Err(GuardError::Faulted(_))));
        let skipped = runtime.guarded(&mut latch, || 1);
        assert!(matches!(skipped, Err(GuardError::Skipped(_))));

        runtime.load_exports(None, beacon()).unwrap();
        assert_eq!(runtime.guarded(&mut latch, || 2).unwrap(), 2);
    }

    #[test]
    fn test_construct_and_destroy_by_name() {
        let (mut runtime, _) = runtime();
        runtime.load_exports(None, beacon()).unwrap();

        let id = runtime.construct("Beacon").unwrap();
        runtime.resolve_as_mut::<Beacon>(id).unwrap().level = 7;
        assert_eq!(runtime.resolve_as::<Beacon>(id).unwrap().level, 7);

        runtime.destroy(id).unwrap();
        assert!(runtime.resolve_as::<Beacon>(id).is_none());
        assert!(matches!(runtime.construct("Missing"), Err(RuntimeError::Registry(_))));
    }

    #[test]
    fn test_undo_without_history_fails() {
        let (mut runtime, _) = runtime();
        assert!(matches!(runtime.undo(), Err(RuntimeError::History(_))));
        assert!(matches!(runtime.redo(), Err(RuntimeError::History(_))));
        assert_eq!(runtime.module_generation(), 0);
    }

    #[test]
    fn test_history_resize() {
        let (mut runtime, _) = runtime();
        assert!(matches!(runtime.set_history_size(0), Err(RuntimeError::Config(_))));
        runtime.set_history_size(2).unwrap();
        assert_eq!(runtime.history().max_size(), 2);
    }
}
