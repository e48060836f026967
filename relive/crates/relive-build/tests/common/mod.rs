//! Fake compilers and a mock loader for orchestrator tests.
//!
//! The compilers are shell scripts that find the path after `-o` and
//! create it. They are written once per test binary, before any test
//! spawns a process.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use mockall::mock;
use relive_build::{BuildEvent, BuildOrchestrator, BuildResult, ModuleLoader, NullWatcher, ProjectConfig};
use relive_core::{MemorySink, ModuleExports, Object, ObjectFactory, PropertyPass, SimpleFactory};

mock! {
    pub Loader {}

    impl ModuleLoader for Loader {
        fn load(&mut self, path: &Path) -> BuildResult<ModuleExports>;
    }
}

const FIND_OUTPUT: &str = r#"out=""
while [ "$#" -gt 0 ]; do
    if [ "$1" = "-o" ]; then
        out="$2"
        shift
    fi
    shift
done
"#;

pub struct Compilers {
    pub ok: PathBuf,
    pub slow: PathBuf,
    pub failing: PathBuf,
    pub silent: PathBuf,
}

/// Paths of the fake compilers.
pub fn compilers() -> &'static Compilers {
    static COMPILERS: OnceLock<Compilers> = OnceLock::new();
    COMPILERS.get_or_init(|| {
        let dir = Path::new(env!("CARGO_TARGET_TMPDIR")).join("relive-build-compilers");
        fs::create_dir_all(&dir).unwrap();
        Compilers {
            ok: write_script(&dir, "ok_cc", &format!("{FIND_OUTPUT}echo \"linking $out\"\n: > \"$out\"\n")),
            slow: write_script(
                &dir,
                "slow_cc",
                &format!("{FIND_OUTPUT}sleep 0.4\necho \"linking $out\"\n: > \"$out\"\n"),
            ),
            failing: write_script(
                &dir,
                "failing_cc",
                "echo \"src/a.c:1:1: error: expected declaration\" >&2\n\
                 echo \"src/a.c:2:5: warning: unused variable\" >&2\n\
                 exit 1\n",
            ),
            silent: write_script(&dir, "silent_cc", "exit 0\n"),
        }
    })
}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

pub struct Blank;

impl Object for Blank {
    fn serialize(&mut self, _pass: &mut PropertyPass<'_>) {}
}

/// Factory for a unit at `source` with the given modifiable headers.
pub fn unit(source: &Path, modifiable: &[&Path]) -> Arc<dyn ObjectFactory> {
    let name = source
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("Blank")
        .to_string();
    let mut factory = SimpleFactory::new(name, source, |_| Box::new(Blank));
    for header in modifiable {
        factory = factory.modifiable_include(*header);
    }
    factory.shared()
}

/// Loader expecting exactly `times` loads, each returning empty exports.
pub fn loader(times: usize) -> MockLoader {
    let mut loader = MockLoader::new();
    loader
        .expect_load()
        .times(times)
        .returning(|_| Ok(ModuleExports::default()));
    loader
}

pub struct Fixture {
    pub dir: tempfile::TempDir,
    pub orchestrator: BuildOrchestrator,
    pub sink: Arc<MemorySink>,
}

impl Fixture {
    /// Orchestrator with one project `game` built by `compiler`.
    pub fn new(compiler: &Path, loader: MockLoader, configure: impl FnOnce(&mut ProjectConfig)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ProjectConfig::new("game")
            .with_compiler(compiler)
            .with_intermediate_dir(dir.path().join("out"));
        configure(&mut config);

        let sink = Arc::new(MemorySink::new());
        let orchestrator = BuildOrchestrator::new(
            vec![config],
            Box::new(NullWatcher),
            Box::new(loader),
            sink.clone(),
        )
        .unwrap();
        Self {
            dir,
            orchestrator,
            sink,
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Update until a cycle finishes.
    pub fn pump(&mut self) -> BuildEvent {
        let deadline = Instant::now() + Duration::from_secs(20);
        loop {
            let mut events = self.orchestrator.update();
            if let Some(event) = events.pop() {
                return event;
            }
            assert!(Instant::now() < deadline, "build did not finish in time");
            std::thread::sleep(Duration::from_millis(10));
        }
    }
}
