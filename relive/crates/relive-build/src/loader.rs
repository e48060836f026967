//! Module loading.
//!
//! [`DylibLoader`] opens a built artifact with `libloading` and calls its
//! [`MODULE_ENTRY_SYMBOL`] under a fault guard, so a trap or panic in the
//! entry point fails the load instead of the host. Loaded libraries are
//! never closed: factories, vtables and instances created from them live on
//! in the registry, and generation history can swap them back in at any
//! time.

use std::path::{Path, PathBuf};

use libloading::{Library, Symbol};
use relive_core::{ModuleEntryFn, ModuleExports, MODULE_ENTRY_SYMBOL};

use crate::error::{BuildError, BuildResult};

/// Turns an artifact path into the module's exports.
#[cfg_attr(test, mockall::automock)]
pub trait ModuleLoader: Send {
    fn load(&mut self, path: &Path) -> BuildResult<ModuleExports>;
}

/// Loader backed by the platform's dynamic linker.
#[derive(Debug, Default)]
pub struct DylibLoader {
    loaded: Vec<(PathBuf, Library)>,
}

impl DylibLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loaded_count(&self) -> usize {
        self.loaded.len()
    }

    pub fn loaded_paths(&self) -> impl Iterator<Item = &Path> {
        self.loaded.iter().map(|(path, _)| path.as_path())
    }
}

impl ModuleLoader for DylibLoader {
    fn load(&mut self, path: &Path) -> BuildResult<ModuleExports> {
        // SAFETY: the artifact was produced by the configured compiler for
        // this process; its initializers are trusted like any linked code.
        let library = unsafe { Library::new(path) }.map_err(|err| BuildError::Load {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;

        let entry: ModuleEntryFn = {
            // SAFETY: modules built against relive-core export the entry
            // point with exactly this signature.
            let symbol: Symbol<ModuleEntryFn> = unsafe { library.get(MODULE_ENTRY_SYMBOL.as_bytes()) }
                .map_err(|_| BuildError::MissingEntryPoint {
                    path: path.to_path_buf(),
                    symbol: MODULE_ENTRY_SYMBOL,
                })?;
            *symbol
        };
        let exports = match call_entry(path, entry) {
            Ok(exports) => exports,
            Err(err) => {
                // Code of a faulted module may still be referenced from
                // state it touched; keep it mapped.
                std::mem::forget(library);
                return Err(err);
            },
        };

        log::debug!(
            "loaded module {} with {} constructor(s)",
            path.display(),
            exports.constructors.len()
        );
        self.loaded.push((path.to_path_buf(), library));
        Ok(exports)
    }
}

/// Run a module entry point under a fault guard.
fn call_entry(path: &Path, entry: ModuleEntryFn) -> BuildResult<ModuleExports> {
    relive_guard::run(entry).map_err(|err| {
        let fault = err.into_fault();
        log::error!("entry point of {} faulted: {}", path.display(), fault);
        BuildError::Load {
            path: path.to_path_buf(),
            reason: format!("entry point faulted: {}", fault),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn panicking_entry() -> ModuleExports {
        panic!("constructor table corrupt")
    }

    #[cfg(unix)]
    fn trapping_entry() -> ModuleExports {
        unsafe {
            libc::raise(libc::SIGSEGV);
        }
        ModuleExports::default()
    }

    #[test]
    fn test_entry_point_exports_are_returned() {
        let exports = call_entry(Path::new("libgame_0.so"), ModuleExports::default).unwrap();
        assert!(exports.constructors.is_empty());
    }

    #[test]
    fn test_panic_in_entry_point_is_a_load_error() {
        match call_entry(Path::new("libgame_1.so"), panicking_entry) {
            Err(BuildError::Load { path, reason }) => {
                assert_eq!(path, PathBuf::from("libgame_1.so"));
                assert!(reason.contains("constructor table corrupt"), "{reason}");
            },
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_trap_in_entry_point_is_a_load_error() {
        let err = call_entry(Path::new("libgame_2.so"), trapping_entry).unwrap_err();
        assert!(matches!(err, BuildError::Load { .. }));
        assert!(err.to_string().contains("entry point faulted"));

        // The guard is released; the next load proceeds normally.
        assert!(call_entry(Path::new("libgame_3.so"), ModuleExports::default).is_ok());
        assert!(!relive_guard::is_guarding());
    }

    #[test]
    fn test_missing_artifact_is_a_load_error() {
        let mut loader = DylibLoader::new();
        let result = loader.load(Path::new("/nonexistent/relive/libnothing_0.so"));
        assert!(matches!(result, Err(BuildError::Load { .. })));
        assert_eq!(loader.loaded_count(), 0);
    }

    #[test]
    fn test_mock_loader_returns_exports() {
        let mut loader = MockModuleLoader::new();
        loader
            .expect_load()
            .returning(|_| Ok(ModuleExports::default()));
        let exports = loader.load(Path::new("libgame_0.so")).unwrap();
        assert!(exports.constructors.is_empty());
    }
}
