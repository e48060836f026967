//! Watcher backed by the platform's file notification API.
//!
//! Each watched file's parent directory is registered with `notify`, so
//! editors that save by writing a temporary file and renaming it over the
//! original are still seen. Events are filtered down to the registered
//! files and delivered from the notification thread as one batch per event.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{BuildError, BuildResult};
use crate::watch::{ChangeSender, FileWatcher};

#[derive(Debug)]
struct Route {
    /// Path as the index knows it.
    registered: PathBuf,
    listeners: Vec<usize>,
}

#[derive(Debug, Default)]
struct Routes {
    /// Keyed by the registered path and by its canonical form.
    files: FxHashMap<PathBuf, Route>,
    listeners: Vec<ChangeSender>,
}

impl Routes {
    fn listener_index(&mut self, listener: ChangeSender) -> usize {
        match self.listeners.iter().position(|known| known.same_queue(&listener)) {
            Some(index) => index,
            None => {
                self.listeners.push(listener);
                self.listeners.len() - 1
            },
        }
    }

    /// Returns false when `path` already went to `listener`.
    fn add(&mut self, path: &Path, listener: usize) -> bool {
        let mut keys = vec![path.to_path_buf()];
        if let Ok(canonical) = path.canonicalize() {
            if canonical != path {
                keys.push(canonical);
            }
        }

        let mut added = false;
        for key in keys {
            let route = self.files.entry(key).or_insert_with(|| Route {
                registered: path.to_path_buf(),
                listeners: Vec::new(),
            });
            if !route.listeners.contains(&listener) {
                route.listeners.push(listener);
                added = true;
            }
        }
        added
    }

    fn dispatch(&self, paths: &[PathBuf]) {
        let mut batches: Vec<Vec<PathBuf>> = vec![Vec::new(); self.listeners.len()];
        for path in paths {
            let Some(route) = self.files.get(path) else {
                continue;
            };
            for &listener in &route.listeners {
                if !batches[listener].contains(&route.registered) {
                    batches[listener].push(route.registered.clone());
                }
            }
        }
        for (listener, batch) in self.listeners.iter().zip(batches) {
            if !batch.is_empty() && !listener.send(batch) {
                log::debug!("change listener dropped");
            }
        }
    }
}

fn is_content_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

/// Event-driven watcher; [`poll`](FileWatcher::poll) has nothing to do.
pub struct NotifyWatcher {
    watcher: RecommendedWatcher,
    routes: Arc<Mutex<Routes>>,
    directories: FxHashSet<PathBuf>,
}

impl NotifyWatcher {
    pub fn new() -> BuildResult<Self> {
        let routes = Arc::new(Mutex::new(Routes::default()));
        let handler_routes = Arc::clone(&routes);
        let watcher = notify::recommended_watcher(move |event: notify::Result<Event>| match event {
            Ok(event) if is_content_change(&event.kind) => handler_routes.lock().dispatch(&event.paths),
            Ok(_) => {},
            Err(err) => log::warn!("file watch error: {}", err),
        })
        .map_err(|err| BuildError::Watch {
            path: PathBuf::new(),
            reason: err.to_string(),
        })?;

        Ok(Self {
            watcher,
            routes,
            directories: FxHashSet::default(),
        })
    }

    pub fn watched_count(&self) -> usize {
        let routes = self.routes.lock();
        routes
            .files
            .values()
            .map(|route| &route.registered)
            .collect::<FxHashSet<_>>()
            .len()
    }
}

impl std::fmt::Debug for NotifyWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyWatcher")
            .field("directories", &self.directories)
            .finish_non_exhaustive()
    }
}

impl FileWatcher for NotifyWatcher {
    fn watch(&mut self, path: &Path, listener: ChangeSender) -> BuildResult<()> {
        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if !self.directories.contains(&directory) {
            self.watcher
                .watch(&directory, RecursiveMode::NonRecursive)
                .map_err(|err| BuildError::Watch {
                    path: path.to_path_buf(),
                    reason: err.to_string(),
                })?;
            log::debug!("watching directory {}", directory.display());
            self.directories.insert(directory);
        }

        let mut routes = self.routes.lock();
        let listener = routes.listener_index(listener);
        routes.add(path, listener);
        Ok(())
    }

    fn poll(&mut self) {}
}
