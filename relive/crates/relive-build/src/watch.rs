//! File-change input.
//!
//! Watchers deliver batches of changed paths through a [`ChangeSender`].
//! The sender is `Send` and may be used from any thread; the orchestrator
//! drains the matching [`ChangeQueue`] on the thread that drives updates.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use crossbeam::channel::{self, Receiver, Sender};
use rustc_hash::FxHashSet;

use crate::error::BuildResult;

/// Sending half of the change queue.
#[derive(Debug, Clone)]
pub struct ChangeSender {
    tx: Sender<Vec<PathBuf>>,
}

impl ChangeSender {
    /// Queue one batch. Returns false when the queue is gone.
    pub fn send(&self, batch: Vec<PathBuf>) -> bool {
        if batch.is_empty() {
            return true;
        }
        self.tx.send(batch).is_ok()
    }

    pub fn same_queue(&self, other: &ChangeSender) -> bool {
        self.tx.same_channel(&other.tx)
    }
}

/// Thread-safe queue of change batches.
#[derive(Debug)]
pub struct ChangeQueue {
    tx: Sender<Vec<PathBuf>>,
    rx: Receiver<Vec<PathBuf>>,
}

impl ChangeQueue {
    pub fn new() -> Self {
        let (tx, rx) = channel::unbounded();
        Self { tx, rx }
    }

    pub fn sender(&self) -> ChangeSender {
        ChangeSender { tx: self.tx.clone() }
    }

    /// Every path queued so far, first occurrence order, without repeats.
    pub fn drain(&self) -> Vec<PathBuf> {
        let mut seen = FxHashSet::default();
        let mut paths = Vec::new();
        for batch in self.rx.try_iter() {
            for path in batch {
                if seen.insert(path.clone()) {
                    paths.push(path);
                }
            }
        }
        paths
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl Default for ChangeQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Source of change notifications.
#[cfg_attr(test, mockall::automock)]
pub trait FileWatcher: Send {
    /// Report changes of `path` to `listener`.
    fn watch(&mut self, path: &Path, listener: ChangeSender) -> BuildResult<()>;

    /// Give the watcher a chance to run; called once per orchestrator
    /// update.
    fn poll(&mut self);
}

/// Watcher that never reports anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullWatcher;

impl FileWatcher for NullWatcher {
    fn watch(&mut self, _path: &Path, _listener: ChangeSender) -> BuildResult<()> {
        Ok(())
    }

    fn poll(&mut self) {}
}

#[derive(Debug)]
struct Watched {
    path: PathBuf,
    modified: Option<SystemTime>,
    listener: usize,
}

/// Modification-time polling watcher.
///
/// Stats every watched path at most once per `interval`; all changes seen
/// in one poll go to their listener as a single batch.
#[derive(Debug)]
pub struct PollingWatcher {
    interval: Duration,
    last_poll: Option<Instant>,
    watched: Vec<Watched>,
    listeners: Vec<ChangeSender>,
}

impl PollingWatcher {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(250);

    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_poll: None,
            watched: Vec::new(),
            listeners: Vec::new(),
        }
    }

    pub fn watched_count(&self) -> usize {
        self.watched.len()
    }

    /// Stat everything now, ignoring the interval.
    pub fn scan(&mut self) {
        self.last_poll = Some(Instant::now());
        let mut batches: Vec<Vec<PathBuf>> = vec![Vec::new(); self.listeners.len()];
        for entry in &mut self.watched {
            let modified = modified_time(&entry.path);
            if modified != entry.modified {
                entry.modified = modified;
                batches[entry.listener].push(entry.path.clone());
            }
        }
        for (listener, batch) in self.listeners.iter().zip(batches) {
            if batch.is_empty() {
                continue;
            }
            if !listener.send(batch) {
                log::debug!("change listener dropped");
            }
        }
    }
}

impl Default for PollingWatcher {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INTERVAL)
    }
}

impl FileWatcher for PollingWatcher {
    fn watch(&mut self, path: &Path, listener: ChangeSender) -> BuildResult<()> {
        let listener = match self.listeners.iter().position(|known| known.same_queue(&listener)) {
            Some(index) => index,
            None => {
                self.listeners.push(listener);
                self.listeners.len() - 1
            },
        };
        if self
            .watched
            .iter()
            .any(|entry| entry.path == path && entry.listener == listener)
        {
            return Ok(());
        }
        self.watched.push(Watched {
            path: path.to_path_buf(),
            modified: modified_time(path),
            listener,
        });
        Ok(())
    }

    fn poll(&mut self) {
        let due = self
            .last_poll
            .map_or(true, |last| last.elapsed() >= self.interval);
        if due {
            self.scan();
        }
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|meta| meta.modified()).ok()
}
