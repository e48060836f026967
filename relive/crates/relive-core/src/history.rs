//! Generation History - Undo and Redo of Swaps
//!
//! A bounded log of the generations produced by successful swaps, with a
//! cursor counting how many steps into the past the registry currently is.
//!
//! ```text
//!   oldest                               newest
//!   [ g0 | g1 | g2 | g3 | g4 ]      cursor = 2
//!                 ▲
//!                 live: g0..g2 applied, g3 and g4 undone
//! ```
//!
//! - `undo` re-applies the "before" factories of the newest applied
//!   generation, `redo` the "after" factories of the oldest undone one.
//! - The cursor moves only when the re-applied swap succeeds.
//! - Constructors a generation added stay registered across undo; their ids
//!   are never reused and live instances may still refer to them.
//! - History cannot branch: a new generation is only recorded at the present.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::config::HistoryConfig;
use crate::error::{HistoryError, HistoryResult, SwapError};
use crate::object::ObjectFactory;
use crate::swap::{Generation, SwapReport};

/// Bounded undo/redo log of generations.
#[derive(Debug)]
pub struct GenerationHistory {
    entries: VecDeque<Generation>,
    max_size: usize,
    cursor: usize,
}

impl GenerationHistory {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_size),
            max_size,
            cursor: 0,
        }
    }

    pub fn from_config(config: &HistoryConfig) -> Self {
        Self::new(config.max_size)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Steps into the past; 0 is the present.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn can_undo(&self) -> bool {
        self.cursor < self.entries.len()
    }

    pub fn can_redo(&self) -> bool {
        self.cursor > 0
    }

    /// Generations from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Generation> {
        self.entries.iter()
    }

    /// Append a generation, dropping the oldest entries beyond `max_size`.
    ///
    /// Empty generations are not recorded.
    pub fn record(&mut self, generation: Generation) -> HistoryResult<()> {
        if self.cursor != 0 {
            return Err(HistoryError::NotAtPresent {
                cursor: self.cursor,
            });
        }
        if generation.is_empty() {
            return Ok(());
        }

        self.entries.push_back(generation);
        while self.entries.len() > self.max_size {
            self.entries.pop_front();
        }
        Ok(())
    }

    /// Step one generation back.
    ///
    /// `apply` receives the factories to swap in and performs the swap.
    pub fn undo<F>(&mut self, apply: F) -> HistoryResult<SwapReport>
    where
        F: FnOnce(Vec<Arc<dyn ObjectFactory>>) -> Result<SwapReport, SwapError>,
    {
        if !self.can_undo() {
            return Err(HistoryError::NoMoreHistory);
        }
        let index = self.entries.len() - self.cursor - 1;
        let factories = self.entries[index].before_factories();
        let report = apply(factories)?;
        self.cursor += 1;
        log::debug!("undo: now {} step(s) into history", self.cursor);
        Ok(report)
    }

    /// Step one generation forward.
    pub fn redo<F>(&mut self, apply: F) -> HistoryResult<SwapReport>
    where
        F: FnOnce(Vec<Arc<dyn ObjectFactory>>) -> Result<SwapReport, SwapError>,
    {
        if !self.can_redo() {
            return Err(HistoryError::NoMoreHistory);
        }
        let index = self.entries.len() - self.cursor;
        let factories = self.entries[index].after_factories();
        let report = apply(factories)?;
        self.cursor -= 1;
        log::debug!("redo: now {} step(s) into history", self.cursor);
        Ok(report)
    }

    /// Redo until the cursor is back at the present.
    pub fn redo_all<F>(&mut self, mut apply: F) -> HistoryResult<usize>
    where
        F: FnMut(Vec<Arc<dyn ObjectFactory>>) -> Result<SwapReport, SwapError>,
    {
        let mut steps = 0;
        while self.can_redo() {
            self.redo(&mut apply)?;
            steps += 1;
        }
        Ok(steps)
    }

    /// Change the maximum size.
    ///
    /// # Errors
    /// [`HistoryError::ResizeBelowCursor`] when `max_size` is smaller than
    /// the number of undo steps in use.
    pub fn resize(&mut self, max_size: usize) -> HistoryResult<()> {
        if max_size < self.cursor {
            return Err(HistoryError::ResizeBelowCursor {
                requested: max_size,
                cursor: self.cursor,
            });
        }
        self.max_size = max_size;
        while self.entries.len() > max_size {
            self.entries.pop_front();
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
    }
}

impl Default for GenerationHistory {
    fn default() -> Self {
        Self::from_config(&HistoryConfig::default())
    }
}
