// src/state/markers.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing::{debug, warn};

use crate::fs::FileSystem;
use crate::types::RunState;

/// File names of the three state markers inside a run directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerNames {
    pub processing: String,
    pub completed: String,
    pub failed: String,
}

impl Default for MarkerNames {
    fn default() -> Self {
        Self {
            processing: ".processing".to_string(),
            completed: ".completed".to_string(),
            failed: ".failed".to_string(),
        }
    }
}

impl MarkerNames {
    /// Marker file name for a state, if that state is encoded by a marker.
    pub fn for_state(&self, state: RunState) -> Option<&str> {
        match state {
            RunState::Processing => Some(self.processing.as_str()),
            RunState::Completed => Some(self.completed.as_str()),
            RunState::Failed => Some(self.failed.as_str()),
            RunState::Pending | RunState::Unknown => None,
        }
    }

    /// Markers in lookup priority order.
    fn in_priority_order(&self) -> [(RunState, &str); 3] {
        [
            (RunState::Processing, self.processing.as_str()),
            (RunState::Completed, self.completed.as_str()),
            (RunState::Failed, self.failed.as_str()),
        ]
    }
}

/// Reads and writes run lifecycle markers.
#[derive(Debug, Clone)]
pub struct MarkerStore {
    fs: Arc<dyn FileSystem>,
    names: MarkerNames,
}

impl MarkerStore {
    pub fn new(fs: Arc<dyn FileSystem>, names: MarkerNames) -> Self {
        Self { fs, names }
    }

    pub fn names(&self) -> &MarkerNames {
        &self.names
    }

    fn marker_path(&self, run: &Path, name: &str) -> PathBuf {
        run.join(name)
    }

    /// Current state of `run`, read purely from the filesystem.
    ///
    /// Markers are checked in priority order (processing, completed, failed)
    /// and the first one present wins.
    pub fn get_state(&self, run: &Path) -> RunState {
        if !self.fs.is_dir(run) {
            return RunState::Unknown;
        }

        self.names
            .in_priority_order()
            .into_iter()
            .find(|(_, name)| self.fs.exists(&self.marker_path(run, name)))
            .map(|(state, _)| state)
            .unwrap_or(RunState::Pending)
    }

    /// Number of marker files currently present in `run`.
    ///
    /// Anything above one means a transition was interrupted half-way.
    pub fn marker_count(&self, run: &Path) -> usize {
        self.names
            .in_priority_order()
            .into_iter()
            .filter(|(_, name)| self.fs.exists(&self.marker_path(run, name)))
            .count()
    }

    /// Move `run` to `target`.
    ///
    /// The target marker is created first (a no-op if already present), then
    /// the other two are removed. Setting `Pending` clears all three.
    ///
    /// Only failing to create the target marker is an error; a marker that
    /// cannot be removed is logged and left behind.
    pub fn set_state(&self, run: &Path, target: RunState) -> Result<()> {
        if target == RunState::Unknown {
            return Err(anyhow!("cannot mark {:?} as unknown", run));
        }

        let target_name = self.names.for_state(target);
        if let Some(name) = target_name {
            self.fs.touch(&self.marker_path(run, name))?;
            debug!(run = ?run, marker = name, "marked run");
        }

        for (_, name) in self.names.in_priority_order() {
            if Some(name) == target_name {
                continue;
            }
            let path = self.marker_path(run, name);
            if !self.fs.exists(&path) {
                continue;
            }
            match self.fs.remove_file(&path) {
                Ok(()) => debug!(run = ?run, marker = name, "removed marker"),
                Err(e) => warn!(
                    run = ?run,
                    marker = name,
                    error = %e,
                    "could not remove stale marker"
                ),
            }
        }

        Ok(())
    }
}
