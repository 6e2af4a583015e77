// src/discovery.rs

//! Run discovery: enumerate the run directories directly under the watch
//! root and decide which of them are eligible for admission.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error};

use crate::fs::FileSystem;
use crate::state::MarkerStore;
use crate::types::RunState;

/// A visible run directory as seen during one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredRun {
    pub path: PathBuf,
    /// Final path segment, lossily decoded for display. Paths are always
    /// built from `path`.
    pub name: String,
    pub state: RunState,
    /// Whether the ready-signal gate is satisfied (always true when no
    /// ready-signal file is configured).
    pub ready: bool,
}

impl DiscoveredRun {
    /// Pending and ready: the scheduler may launch it.
    pub fn is_candidate(&self) -> bool {
        self.state == RunState::Pending && self.ready
    }
}

/// Scans a watch root for run directories.
#[derive(Debug, Clone)]
pub struct RunDiscovery {
    fs: Arc<dyn FileSystem>,
    markers: MarkerStore,
    watch_root: PathBuf,
    ready_signal: Option<String>,
}

impl RunDiscovery {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        markers: MarkerStore,
        watch_root: impl Into<PathBuf>,
        ready_signal: Option<String>,
    ) -> Self {
        Self {
            fs,
            markers,
            watch_root: watch_root.into(),
            ready_signal,
        }
    }

    pub fn watch_root(&self) -> &Path {
        &self.watch_root
    }

    /// Visible run directories in enumeration order.
    ///
    /// Hidden entries and non-directories are skipped. State and readiness
    /// are only read as the iterator is advanced, so a caller that stops
    /// early never touches the remaining directories.
    ///
    /// If the watch root cannot be listed the error is logged and the scan
    /// yields nothing; the root may come back on a later tick.
    pub fn scan(&self) -> impl Iterator<Item = DiscoveredRun> + '_ {
        let entries = match self.fs.read_dir(&self.watch_root) {
            Ok(entries) => entries,
            Err(e) => {
                if self.fs.exists(&self.watch_root) {
                    error!(root = ?self.watch_root, error = %e, "error scanning watch directory");
                } else {
                    error!(root = ?self.watch_root, "watch directory not found during scan");
                }
                Vec::new()
            }
        };

        entries
            .into_iter()
            .filter_map(move |path| self.inspect(path))
    }

    /// Only the runs that may be launched right now.
    pub fn scan_candidates(&self) -> impl Iterator<Item = DiscoveredRun> + '_ {
        self.scan().filter(DiscoveredRun::is_candidate)
    }

    fn inspect(&self, path: PathBuf) -> Option<DiscoveredRun> {
        let name = path.file_name()?.to_string_lossy().into_owned();
        if name.starts_with('.') || !self.fs.is_dir(&path) {
            return None;
        }

        let state = self.markers.get_state(&path);
        let ready = match (&self.ready_signal, state) {
            (Some(signal), RunState::Pending) => {
                let present = self.fs.is_file(&path.join(signal));
                if present {
                    debug!(run = %name, signal = %signal, "ready signal found");
                } else {
                    debug!(run = %name, signal = %signal, "run pending, waiting for ready signal");
                }
                present
            }
            (Some(signal), _) => self.fs.is_file(&path.join(signal)),
            (None, _) => true,
        };

        Some(DiscoveredRun {
            path,
            name,
            state,
            ready,
        })
    }
}
