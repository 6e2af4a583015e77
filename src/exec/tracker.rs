// src/exec/tracker.rs

//! In-memory table of running basecaller jobs.
//!
//! This is a cache, not a source of truth: it is empty after a restart even
//! when runs on disk are still marked `processing`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::warn;

use crate::exec::process::JobProcess;
use crate::types::JobOutcome;

/// Handle for a tracked job process.
#[derive(Debug)]
pub struct ActiveJob {
    pub run_name: String,
    pub pid: Option<u32>,
    pub started_at: Instant,
    process: Box<dyn JobProcess>,
}

impl ActiveJob {
    pub fn new(run_name: impl Into<String>, process: Box<dyn JobProcess>) -> Self {
        let pid = process.id();
        Self {
            run_name: run_name.into(),
            pid,
            started_at: Instant::now(),
            process,
        }
    }
}

/// A job observed to have exited during [`ActiveJobTable::reap`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReapedJob {
    pub run_path: PathBuf,
    pub run_name: String,
    pub pid: Option<u32>,
    pub outcome: JobOutcome,
    pub elapsed: Duration,
}

/// Running jobs keyed by run directory path.
#[derive(Debug, Default)]
pub struct ActiveJobTable {
    jobs: BTreeMap<PathBuf, ActiveJob>,
}

impl ActiveJobTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn contains(&self, run: &Path) -> bool {
        self.jobs.contains_key(run)
    }

    pub fn insert(&mut self, run: PathBuf, job: ActiveJob) {
        if let Some(previous) = self.jobs.insert(run, job) {
            warn!(
                run = %previous.run_name,
                pid = ?previous.pid,
                "replaced an already tracked job; the previous process is no longer monitored"
            );
        }
    }

    pub fn remove(&mut self, run: &Path) -> Option<ActiveJob> {
        self.jobs.remove(run)
    }

    /// Poll every tracked process without blocking and drop the ones that
    /// have exited.
    ///
    /// A process whose status cannot be read stays tracked and is retried on
    /// the next call.
    pub fn reap(&mut self) -> Vec<ReapedJob> {
        let mut finished = Vec::new();

        for (path, job) in self.jobs.iter_mut() {
            match job.process.try_wait() {
                Ok(Some(outcome)) => finished.push(ReapedJob {
                    run_path: path.clone(),
                    run_name: job.run_name.clone(),
                    pid: job.pid,
                    outcome,
                    elapsed: job.started_at.elapsed(),
                }),
                Ok(None) => {}
                Err(e) => warn!(
                    run = %job.run_name,
                    pid = ?job.pid,
                    error = %e,
                    "could not poll job process; will retry next cycle"
                ),
            }
        }

        for job in &finished {
            self.jobs.remove(&job.run_path);
        }

        finished
    }
}
