// src/engine/core.rs

//! Synchronous scheduler core.
//!
//! One call to [`Scheduler::tick`] performs a full reap → admit cycle:
//!
//! 1. poll every tracked job and persist `completed` / `failed` markers for
//!    the ones that exited;
//! 2. compute free capacity from the post-reap job count;
//! 3. walk discovered runs in enumeration order and launch pending, ready
//!    ones until capacity is used up.
//!
//! The core has no Tokio types and never sleeps; the async shell in
//! [`crate::engine::runtime`] decides when ticks happen. Per-run failures are
//! logged and reflected in that run's markers only, so a tick itself cannot
//! fail.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::ConfigFile;
use crate::discovery::RunDiscovery;
use crate::exec::launcher::{JobLauncher, LaunchSettings};
use crate::exec::process::ProcessSpawner;
use crate::exec::tracker::{ActiveJobTable, ReapedJob};
use crate::fs::FileSystem;
use crate::state::MarkerStore;
use crate::types::{JobOutcome, RunState};

/// What happened during one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Jobs observed to have exited, with their outcomes.
    pub reaped: Vec<ReapedJob>,
    /// Runs launched this tick, in admission order.
    pub launched: Vec<PathBuf>,
    /// Runs whose launch was attempted and did not start a process.
    pub launch_failures: Vec<PathBuf>,
    /// Runs marked `processing` on disk that no tracked job owns (typically
    /// left over from a previous scheduler instance).
    pub untracked_processing: Vec<PathBuf>,
    /// Discovery was skipped because every slot was busy after reaping.
    pub at_capacity: bool,
}

/// Owns the scheduler context: markers, discovery, launcher and the active
/// job table.
pub struct Scheduler<S: ProcessSpawner> {
    markers: MarkerStore,
    discovery: RunDiscovery,
    launcher: JobLauncher<S>,
    jobs: ActiveJobTable,
    max_concurrent_jobs: usize,
}

impl<S: ProcessSpawner> std::fmt::Debug for Scheduler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("watch_root", &self.discovery.watch_root())
            .field("active_jobs", &self.jobs.len())
            .field("max_concurrent_jobs", &self.max_concurrent_jobs)
            .finish_non_exhaustive()
    }
}

impl<S: ProcessSpawner> Scheduler<S> {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        markers: MarkerStore,
        watch_root: impl Into<PathBuf>,
        ready_signal: Option<String>,
        launch: LaunchSettings,
        spawner: S,
        max_concurrent_jobs: usize,
    ) -> Self {
        let discovery = RunDiscovery::new(
            Arc::clone(&fs),
            markers.clone(),
            watch_root,
            ready_signal,
        );
        let launcher = JobLauncher::new(fs, markers.clone(), spawner, launch);
        Self {
            markers,
            discovery,
            launcher,
            jobs: ActiveJobTable::new(),
            max_concurrent_jobs,
        }
    }

    pub fn from_config(cfg: &ConfigFile, fs: Arc<dyn FileSystem>, spawner: S) -> Self {
        let markers = MarkerStore::new(Arc::clone(&fs), cfg.marker_names());
        Self::new(
            fs,
            markers,
            cfg.watcher.watch_directory.clone(),
            cfg.watcher.ready_signal_file.clone(),
            cfg.launch_settings(),
            spawner,
            cfg.basecaller.max_concurrent_jobs,
        )
    }

    pub fn active_jobs(&self) -> &ActiveJobTable {
        &self.jobs
    }

    pub fn max_concurrent_jobs(&self) -> usize {
        self.max_concurrent_jobs
    }

    pub fn markers(&self) -> &MarkerStore {
        &self.markers
    }

    /// Run one reap → admit cycle.
    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport {
            reaped: self.reap(),
            ..TickReport::default()
        };

        let mut available = self.max_concurrent_jobs.saturating_sub(self.jobs.len());
        if available == 0 {
            debug!(
                active = self.jobs.len(),
                "concurrency limit reached; no new jobs will be launched"
            );
            report.at_capacity = true;
            return report;
        }

        for run in self.discovery.scan() {
            match run.state {
                RunState::Pending => {}
                RunState::Processing => {
                    if !self.jobs.contains(&run.path) {
                        warn!(
                            run = %run.name,
                            marker = %self.markers.names().processing,
                            "run is marked processing but not tracked as active; manual check advised"
                        );
                        report.untracked_processing.push(run.path);
                    }
                    continue;
                }
                RunState::Completed | RunState::Failed | RunState::Unknown => {
                    if self.markers.marker_count(&run.path) > 1 {
                        warn!(run = %run.name, state = %run.state, "run carries more than one state marker");
                    }
                    continue;
                }
            }

            if !run.ready {
                continue;
            }

            info!(run = %run.name, available, "found pending and ready run");
            match self.launcher.launch(&run.path, &mut self.jobs) {
                Ok(_) => {
                    report.launched.push(run.path);
                    available -= 1;
                    if available == 0 {
                        debug!("all job slots used; deferring remaining runs to the next cycle");
                        break;
                    }
                }
                Err(e) => {
                    error!(
                        run = %run.name,
                        error = %e,
                        marked_failed = e.marks_run_failed(),
                        "failed to initiate basecalling"
                    );
                    report.launch_failures.push(run.path);
                }
            }
        }

        if !report.launched.is_empty() {
            info!(
                launched = report.launched.len(),
                active = self.jobs.len(),
                "launched new basecalling job(s) this cycle"
            );
        }

        report
    }

    /// Poll tracked jobs and persist the outcome of the finished ones.
    fn reap(&mut self) -> Vec<ReapedJob> {
        let reaped = self.jobs.reap();

        for job in &reaped {
            let target = match job.outcome {
                JobOutcome::Success => {
                    info!(
                        run = %job.run_name,
                        pid = ?job.pid,
                        elapsed_secs = job.elapsed.as_secs(),
                        "basecalling completed successfully"
                    );
                    RunState::Completed
                }
                JobOutcome::Failed(code) => {
                    error!(
                        run = %job.run_name,
                        pid = ?job.pid,
                        exit_code = code,
                        elapsed_secs = job.elapsed.as_secs(),
                        "basecalling failed"
                    );
                    RunState::Failed
                }
            };

            if let Err(e) = self.markers.set_state(&job.run_path, target) {
                warn!(
                    run = %job.run_name,
                    state = %target,
                    error = %e,
                    "could not record job outcome on disk"
                );
            }
        }

        reaped
    }
}
