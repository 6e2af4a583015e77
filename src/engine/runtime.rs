// src/engine/runtime.rs

use std::fmt;
use std::time::Duration;

use anyhow::anyhow;
use tracing::{debug, error, info};

use crate::errors::{BasecallError, Result};
use crate::exec::process::ProcessSpawner;

use super::core::Scheduler;
use super::shutdown::ShutdownToken;

/// Granularity at which the inter-tick sleep notices a shutdown request.
pub const SLEEP_SLICE: Duration = Duration::from_secs(1);

/// Runtime options for the async shell.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    /// Time between the end of one tick and the start of the next.
    pub check_interval: Duration,
    /// If true, run exactly one tick and return (used for `--once`).
    pub exit_after_one_tick: bool,
}

/// Drives the scheduler core on a fixed polling interval until shutdown is
/// requested.
///
/// Jobs still running when the loop ends are deliberately left alone: they
/// are not signalled, waited for, or tracked by anything afterwards.
pub struct Runtime<S: ProcessSpawner> {
    scheduler: Scheduler<S>,
    shutdown: ShutdownToken,
    options: RuntimeOptions,
}

impl<S: ProcessSpawner> fmt::Debug for Runtime<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("scheduler", &self.scheduler)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<S: ProcessSpawner> Runtime<S> {
    pub fn new(scheduler: Scheduler<S>, shutdown: ShutdownToken, options: RuntimeOptions) -> Self {
        Self {
            scheduler,
            shutdown,
            options,
        }
    }
}

impl<S: ProcessSpawner + 'static> Runtime<S> {
    /// Main polling loop.
    ///
    /// A tick that has started always runs to completion; shutdown is only
    /// observed between ticks.
    ///
    /// Ticks scan and write the watched tree with blocking `std::fs` calls,
    /// so each one runs on the blocking pool with the scheduler moved in and
    /// handed back.
    pub async fn run(self) -> Result<()> {
        let Runtime {
            mut scheduler,
            shutdown,
            options,
        } = self;

        info!(
            interval_secs = options.check_interval.as_secs(),
            max_concurrent_jobs = scheduler.max_concurrent_jobs(),
            "basecall-watch runtime started"
        );

        let mut ticks: u64 = 0;
        while !shutdown.is_requested() {
            let (returned, report) = tokio::task::spawn_blocking(move || {
                let report = scheduler.tick();
                (scheduler, report)
            })
            .await
            .map_err(|e| {
                error!(error = %e, "scheduler tick aborted");
                BasecallError::Other(anyhow!("scheduler tick aborted: {e}"))
            })?;
            scheduler = returned;

            ticks += 1;
            debug!(
                tick = ticks,
                reaped = report.reaped.len(),
                launched = report.launched.len(),
                failed_launches = report.launch_failures.len(),
                active = scheduler.active_jobs().len(),
                "tick finished"
            );

            if options.exit_after_one_tick {
                break;
            }
            sleep_until_next_tick(options.check_interval, &shutdown).await;
        }

        info!(ticks, "watcher loop finished");
        info!(
            remaining = scheduler.active_jobs().len(),
            "existing basecaller processes will continue to run"
        );
        Ok(())
    }
}

/// Sleep for `interval` in [`SLEEP_SLICE`] steps, returning early once
/// shutdown is requested.
async fn sleep_until_next_tick(interval: Duration, shutdown: &ShutdownToken) {
    let mut remaining = interval;
    while !remaining.is_zero() && !shutdown.is_requested() {
        let step = remaining.min(SLEEP_SLICE);
        tokio::time::sleep(step).await;
        remaining -= step;
    }
}
