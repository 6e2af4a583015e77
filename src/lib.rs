// src/lib.rs

pub mod cli;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod state;
pub mod types;

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing::{error, info};

use crate::cli::CliArgs;
use crate::config::ConfigFile;
use crate::discovery::RunDiscovery;
use crate::engine::{spawn_signal_listener, Runtime, RuntimeOptions, Scheduler, ShutdownToken};
use crate::errors::BasecallError;
use crate::exec::{JobLauncher, TokioSpawner};
use crate::fs::{FileSystem, RealFileSystem};
use crate::state::MarkerStore;

/// High-level entry point used by `main.rs`, after config loading and
/// logging setup.
///
/// This wires together:
/// - the startup check on the watch directory
/// - scheduler core + process spawner
/// - SIGINT / SIGTERM handling
/// - the polling runtime
pub async fn run(args: CliArgs, cfg: ConfigFile) -> Result<()> {
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);

    if args.dry_run {
        return print_dry_run(&cfg, fs).map_err(Into::into);
    }

    let watch_root = &cfg.watcher.watch_directory;
    if let Err(e) = ensure_watch_root(fs.as_ref(), watch_root) {
        error!(error = %e, "cannot start");
        return Err(e.into());
    }

    info!(watch_directory = ?watch_root, "starting watcher");
    info!(interval_secs = cfg.watcher.check_interval, "checking for runs periodically");
    if let Some(ref signal) = cfg.watcher.ready_signal_file {
        info!(signal = %signal, "waiting for ready-signal file before launching a run");
    }
    info!(max_concurrent_jobs = cfg.basecaller.max_concurrent_jobs, "concurrency limit");

    let scheduler = Scheduler::from_config(&cfg, Arc::clone(&fs), TokioSpawner);

    let shutdown = ShutdownToken::new();
    let _signals = spawn_signal_listener(shutdown.clone());

    let options = RuntimeOptions {
        check_interval: cfg.check_interval(),
        exit_after_one_tick: args.once,
    };
    let runtime = Runtime::new(scheduler, shutdown, options);

    // Run the loop on its own task so a panic inside a tick is reported as a
    // fault instead of unwinding through main.
    match tokio::spawn(runtime.run()).await {
        Ok(res) => {
            res?;
            info!("basecall watcher finished");
            Ok(())
        }
        Err(join_err) => {
            error!(
                error = %join_err,
                "scheduler loop aborted by an internal fault; running jobs are left unmanaged"
            );
            Err(anyhow!("scheduler loop aborted: {join_err}"))
        }
    }
}

/// The watch root must be an existing, listable directory before the loop
/// starts. Later disappearance is tolerated per tick.
pub fn ensure_watch_root(fs: &dyn FileSystem, root: &Path) -> errors::Result<()> {
    if !fs.is_dir(root) {
        return Err(BasecallError::WatchRoot {
            path: root.to_path_buf(),
            reason: "does not exist or is not a directory".to_string(),
        });
    }
    fs.read_dir(root).map_err(|e| BasecallError::WatchRoot {
        path: root.to_path_buf(),
        reason: format!("{e:#}"),
    })?;
    Ok(())
}

/// Dry-run output: print settings, run states and the command each pending
/// run would get. Nothing is launched and no marker is written.
///
/// An unusable watch root is reported and returned as an error, as it would
/// be at startup.
pub fn print_dry_run(cfg: &ConfigFile, fs: Arc<dyn FileSystem>) -> errors::Result<()> {
    println!("basecall-watch dry-run");
    println!("  watcher.watch_directory = {:?}", cfg.watcher.watch_directory);
    println!("  watcher.check_interval = {}s", cfg.watcher.check_interval);
    match cfg.watcher.ready_signal_file {
        Some(ref signal) => println!("  watcher.ready_signal_file = {signal:?}"),
        None => println!("  watcher.ready_signal_file = (none)"),
    }
    println!("  basecaller.executable = {:?}", cfg.basecaller.executable);
    println!(
        "  basecaller.output_base_directory = {:?}",
        cfg.basecaller.output_base_directory
    );
    println!("  basecaller.config = {:?}", cfg.basecaller.config);
    println!("  basecaller.arguments = {}", cfg.template().source());
    println!(
        "  basecaller.max_concurrent_jobs = {}",
        cfg.basecaller.max_concurrent_jobs
    );
    let names = cfg.marker_names();
    println!(
        "  state_files = {:?} / {:?} / {:?}",
        names.processing, names.completed, names.failed
    );
    if !fs.is_file(&cfg.basecaller.executable) {
        println!("  WARNING: executable does not exist; every launch would mark its run failed");
    }
    println!();

    if let Err(e) = ensure_watch_root(fs.as_ref(), &cfg.watcher.watch_directory) {
        println!("{e}");
        return Err(e);
    }

    let markers = MarkerStore::new(Arc::clone(&fs), names);
    let discovery = RunDiscovery::new(
        Arc::clone(&fs),
        markers.clone(),
        cfg.watcher.watch_directory.clone(),
        cfg.watcher.ready_signal_file.clone(),
    );
    let launcher = JobLauncher::new(fs, markers, TokioSpawner, cfg.launch_settings());

    let runs: Vec<_> = discovery.scan().collect();
    println!("runs ({}):", runs.len());
    for run in runs {
        let ready = if run.ready { "" } else { " (not ready)" };
        println!("  - {} [{}]{}", run.name, run.state, ready);
        if run.is_candidate() {
            match launcher.preview(&run.path) {
                Ok(cmd) => println!("      cmd: {cmd}"),
                Err(e) => println!("      cmd: ERROR {e}"),
            }
        }
    }
    Ok(())
}
