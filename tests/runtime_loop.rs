// tests/runtime_loop.rs

use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use basecall_watch::engine::{Runtime, RuntimeOptions, Scheduler, ShutdownToken};
use basecall_watch::exec::{JobProcess, LaunchCommand, ProcessSpawner};
use basecall_watch::fs::FileSystem;
use basecall_watch::types::RunState;
use basecall_watch_test_utils::builders::{mock_fs_for, ConfigFileBuilder, Harness};
use basecall_watch_test_utils::fake_spawner::FakeSpawner;
use basecall_watch_test_utils::{init_tracing, with_timeout};

#[tokio::test]
async fn once_runs_a_single_tick() {
    init_tracing();
    let cfg = ConfigFileBuilder::new().max_concurrent_jobs(2).build();
    let h = Harness::new(&cfg);
    let run_a = h.add_run("runA");
    let Harness {
        fs: _fs,
        spawner,
        scheduler,
        ..
    } = h;
    let markers = scheduler.markers().clone();

    let runtime = Runtime::new(
        scheduler,
        ShutdownToken::new(),
        RuntimeOptions {
            check_interval: Duration::from_secs(3600),
            exit_after_one_tick: true,
        },
    );
    with_timeout(runtime.run()).await.unwrap();

    assert_eq!(spawner.spawn_attempts(), 1);
    assert_eq!(markers.get_state(&run_a), RunState::Processing);
    // Leaving the loop does not touch running jobs.
    assert_eq!(spawner.running(), 1);
}

#[tokio::test]
async fn shutdown_before_start_runs_no_tick() {
    init_tracing();
    let cfg = ConfigFileBuilder::new().build();
    let h = Harness::new(&cfg);
    h.add_run("runA");
    let spawner = h.spawner.clone();

    let shutdown = ShutdownToken::new();
    assert!(shutdown.request());

    let runtime = Runtime::new(
        h.scheduler,
        shutdown,
        RuntimeOptions {
            check_interval: Duration::from_secs(1),
            exit_after_one_tick: false,
        },
    );
    with_timeout(runtime.run()).await.unwrap();

    assert_eq!(spawner.spawn_attempts(), 0);
}

#[tokio::test]
async fn shutdown_interrupts_a_long_sleep() {
    init_tracing();
    let cfg = ConfigFileBuilder::new().build();
    let h = Harness::new(&cfg);
    h.add_run("runA");
    let spawner = h.spawner.clone();

    let shutdown = ShutdownToken::new();
    let runtime = Runtime::new(
        h.scheduler,
        shutdown.clone(),
        RuntimeOptions {
            check_interval: Duration::from_secs(600),
            exit_after_one_tick: false,
        },
    );
    let handle = tokio::spawn(runtime.run());

    tokio::time::sleep(Duration::from_millis(200)).await;
    let started = Instant::now();
    shutdown.request();

    let result = tokio::time::timeout(Duration::from_secs(3), handle)
        .await
        .expect("runtime did not notice shutdown while sleeping");
    result.unwrap().unwrap();

    assert!(started.elapsed() < Duration::from_millis(2500));
    assert_eq!(spawner.spawn_attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn ticks_repeat_on_the_check_interval() {
    init_tracing();
    let cfg = ConfigFileBuilder::new().build();
    let h = Harness::new(&cfg);
    let run_a = h.add_run("runA");
    let run_b = h.add_run("runB");
    let spawner = h.spawner.clone();
    let markers = h.scheduler.markers().clone();

    let shutdown = ShutdownToken::new();
    let runtime = Runtime::new(
        h.scheduler,
        shutdown.clone(),
        RuntimeOptions {
            check_interval: Duration::from_secs(5),
            exit_after_one_tick: false,
        },
    );
    let handle = tokio::spawn(runtime.run());

    // First tick admits runA only (cap 1).
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(spawner.spawn_attempts(), 1);

    spawner.finish(&run_a, 0);
    tokio::time::sleep(Duration::from_secs(6)).await;

    assert_eq!(markers.get_state(&run_a), RunState::Completed);
    assert_eq!(markers.get_state(&run_b), RunState::Processing);

    shutdown.request();
    handle.await.unwrap().unwrap();
}

/// Wraps the fake spawner and records which thread each spawn ran on.
#[derive(Debug, Clone, Default)]
struct ThreadRecordingSpawner {
    inner: FakeSpawner,
    threads: Arc<Mutex<Vec<ThreadId>>>,
}

impl ProcessSpawner for ThreadRecordingSpawner {
    fn spawn(&mut self, command: &LaunchCommand) -> anyhow::Result<Box<dyn JobProcess>> {
        self.threads.lock().unwrap().push(thread::current().id());
        self.inner.spawn(command)
    }
}

#[tokio::test]
async fn ticks_run_off_the_async_thread() {
    init_tracing();
    let cfg = ConfigFileBuilder::new().build();
    let fs = mock_fs_for(&cfg);
    fs.add_dir(cfg.watcher.watch_directory.join("runA"));
    let spawner = ThreadRecordingSpawner::default();
    let threads = Arc::clone(&spawner.threads);

    let shared: Arc<dyn FileSystem> = Arc::new(fs);
    let scheduler = Scheduler::from_config(&cfg, shared, spawner);
    let runtime = Runtime::new(
        scheduler,
        ShutdownToken::new(),
        RuntimeOptions {
            check_interval: Duration::from_secs(1),
            exit_after_one_tick: true,
        },
    );
    with_timeout(runtime.run()).await.unwrap();

    let threads = threads.lock().unwrap();
    assert_eq!(threads.len(), 1);
    // The current-thread test runtime polls everything on this thread.
    assert_ne!(threads[0], thread::current().id());
}
