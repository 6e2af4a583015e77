// tests/real_process.rs
//
// End-to-end ticks against the real filesystem and real child processes.

#![cfg(unix)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use basecall_watch::engine::Scheduler;
use basecall_watch::exec::TokioSpawner;
use basecall_watch::fs::{FileSystem, RealFileSystem};
use basecall_watch::types::{JobOutcome, RunState};
use basecall_watch_test_utils::builders::ConfigFileBuilder;
use basecall_watch_test_utils::{init_tracing, with_timeout};

struct Dirs {
    watch: tempfile::TempDir,
    output: tempfile::TempDir,
}

impl Dirs {
    fn new() -> Self {
        Self {
            watch: tempfile::tempdir().unwrap(),
            output: tempfile::tempdir().unwrap(),
        }
    }

    fn scheduler(&self, arguments: &str, max: usize) -> Scheduler<TokioSpawner> {
        let cfg = ConfigFileBuilder::new()
            .watch_directory(self.watch.path())
            .output_base(self.output.path())
            .executable("/bin/sh")
            .arguments(arguments)
            .max_concurrent_jobs(max)
            .build();
        let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
        Scheduler::from_config(&cfg, fs, TokioSpawner)
    }

    fn add_run(&self, name: &str) -> std::path::PathBuf {
        let path = self.watch.path().join(name);
        std::fs::create_dir(&path).unwrap();
        path
    }
}

/// Tick until `run` reaches a terminal state.
async fn tick_until_done(scheduler: &mut Scheduler<TokioSpawner>, run: &Path) -> Vec<JobOutcome> {
    let mut outcomes = Vec::new();
    loop {
        let report = scheduler.tick();
        outcomes.extend(report.reaped.iter().map(|r| r.outcome));
        match scheduler.markers().get_state(run) {
            RunState::Completed | RunState::Failed => return outcomes,
            _ => tokio::time::sleep(Duration::from_millis(20)).await,
        }
    }
}

#[tokio::test]
async fn successful_process_completes_the_run() {
    init_tracing();
    let dirs = Dirs::new();
    let run_a = dirs.add_run("runA");
    let mut scheduler = dirs.scheduler("-c true {input_dir}", 1);

    let outcomes = with_timeout(tick_until_done(&mut scheduler, &run_a)).await;

    assert_eq!(outcomes, vec![JobOutcome::Success]);
    assert!(run_a.join(".completed").is_file());
    assert!(!run_a.join(".processing").exists());
    assert!(dirs.output.path().join("runA").is_dir());
    assert!(scheduler.active_jobs().is_empty());
}

#[tokio::test]
async fn non_zero_exit_fails_the_run() {
    init_tracing();
    let dirs = Dirs::new();
    let run_a = dirs.add_run("runA");
    let mut scheduler = dirs.scheduler("-c false {input_dir}", 1);

    let outcomes = with_timeout(tick_until_done(&mut scheduler, &run_a)).await;

    assert_eq!(outcomes, vec![JobOutcome::Failed(1)]);
    assert!(run_a.join(".failed").is_file());
    assert!(!run_a.join(".processing").exists());
}

#[tokio::test]
async fn run_path_with_spaces_stays_one_argument() {
    init_tracing();
    let dirs = Dirs::new();
    let run = dirs.add_run("run with spaces");
    // `test -d "$0"` only succeeds if the whole path arrived as $0.
    // `${IFS}` keeps the shell snippet a single template token.
    let mut scheduler = dirs.scheduler("-c test${{IFS}}-d${{IFS}}\"$0\" {input_dir}", 1);
    let outcomes = with_timeout(tick_until_done(&mut scheduler, &run)).await;

    assert_eq!(outcomes, vec![JobOutcome::Success]);
    assert!(dirs.output.path().join("run with spaces").is_dir());
}

#[tokio::test]
async fn processing_marker_is_visible_while_the_job_runs() {
    init_tracing();
    let dirs = Dirs::new();
    let run_a = dirs.add_run("runA");
    let mut scheduler = dirs.scheduler("-c read {input_dir}", 1);

    // stdin is /dev/null, so `read` returns at once; the marker must be there
    // right after the launching tick regardless.
    let report = scheduler.tick();
    assert_eq!(report.launched, vec![run_a.clone()]);
    assert!(run_a.join(".processing").is_file());
    assert_eq!(scheduler.active_jobs().len(), 1);

    with_timeout(tick_until_done(&mut scheduler, &run_a)).await;
}

#[tokio::test]
async fn non_utf8_run_names_reach_the_process_intact() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    init_tracing();
    let dirs = Dirs::new();
    let run_ff = dirs.watch.path().join(OsStr::from_bytes(b"run_\xff"));
    let run_fe = dirs.watch.path().join(OsStr::from_bytes(b"run_\xfe"));
    std::fs::create_dir(&run_ff).unwrap();
    std::fs::create_dir(&run_fe).unwrap();
    // Both input and output arguments must name existing directories.
    let mut scheduler = dirs.scheduler(
        "-c test${{IFS}}-d${{IFS}}\"$0\"${{IFS}}-a${{IFS}}-d${{IFS}}\"$1\" {input_dir} {output_dir}",
        2,
    );

    let mut outcomes = with_timeout(tick_until_done(&mut scheduler, &run_ff)).await;
    outcomes.extend(with_timeout(tick_until_done(&mut scheduler, &run_fe)).await);

    assert_eq!(outcomes, vec![JobOutcome::Success, JobOutcome::Success]);
    assert!(run_ff.join(".completed").is_file());
    assert!(run_fe.join(".completed").is_file());
    assert!(dirs.output.path().join(OsStr::from_bytes(b"run_\xff")).is_dir());
    assert!(dirs.output.path().join(OsStr::from_bytes(b"run_\xfe")).is_dir());
}
