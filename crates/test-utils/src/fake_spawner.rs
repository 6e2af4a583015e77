use std::path::Path;
use std::sync::{Arc, Mutex};

use basecall_watch::exec::{JobProcess, LaunchCommand, ProcessSpawner};
use basecall_watch::types::JobOutcome;

/// A fake process spawner that:
/// - records every command it was asked to start
/// - hands out processes that keep "running" until the test finishes them
/// - can be told to fail spawns, like an exec error would.
///
/// Clones share state, so a test keeps one clone and gives the other to the
/// scheduler.
#[derive(Debug, Clone, Default)]
pub struct FakeSpawner {
    state: Arc<Mutex<FakeState>>,
}

#[derive(Debug, Default)]
struct FakeState {
    launches: Vec<FakeLaunch>,
    fail_spawns: bool,
    spawn_attempts: usize,
}

#[derive(Debug)]
struct FakeLaunch {
    command: LaunchCommand,
    exit: Arc<Mutex<Option<i32>>>,
}

#[derive(Debug)]
struct FakeProcess {
    pid: u32,
    exit: Arc<Mutex<Option<i32>>>,
}

impl JobProcess for FakeProcess {
    fn id(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn try_wait(&mut self) -> anyhow::Result<Option<JobOutcome>> {
        let exit = self.exit.lock().unwrap();
        Ok(exit.map(JobOutcome::from_exit_code))
    }
}

impl FakeSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent spawns fail (or succeed again).
    pub fn fail_spawns(&self, fail: bool) {
        self.state.lock().unwrap().fail_spawns = fail;
    }

    /// Commands of all successful spawns, in order.
    pub fn launches(&self) -> Vec<LaunchCommand> {
        let state = self.state.lock().unwrap();
        state.launches.iter().map(|l| l.command.clone()).collect()
    }

    pub fn spawn_attempts(&self) -> usize {
        self.state.lock().unwrap().spawn_attempts
    }

    /// Number of launched processes that have not been finished yet.
    pub fn running(&self) -> usize {
        let state = self.state.lock().unwrap();
        state
            .launches
            .iter()
            .filter(|l| l.exit.lock().unwrap().is_none())
            .count()
    }

    /// Number of successful spawns whose arguments mention `run`.
    pub fn launches_for(&self, run: &Path) -> usize {
        let needle = run.as_os_str();
        let state = self.state.lock().unwrap();
        state
            .launches
            .iter()
            .filter(|l| l.command.args.iter().any(|a| a.as_os_str() == needle))
            .count()
    }

    /// Let the still-running job for `run` exit with `code`.
    ///
    /// Returns false if no such running job exists.
    pub fn finish(&self, run: &Path, code: i32) -> bool {
        let needle = run.as_os_str();
        let state = self.state.lock().unwrap();
        for launch in state.launches.iter().rev() {
            if !launch.command.args.iter().any(|a| a.as_os_str() == needle) {
                continue;
            }
            let mut exit = launch.exit.lock().unwrap();
            if exit.is_none() {
                *exit = Some(code);
                return true;
            }
        }
        false
    }
}

impl ProcessSpawner for FakeSpawner {
    fn spawn(&mut self, command: &LaunchCommand) -> anyhow::Result<Box<dyn JobProcess>> {
        let mut state = self.state.lock().unwrap();
        state.spawn_attempts += 1;
        if state.fail_spawns {
            anyhow::bail!("fake spawn failure for {:?}", command.program);
        }

        let exit = Arc::new(Mutex::new(None));
        let pid = 1000 + state.launches.len() as u32;
        state.launches.push(FakeLaunch {
            command: command.clone(),
            exit: Arc::clone(&exit),
        });
        Ok(Box::new(FakeProcess { pid, exit }))
    }
}
