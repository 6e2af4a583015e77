// src/exec/process.rs

//! Pluggable process abstraction.
//!
//! The launcher talks to a [`ProcessSpawner`] instead of `tokio::process`
//! directly. Production code uses [`TokioSpawner`]; tests provide a fake that
//! records launches and lets the test decide when each job "exits".

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use anyhow::{Context, Result};
use tokio::process::{Child, Command};

use crate::types::JobOutcome;

/// Fully resolved command line for one basecaller job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl fmt::Display for LaunchCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// A running (or finished) job process.
pub trait JobProcess: Send + fmt::Debug {
    /// OS process identifier, if known.
    fn id(&self) -> Option<u32>;

    /// Non-blocking exit check: `None` while the process is still running.
    fn try_wait(&mut self) -> Result<Option<JobOutcome>>;
}

/// Trait abstracting how job processes are started.
pub trait ProcessSpawner: Send {
    /// Start `command` without waiting for it.
    fn spawn(&mut self, command: &LaunchCommand) -> Result<Box<dyn JobProcess>>;
}

/// Real spawner backed by `tokio::process`.
///
/// Children get null stdio and, on Unix, a process group of their own, so
/// they keep running after the scheduler exits or receives Ctrl-C. They are
/// never killed on drop.
///
/// Must be used from within a Tokio runtime.
#[derive(Debug, Clone, Default)]
pub struct TokioSpawner;

impl ProcessSpawner for TokioSpawner {
    fn spawn(&mut self, command: &LaunchCommand) -> Result<Box<dyn JobProcess>> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(false);

        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd
            .spawn()
            .with_context(|| format!("spawning {:?}", command.program))?;

        Ok(Box::new(TokioJob { child }))
    }
}

#[derive(Debug)]
struct TokioJob {
    child: Child,
}

impl JobProcess for TokioJob {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    fn try_wait(&mut self) -> Result<Option<JobOutcome>> {
        let status = self.child.try_wait().context("polling child process")?;
        Ok(status.map(outcome_from_status))
    }
}

fn outcome_from_status(status: ExitStatus) -> JobOutcome {
    match status.code() {
        Some(code) => JobOutcome::from_exit_code(code),
        None => {
            #[cfg(unix)]
            {
                use std::os::unix::process::ExitStatusExt;
                tracing::debug!(signal = ?status.signal(), "job process terminated by signal");
            }
            JobOutcome::Failed(-1)
        }
    }
}
