// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`template`] turns the configured argument template into an argument
//!   list for one run.
//! - [`process`] provides the `ProcessSpawner` / `JobProcess` traits and the
//!   `tokio::process` backed implementation used in production; tests swap
//!   in a fake spawner.
//! - [`launcher`] performs the launch preconditions, marker transitions and
//!   spawn for one run.
//! - [`tracker`] is the in-memory table of running jobs, polled every tick.

pub mod launcher;
pub mod process;
pub mod template;
pub mod tracker;

pub use launcher::{JobLauncher, LaunchError, LaunchSettings, LaunchedJob};
pub use process::{JobProcess, LaunchCommand, ProcessSpawner, TokioSpawner};
pub use tracker::{ActiveJob, ActiveJobTable, ReapedJob};
