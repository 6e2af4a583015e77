// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::default_config_path;

/// Command-line arguments for `basecall-watch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "basecall-watch",
    version,
    about = "Watch a directory for sequencing runs and basecall each one as it becomes ready.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    #[arg(short, long, value_name = "PATH", default_value_os_t = default_config_path())]
    pub config: PathBuf,

    /// Run a single scheduling cycle and exit. Launched jobs keep running.
    #[arg(long)]
    pub once: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `BASECALL_WATCH_LOG` or the config file's level is used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Validate config, show run states and the command that would be used,
    /// but don't launch anything or touch any marker.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
