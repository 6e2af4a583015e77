use std::fmt;

use serde::Deserialize;

/// Lifecycle state of a run directory, reconstructed from its marker files.
///
/// The on-disk markers are the only source of truth; nothing in memory is
/// allowed to override what this enum reports for a given directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    /// Directory exists and carries no marker.
    Pending,
    Processing,
    Completed,
    Failed,
    /// Path is missing or not a directory.
    Unknown,
}

impl RunState {
    pub fn as_str(self) -> &'static str {
        match self {
            RunState::Pending => "pending",
            RunState::Processing => "processing",
            RunState::Completed => "completed",
            RunState::Failed => "failed",
            RunState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a finished basecaller process.
///
/// Exit code zero is the only success signal; a process killed by a signal
/// has no exit code and is reported as `Failed(-1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Success,
    Failed(i32),
}

impl JobOutcome {
    pub fn from_exit_code(code: i32) -> Self {
        if code == 0 {
            JobOutcome::Success
        } else {
            JobOutcome::Failed(code)
        }
    }
}

/// Log level as written in the `[logging]` section of the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigLogLevel {
    Error,
    #[serde(alias = "warning")]
    Warn,
    Info,
    Debug,
    Trace,
}

impl Default for ConfigLogLevel {
    fn default() -> Self {
        ConfigLogLevel::Info
    }
}

impl From<ConfigLogLevel> for tracing::Level {
    fn from(lvl: ConfigLogLevel) -> Self {
        match lvl {
            ConfigLogLevel::Error => tracing::Level::ERROR,
            ConfigLogLevel::Warn => tracing::Level::WARN,
            ConfigLogLevel::Info => tracing::Level::INFO,
            ConfigLogLevel::Debug => tracing::Level::DEBUG,
            ConfigLogLevel::Trace => tracing::Level::TRACE,
        }
    }
}
