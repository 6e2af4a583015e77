// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::exec::launcher::LaunchSettings;
use crate::exec::template::ArgTemplate;
use crate::state::MarkerNames;
use crate::types::ConfigLogLevel;

/// Configuration exactly as deserialized from TOML, before validation.
///
/// ```toml
/// [watcher]
/// watch_directory = "/data/runs"
/// check_interval = 60
/// ready_signal_file = "READY"
///
/// [basecaller]
/// executable = "/opt/dorado/bin/dorado"
/// output_base_directory = "/data/basecalled"
/// config = "/opt/dorado/models/hac.cfg"
/// arguments = "basecaller {config_path} {input_dir} --output-dir {output_dir}"
/// max_concurrent_jobs = 2
///
/// [logging]
/// log_directory = "/var/log/basecall-watch"
/// log_level = "info"
///
/// [state_files]
/// processing = ".processing"
/// completed = ".completed"
/// failed = ".failed"
/// ```
///
/// `[watcher]` and `[basecaller]` are required; `[logging]` and
/// `[state_files]` fall back to defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    pub watcher: WatcherSection,
    pub basecaller: BasecallerSection,
    #[serde(default)]
    pub logging: LoggingSection,
    #[serde(default)]
    pub state_files: StateFilesSection,
}

/// `[watcher]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatcherSection {
    /// Directory whose immediate subdirectories are runs.
    pub watch_directory: PathBuf,

    /// Seconds between scheduler ticks.
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,

    /// File that must exist inside a run directory before it is launched.
    #[serde(default)]
    pub ready_signal_file: Option<String>,
}

fn default_check_interval() -> u64 {
    60
}

/// `[basecaller]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BasecallerSection {
    pub executable: PathBuf,
    pub output_base_directory: PathBuf,
    /// Basecaller configuration file, substituted for `{config_path}`.
    pub config: PathBuf,
    /// Argument template with `{input_dir}`, `{output_dir}`, `{config_path}`.
    pub arguments: String,
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
}

fn default_max_concurrent_jobs() -> usize {
    1
}

/// `[logging]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    /// When set, logs are also appended to `<log_directory>/<log_file>`.
    #[serde(default)]
    pub log_directory: Option<PathBuf>,
    #[serde(default = "default_log_file")]
    pub log_file: String,
    #[serde(default)]
    pub log_level: ConfigLogLevel,
}

fn default_log_file() -> String {
    "basecall-watch.log".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            log_directory: None,
            log_file: default_log_file(),
            log_level: ConfigLogLevel::default(),
        }
    }
}

impl LoggingSection {
    pub fn log_path(&self) -> Option<PathBuf> {
        self.log_directory
            .as_ref()
            .map(|dir| dir.join(&self.log_file))
    }
}

/// `[state_files]` section: marker file names.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateFilesSection {
    #[serde(default = "default_processing")]
    pub processing: String,
    #[serde(default = "default_completed")]
    pub completed: String,
    #[serde(default = "default_failed")]
    pub failed: String,
}

fn default_processing() -> String {
    MarkerNames::default().processing
}

fn default_completed() -> String {
    MarkerNames::default().completed
}

fn default_failed() -> String {
    MarkerNames::default().failed
}

impl Default for StateFilesSection {
    fn default() -> Self {
        let names = MarkerNames::default();
        Self {
            processing: names.processing,
            completed: names.completed,
            failed: names.failed,
        }
    }
}

impl From<&StateFilesSection> for MarkerNames {
    fn from(s: &StateFilesSection) -> Self {
        MarkerNames {
            processing: s.processing.clone(),
            completed: s.completed.clone(),
            failed: s.failed.clone(),
        }
    }
}

/// Validated configuration.
///
/// Only obtainable through `ConfigFile::try_from(RawConfigFile)`, so holding
/// one means the invariants in `validate.rs` were checked and the argument
/// template parsed.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub watcher: WatcherSection,
    pub basecaller: BasecallerSection,
    pub logging: LoggingSection,
    pub state_files: StateFilesSection,
    template: ArgTemplate,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile, template: ArgTemplate) -> Self {
        Self {
            watcher: raw.watcher,
            basecaller: raw.basecaller,
            logging: raw.logging,
            state_files: raw.state_files,
            template,
        }
    }

    pub fn template(&self) -> &ArgTemplate {
        &self.template
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.watcher.check_interval)
    }

    pub fn marker_names(&self) -> MarkerNames {
        MarkerNames::from(&self.state_files)
    }

    pub fn launch_settings(&self) -> LaunchSettings {
        LaunchSettings {
            executable: self.basecaller.executable.clone(),
            output_base: self.basecaller.output_base_directory.clone(),
            basecaller_config: self.basecaller.config.clone(),
            template: self.template.clone(),
        }
    }
}
