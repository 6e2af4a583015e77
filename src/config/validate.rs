// src/config/validate.rs

use std::collections::HashSet;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{BasecallError, Result};
use crate::exec::template::ArgTemplate;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::BasecallError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        let template = parse_template(&raw)?;
        Ok(ConfigFile::new_unchecked(raw, template))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_required_paths(cfg)?;
    validate_intervals(cfg)?;
    validate_file_names(cfg)?;
    Ok(())
}

fn config_error(msg: impl Into<String>) -> BasecallError {
    BasecallError::ConfigError(msg.into())
}

fn validate_required_paths(cfg: &RawConfigFile) -> Result<()> {
    let required = [
        ("[watcher].watch_directory", cfg.watcher.watch_directory.as_os_str()),
        ("[basecaller].executable", cfg.basecaller.executable.as_os_str()),
        (
            "[basecaller].output_base_directory",
            cfg.basecaller.output_base_directory.as_os_str(),
        ),
        ("[basecaller].config", cfg.basecaller.config.as_os_str()),
    ];
    for (key, value) in required {
        if value.is_empty() {
            return Err(config_error(format!("{key} must not be empty")));
        }
    }

    if cfg.basecaller.arguments.trim().is_empty() {
        return Err(config_error("[basecaller].arguments must not be empty"));
    }
    Ok(())
}

fn validate_intervals(cfg: &RawConfigFile) -> Result<()> {
    if cfg.watcher.check_interval == 0 {
        return Err(config_error("[watcher].check_interval must be >= 1 (got 0)"));
    }
    if cfg.basecaller.max_concurrent_jobs == 0 {
        return Err(config_error(
            "[basecaller].max_concurrent_jobs must be >= 1 (got 0)",
        ));
    }
    Ok(())
}

/// Marker and ready-signal names must be plain, distinct file names.
fn validate_file_names(cfg: &RawConfigFile) -> Result<()> {
    let mut names = vec![
        ("[state_files].processing", cfg.state_files.processing.as_str()),
        ("[state_files].completed", cfg.state_files.completed.as_str()),
        ("[state_files].failed", cfg.state_files.failed.as_str()),
    ];
    if let Some(ref signal) = cfg.watcher.ready_signal_file {
        names.push(("[watcher].ready_signal_file", signal.as_str()));
    }
    if let Some(ref log_dir) = cfg.logging.log_directory {
        if log_dir.as_os_str().is_empty() {
            return Err(config_error("[logging].log_directory must not be empty"));
        }
        names.push(("[logging].log_file", cfg.logging.log_file.as_str()));
    }

    let mut seen = HashSet::new();
    for (key, name) in names {
        if name.trim().is_empty() || name == "." || name == ".." {
            return Err(config_error(format!("{key} must be a file name (got {name:?})")));
        }
        if name.contains('/') || name.contains('\\') {
            return Err(config_error(format!(
                "{key} must be a bare file name without path separators (got {name:?})"
            )));
        }
        if key != "[logging].log_file" && !seen.insert(name) {
            return Err(config_error(format!(
                "{key} reuses file name {name:?}; marker and ready-signal names must be distinct"
            )));
        }
    }
    Ok(())
}

fn parse_template(cfg: &RawConfigFile) -> Result<ArgTemplate> {
    ArgTemplate::parse(&cfg.basecaller.arguments)
        .map_err(|e| config_error(format!("[basecaller].arguments: {e}")))
}
