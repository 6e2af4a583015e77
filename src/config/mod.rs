// src/config/mod.rs

//! Configuration loading and validation for basecall-watch.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate invariants such as non-zero limits and distinct marker names
//!   (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{
    BasecallerSection, ConfigFile, LoggingSection, RawConfigFile, StateFilesSection,
    WatcherSection,
};
