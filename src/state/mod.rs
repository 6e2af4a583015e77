// src/state/mod.rs

//! On-disk lifecycle state for run directories.
//!
//! Each run carries at most one zero-byte marker file (`processing`,
//! `completed` or `failed`); no marker on an existing directory means the run
//! is pending. [`markers::MarkerStore`] is the only code that reads or writes
//! those markers.

pub mod markers;

pub use markers::{MarkerNames, MarkerStore};
