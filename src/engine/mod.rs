// src/engine/mod.rs

//! Orchestration engine for basecall-watch.
//!
//! The synchronous per-tick scheduler lives in [`core`]; the async shell that
//! sleeps between ticks and honours shutdown requests is implemented in
//! [`runtime`]; [`shutdown`] holds the cancellation token and the signal
//! listener that sets it.

pub mod core;
pub mod runtime;
pub mod shutdown;

pub use core::{Scheduler, TickReport};
pub use runtime::{Runtime, RuntimeOptions};
pub use shutdown::{spawn_signal_listener, ShutdownToken};
