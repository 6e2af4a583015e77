// src/engine/shutdown.rs

//! Cooperative shutdown.
//!
//! Signal handlers only flip a [`ShutdownToken`]; the runtime polls it at the
//! top of every tick and between one-second sleep slices. A second signal
//! while shutdown is already pending exits the process immediately.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Cloneable cancellation flag shared between the signal listener and the
/// runtime loop.
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken {
    requested: Arc<AtomicBool>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown. Returns `true` if this was the first request.
    pub fn request(&self) -> bool {
        !self.requested.swap(true, Ordering::SeqCst)
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

/// Listen for SIGINT (Ctrl-C) and, on Unix, SIGTERM.
///
/// The first signal requests a graceful stop; the second one forces exit
/// with status 1.
pub fn spawn_signal_listener(token: ShutdownToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = listen_for_signals(token).await {
            error!(error = %e, "failed to listen for shutdown signals");
        }
    })
}

async fn listen_for_signals(token: ShutdownToken) -> std::io::Result<()> {
    #[cfg(unix)]
    let mut terminate =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    loop {
        #[cfg(unix)]
        let name = tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res?;
                "SIGINT"
            }
            _ = terminate.recv() => "SIGTERM",
        };

        #[cfg(not(unix))]
        let name = {
            tokio::signal::ctrl_c().await?;
            "Ctrl-C"
        };

        if token.request() {
            info!(signal = name, "shutdown signal received; stopping new job launches");
        } else {
            warn!(signal = name, "multiple shutdown signals received; forcing exit");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_first_request_reports_true() {
        let token = ShutdownToken::new();
        let clone = token.clone();
        assert!(!token.is_requested());

        assert!(clone.request());
        assert!(!token.request());
        assert!(token.is_requested());
    }
}
