//! OS signal handling.
//!
//! # Responsibilities
//! - Listen for SIGINT and SIGTERM (Ctrl+C only on non-unix targets)
//! - First signal starts a graceful shutdown, a second one forces it
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Runs on its own task so the accept loop never polls signals itself

use tokio::task::JoinHandle;

use crate::lifecycle::Shutdown;

/// Spawn the task that turns OS signals into shutdown triggers.
pub fn spawn_signal_watcher(shutdown: Shutdown) -> JoinHandle<()> {
    tokio::spawn(watch(Signals::new(), shutdown))
}

async fn watch(signals: std::io::Result<Signals>, shutdown: Shutdown) {
    let mut signals = match signals {
        Ok(signals) => signals,
        Err(err) => {
            // Holding on to `shutdown` keeps the server running.
            tracing::error!(error = %err, "Failed to install signal handlers");
            return std::future::pending().await;
        }
    };

    let name = signals.recv().await;
    tracing::info!(signal = name, "Shutdown signal received");
    shutdown.trigger();

    let name = signals.recv().await;
    tracing::warn!(signal = name, "Second shutdown signal received, forcing shutdown");
    shutdown.trigger();
}

struct Signals {
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl Signals {
    fn new() -> std::io::Result<Self> {
        Ok(Self {
            #[cfg(unix)]
            terminate: tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?,
        })
    }

    /// Wait for the next signal and return its name.
    #[cfg(unix)]
    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = ctrl_c() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
        }
    }

    /// Wait for the next signal and return its name.
    #[cfg(not(unix))]
    async fn recv(&mut self) -> &'static str {
        ctrl_c().await;
        "ctrl-c"
    }
}

async fn ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}
