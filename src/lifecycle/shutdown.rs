//! Shutdown coordination.
//!
//! The first trigger asks the server to drain; a second trigger while it is
//! draining asks it to close the remaining connections immediately.

use tokio::sync::broadcast::{self, error::RecvError};

/// Coordinator for graceful shutdown.
///
/// Cloning shares the same channel, so any clone may trigger.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(2);
        Self { tx }
    }

    /// Subscribe to shutdown triggers.
    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.tx.subscribe(),
        }
    }

    /// Trigger shutdown (or escalate one already in progress).
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving half handed to the server.
#[derive(Debug)]
pub struct ShutdownListener {
    rx: broadcast::Receiver<()>,
}

impl ShutdownListener {
    /// Resolves on the first trigger.
    ///
    /// Also resolves if every [`Shutdown`] handle is gone, since nothing could
    /// stop the server after that.
    pub async fn requested(&mut self) {
        let _ = self.rx.recv().await;
    }

    /// Resolves on the next trigger after [`requested`](Self::requested).
    ///
    /// Never resolves if every [`Shutdown`] handle is gone.
    pub async fn escalated(&mut self) {
        match self.rx.recv().await {
            Ok(()) | Err(RecvError::Lagged(_)) => {}
            Err(RecvError::Closed) => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn trigger_then_escalate() {
        let shutdown = Shutdown::new();
        let mut listener = shutdown.subscribe();

        shutdown.trigger();
        listener.requested().await;

        shutdown.clone().trigger();
        tokio::time::timeout(Duration::from_secs(1), listener.escalated())
            .await
            .expect("second trigger escalates");
    }

    #[tokio::test]
    async fn dropped_coordinator_requests_but_never_escalates() {
        let shutdown = Shutdown::new();
        let mut listener = shutdown.subscribe();
        drop(shutdown);

        listener.requested().await;
        let escalated = tokio::time::timeout(Duration::from_millis(50), listener.escalated()).await;
        assert!(escalated.is_err());
    }
}
