//! TCP listener setup.
//!
//! # Responsibilities
//! - Resolve the configured host (names like `localhost` are allowed)
//! - Bind the listening socket
//! - Pace retries after failed accepts
//!
//! # Design Decisions
//! - A bind failure is fatal to the process and never retried
//! - Failed accepts (e.g. out of file descriptors) are retried after a
//!   delay that starts at 5ms and doubles up to 1s

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};

use crate::config::ServerConfig;

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

/// Bind to `host:port` from the configuration.
pub async fn bind(config: &ServerConfig) -> Result<TcpListener, ListenerError> {
    let address = config.bind_address();

    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .map_err(|source| ListenerError::Bind {
            address: address.clone(),
            source,
        })?;

    if let Ok(local_addr) = listener.local_addr() {
        tracing::debug!(address = %local_addr, "Listener bound");
    }

    Ok(listener)
}

/// Source of inbound connections for the server loop.
pub trait Accept: Send + Sync + 'static {
    /// Wait for the next connection.
    fn accept(&self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send;

    /// Address the listener is bound to.
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

impl Accept for TcpListener {
    fn accept(&self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send {
        TcpListener::accept(self)
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        TcpListener::local_addr(self)
    }
}

/// Delay before retrying a failed accept.
#[derive(Debug, Default)]
pub struct AcceptBackoff {
    delay: Option<Duration>,
}

impl AcceptBackoff {
    const INITIAL: Duration = Duration::from_millis(5);
    const MAX: Duration = Duration::from_secs(1);

    /// Delay to wait after another failure.
    pub fn next_delay(&mut self) -> Duration {
        let delay = match self.delay {
            None => Self::INITIAL,
            Some(previous) => (previous * 2).min(Self::MAX),
        };
        self.delay = Some(delay);
        delay
    }

    /// Forget past failures after a successful accept.
    pub fn reset(&mut self) {
        self.delay = None;
    }
}
