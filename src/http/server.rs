//! HTTP server setup and connection loop.
//!
//! # Responsibilities
//! - Build the application: file handler wrapped in the middleware chain
//! - Accept connections and serve each one on its own task (HTTP/1.1)
//! - Attach the peer address to every request for the access log
//! - On shutdown: stop accepting, drain in-flight requests for a bounded
//!   grace period, then close whatever is left
//!
//! # Design Decisions
//! - Connections are spawned into a `JoinSet` so the forced close can
//!   abort them all at once
//! - Failed accepts back off before retrying instead of spinning
//! - Draining uses hyper's per-connection graceful shutdown: idle
//!   keep-alive connections close at once, busy ones after their response

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request},
    Router,
};
use hyper::{body::Incoming, server::conn::http1};
use hyper_util::{rt::TokioIo, server::graceful::GracefulShutdown, service::TowerToHyperService};
use tokio::net::TcpStream;
use tokio::task::JoinSet;
use tower::ServiceExt;

use crate::config::ServerConfig;
use crate::http::files::file_service;
use crate::http::middleware::{compose, AccessLog, TracingAccessLog};
use crate::lifecycle::ShutdownListener;
use crate::net::{Accept, AcceptBackoff, ConnectionTracker, ListenerError};

/// Error type for the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Listener(#[from] ListenerError),
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP server for one directory.
pub struct HttpServer {
    app: Router,
    config: Arc<ServerConfig>,
    connections: ConnectionTracker,
}

impl HttpServer {
    /// Serve `config.dir`, logging requests through `tracing`.
    pub fn new(config: Arc<ServerConfig>) -> Self {
        Self::with_access_log(config, Arc::new(TracingAccessLog))
    }

    /// Serve `config.dir`, sending access entries to `access_log`.
    pub fn with_access_log(config: Arc<ServerConfig>, access_log: Arc<dyn AccessLog>) -> Self {
        let app = compose(file_service(&config.dir), access_log);
        Self::with_app(config, app)
    }

    /// Serve an already composed application.
    pub fn with_app(config: Arc<ServerConfig>, app: Router) -> Self {
        Self {
            app,
            config,
            connections: ConnectionTracker::new(),
        }
    }

    /// Accept connections until `shutdown` fires, then drain and stop.
    pub async fn run<L: Accept>(
        self,
        listener: L,
        mut shutdown: ShutdownListener,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server listening");

        let graceful = GracefulShutdown::new();
        let mut tasks = JoinSet::new();
        let mut backoff = AcceptBackoff::default();

        loop {
            tokio::select! {
                _ = shutdown.requested() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        backoff.reset();
                        self.spawn_connection(&mut tasks, &graceful, stream, peer);
                    }
                    Err(err) => {
                        let delay = backoff.next_delay();
                        tracing::warn!(
                            error = %err,
                            retry_in_ms = delay.as_millis() as u64,
                            "Failed to accept connection"
                        );
                        tokio::select! {
                            _ = shutdown.requested() => break,
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                },
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        // Stop accepting before draining.
        drop(listener);

        let grace = Duration::from_secs(self.config.shutdown_grace_secs);
        tracing::info!(
            open_connections = self.connections.open_connections(),
            grace_secs = grace.as_secs(),
            "shutting down gracefully, press Ctrl+C again to force"
        );

        tokio::select! {
            _ = graceful.shutdown() => {
                tracing::debug!("All connections drained");
            }
            _ = tokio::time::sleep(grace) => {
                tracing::warn!(
                    open_connections = self.connections.open_connections(),
                    "Server forced to shutdown: grace period elapsed"
                );
            }
            _ = shutdown.escalated() => {
                tracing::warn!(
                    open_connections = self.connections.open_connections(),
                    "Server forced to shutdown: second signal"
                );
            }
        }

        tasks.abort_all();
        while tasks.join_next().await.is_some() {}

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    fn spawn_connection(
        &self,
        tasks: &mut JoinSet<()>,
        graceful: &GracefulShutdown,
        stream: TcpStream,
        peer: SocketAddr,
    ) {
        let guard = self.connections.track();
        tracing::debug!(connection_id = %guard.id(), peer_addr = %peer, "Connection accepted");

        let service = self
            .app
            .clone()
            .map_request(move |mut request: Request<Incoming>| {
                request.extensions_mut().insert(ConnectInfo(peer));
                request
            });

        let connection = http1::Builder::new()
            .serve_connection(TokioIo::new(stream), TowerToHyperService::new(service));
        let connection = graceful.watch(connection);

        tasks.spawn(async move {
            if let Err(err) = connection.await {
                tracing::debug!(connection_id = %guard.id(), error = %err, "Connection error");
            }
            drop(guard);
        });
    }
}
