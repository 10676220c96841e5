//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the handler chain from the validated configuration
//! - Bind the listener and start the signal watcher
//! - Run the server until it has stopped
//!
//! # Design Decisions
//! - Fail fast: a bind error is returned before anything is served
//! - The listener is bound last, once everything else is ready

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::http::{HttpServer, ServerError};
use crate::lifecycle::{signals::spawn_signal_watcher, Shutdown};
use crate::net;

/// Serve `config.dir` until a shutdown signal arrives and the drain finishes.
pub async fn serve(config: ServerConfig) -> Result<(), ServerError> {
    let config = Arc::new(config);
    let server = HttpServer::new(config.clone());

    let listener = net::bind(&config).await?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let watcher = spawn_signal_watcher(shutdown);

    tracing::info!(
        "Starting server on {}, serving {:?}",
        config.bind_address(),
        config.dir
    );

    let result = server.run(listener, server_shutdown).await;
    watcher.abort();
    result?;

    tracing::info!("Server shutdown complete");
    Ok(())
}
