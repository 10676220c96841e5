//! Request middleware.
//!
//! # Data Flow
//! ```text
//! Request
//!     → access_log.rs (start timer, instrument the body)
//!     → security::hidden_path (404 for dot-prefixed segments)
//!     → compression.rs (gzip the body if the client accepts it)
//!     → file handler
//! ```
//!
//! # Design Decisions
//! - The order is fixed: logging sees final outcomes, the hidden-path check
//!   runs before any file system access, and compression wraps the body
//!   before the file handler produces it

pub mod access_log;
pub mod compression;

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::Request,
    middleware::{from_fn, from_fn_with_state},
    response::IntoResponse,
    Router,
};
use tower::{Service, ServiceBuilder};

use crate::security::hidden_path::reject_hidden_paths;

pub use access_log::{log_access, AccessEntry, AccessLog, TracingAccessLog};
pub use compression::{gzip_responses, GzipBody, GzipEncoded};

/// Wrap `handler` in the full middleware chain.
///
/// Outside in: access log, hidden-path rejection, gzip compression.
pub fn compose<H>(handler: H, access_log: Arc<dyn AccessLog>) -> Router
where
    H: Service<Request, Error = Infallible> + Clone + Send + Sync + 'static,
    H::Response: IntoResponse,
    H::Future: Send + 'static,
{
    Router::new().fallback_service(handler).layer(
        ServiceBuilder::new()
            .layer(from_fn_with_state(access_log, log_access))
            .layer(from_fn(reject_hidden_paths))
            .layer(from_fn(gzip_responses)),
    )
}
