//! Hidden path rejection.
//!
//! # Responsibilities
//! - Classify URL paths that contain a dot-prefixed segment
//! - Reject such requests before any file system access
//!
//! # Design Decisions
//! - Both the raw and the percent-decoded path are checked, since the file
//!   handler decodes escapes before resolving against the served root
//! - Rejections look exactly like a missing file (404), nothing is leaked

use axum::{
    extract::Request,
    middleware::Next,
    response::Response,
};
use percent_encoding::percent_decode_str;

use crate::http::response::not_found;

/// Returns true if any `/`-delimited segment of `path` begins with a dot.
///
/// A single leading separator is ignored, as are empty segments produced by
/// repeated separators.
pub fn is_hidden_path(path: &str) -> bool {
    let path = path.strip_prefix('/').unwrap_or(path);

    path.split('/')
        .filter(|segment| !segment.is_empty())
        .any(|segment| segment.starts_with('.'))
}

/// Middleware that answers `404 page not found` for hidden paths and never
/// calls the inner service for them.
pub async fn reject_hidden_paths(request: Request, next: Next) -> Response {
    if request_targets_hidden_path(&request) {
        tracing::debug!(path = %request.uri().path(), "Rejected hidden path");
        return not_found();
    }

    next.run(request).await
}

fn request_targets_hidden_path(request: &Request) -> bool {
    let path = request.uri().path();
    is_hidden_path(path) || is_hidden_path(&percent_decode_str(path).decode_utf8_lossy())
}
