//! Access logging.
//!
//! # Responsibilities
//! - Time every request from arrival to the last body byte
//! - Emit exactly one access entry per request, whatever its outcome
//!
//! # Design Decisions
//! - The sink is injected ([`AccessLog`]) instead of reaching for a global
//! - Must be the outermost layer so it observes the final status and the
//!   bytes actually sent (post-compression)

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{Method, StatusCode, Version},
    middleware::Next,
    response::Response,
};

use super::compression::GzipEncoded;
use crate::http::response::{InstrumentedBody, ResponseRecord};

/// One finished request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessEntry {
    pub remote_addr: Option<SocketAddr>,
    pub method: Method,
    pub uri: String,
    pub version: Version,
    pub status: StatusCode,
    pub bytes: u64,
    pub compressed: bool,
    pub elapsed: Duration,
}

impl fmt::Display for AccessEntry {
    /// `remoteAddr - "METHOD URI PROTO" status size duration`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.remote_addr {
            Some(addr) => write!(f, "{}", addr)?,
            None => f.write_str("-")?,
        }
        write!(
            f,
            " - \"{} {} {:?}\" {} {} {:?}",
            self.method,
            self.uri,
            self.version,
            self.status.as_u16(),
            self.bytes,
            self.elapsed
        )
    }
}

/// Destination for access entries.
pub trait AccessLog: Send + Sync + 'static {
    fn record(&self, entry: AccessEntry);
}

/// Writes access entries as `tracing` events on the `xend::access` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAccessLog;

impl AccessLog for TracingAccessLog {
    fn record(&self, entry: AccessEntry) {
        tracing::info!(
            target: "xend::access",
            remote_addr = ?entry.remote_addr,
            method = %entry.method,
            uri = %entry.uri,
            status = entry.status.as_u16(),
            bytes = entry.bytes,
            compressed = entry.compressed,
            elapsed_us = entry.elapsed.as_micros() as u64,
            "{}",
            entry
        );
    }
}

/// Request data captured before the inner service runs.
struct PendingEntry {
    remote_addr: Option<SocketAddr>,
    method: Method,
    uri: String,
    version: Version,
    start: Instant,
}

impl PendingEntry {
    fn from_request(request: &Request) -> Self {
        let uri = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_owned())
            .unwrap_or_else(|| request.uri().to_string());

        Self {
            remote_addr: request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|info| info.0),
            method: request.method().clone(),
            uri,
            version: request.version(),
            start: Instant::now(),
        }
    }

    fn finish(self, record: ResponseRecord) -> AccessEntry {
        AccessEntry {
            remote_addr: self.remote_addr,
            method: self.method,
            uri: self.uri,
            version: self.version,
            status: record.status,
            bytes: record.bytes,
            compressed: record.compressed,
            elapsed: self.start.elapsed(),
        }
    }
}

/// Middleware that records one [`AccessEntry`] per request into `sink`.
///
/// The entry is emitted once the response body has been fully sent or
/// dropped, so `bytes` and `elapsed` cover the whole transfer.
pub async fn log_access(
    State(sink): State<Arc<dyn AccessLog>>,
    request: Request,
    next: Next,
) -> Response {
    let pending = PendingEntry::from_request(&request);
    let response = next.run(request).await;

    let mut record = ResponseRecord::default();
    record.record_head(
        response.status(),
        response.extensions().get::<GzipEncoded>().is_some(),
    );

    response.map(|body| {
        Body::new(InstrumentedBody::new(body, record, move |record| {
            sink.record(pending.finish(record));
        }))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body as AxumBody, middleware, routing::get, Router};
    use http_body_util::BodyExt;
    use std::sync::Mutex;
    use tower::ServiceExt;

    #[derive(Default)]
    struct Collect(Mutex<Vec<AccessEntry>>);

    impl AccessLog for Collect {
        fn record(&self, entry: AccessEntry) {
            self.0.lock().unwrap().push(entry);
        }
    }

    fn app(sink: Arc<Collect>) -> Router {
        Router::new()
            .route("/hello", get(|| async { "hello world" }))
            .layer(middleware::from_fn_with_state(
                sink as Arc<dyn AccessLog>,
                log_access,
            ))
    }

    #[tokio::test]
    async fn records_status_and_size() {
        let sink = Arc::new(Collect::default());
        let mut request = Request::builder()
            .uri("/hello?x=1")
            .body(AxumBody::empty())
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4242))));

        let response = app(sink.clone()).oneshot(request).await.unwrap();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"hello world");

        let entries = sink.0.lock().unwrap();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.status, StatusCode::OK);
        assert_eq!(entry.bytes, 11);
        assert_eq!(entry.uri, "/hello?x=1");
        assert_eq!(entry.method, Method::GET);
        assert!(!entry.compressed);
        assert!(entry.to_string().starts_with("127.0.0.1:4242 - \"GET /hello?x=1 HTTP/1.1\" 200 11 "));
    }

    #[tokio::test]
    async fn records_not_found() {
        let sink = Arc::new(Collect::default());
        let response = app(sink.clone())
            .oneshot(Request::builder().uri("/missing").body(AxumBody::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        drop(response);

        let entries = sink.0.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, StatusCode::NOT_FOUND);
        assert_eq!(entries[0].remote_addr, None);
        assert!(entries[0].to_string().starts_with("- - \"GET /missing"));
    }

    #[test]
    fn display_matches_access_format() {
        let entry = AccessEntry {
            remote_addr: Some(SocketAddr::from(([10, 0, 0, 7], 51000))),
            method: Method::HEAD,
            uri: "/index.html".into(),
            version: Version::HTTP_11,
            status: StatusCode::NOT_MODIFIED,
            bytes: 0,
            compressed: false,
            elapsed: Duration::from_millis(3),
        };
        assert_eq!(
            entry.to_string(),
            "10.0.0.7:51000 - \"HEAD /index.html HTTP/1.1\" 304 0 3ms"
        );
    }
}
