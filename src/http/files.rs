//! Static file handler.
//!
//! # Responsibilities
//! - Serve files under the configured root (delegated to `ServeDir`)
//! - List directories that have no `index.html`
//! - Answer `404 page not found` for everything else
//!
//! # Design Decisions
//! - `ServeDir` owns MIME detection, ranges, conditional requests and the
//!   trailing-slash redirect for directories
//! - The listing fallback re-validates the path itself since it is also
//!   called for paths `ServeDir` refused
//! - Hidden entries are left out of listings; the security layer would
//!   refuse them anyway

use std::convert::Infallible;
use std::fmt::Write as _;
use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::{IntoResponse, Response},
};
use html_escape::{encode_double_quoted_attribute, encode_text};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use tower::Service;
use tower_http::services::ServeDir;

use crate::http::response::not_found;

type ListingFuture = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

/// Characters escaped in listing links.
const HREF: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// File handler rooted at `root`.
pub fn file_service(root: impl AsRef<Path>) -> ServeDir<DirectoryListing> {
    let root = root.as_ref();
    ServeDir::new(root)
        .append_index_html_on_directories(true)
        .fallback(DirectoryListing::new(root))
}

/// Fallback that renders an HTML index for directories.
#[derive(Debug, Clone)]
pub struct DirectoryListing {
    root: Arc<PathBuf>,
}

impl DirectoryListing {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Arc::new(root.into()),
        }
    }

    /// Resolve a request path to a location under the root.
    ///
    /// Returns `None` for anything that is not a plain relative path.
    pub fn resolve(&self, uri_path: &str) -> Option<PathBuf> {
        let decoded = percent_decode_str(uri_path).decode_utf8().ok()?;
        let relative = decoded.trim_start_matches('/');

        let mut resolved = self.root.as_ref().clone();
        for component in Path::new(relative).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(resolved)
    }

    async fn respond(self, method: Method, uri_path: String) -> Response {
        if method != Method::GET && method != Method::HEAD {
            return not_found();
        }
        // ServeDir redirects directories without a trailing slash first.
        if !uri_path.ends_with('/') {
            return not_found();
        }
        let Some(dir) = self.resolve(&uri_path) else {
            return not_found();
        };

        match read_entries(&dir).await {
            Ok(entries) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                render_listing(&entries),
            )
                .into_response(),
            Err(err) => {
                tracing::debug!(path = %dir.display(), error = %err, "Directory listing unavailable");
                not_found()
            }
        }
    }
}

impl<ReqBody> Service<Request<ReqBody>> for DirectoryListing
where
    ReqBody: Send + 'static,
{
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = ListingFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let listing = self.clone();
        let method = request.method().clone();
        let uri_path = request.uri().path().to_owned();
        Box::pin(async move { Ok(listing.respond(method, uri_path).await) })
    }
}

/// A directory entry as shown in a listing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ListingEntry {
    pub name: String,
    pub is_dir: bool,
}

async fn read_entries(dir: &Path) -> std::io::Result<Vec<ListingEntry>> {
    let mut read_dir = tokio::fs::read_dir(dir).await?;
    let mut entries = Vec::new();

    while let Some(entry) = read_dir.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
        entries.push(ListingEntry { name, is_dir });
    }

    entries.sort();
    Ok(entries)
}

/// Render entries as the HTML index page.
pub fn render_listing(entries: &[ListingEntry]) -> String {
    let mut html = String::from(
        "<!doctype html>\n<meta name=\"viewport\" content=\"width=device-width\">\n<pre>\n",
    );
    for entry in entries {
        let mut name = entry.name.clone();
        if entry.is_dir {
            name.push('/');
        }
        let _ = writeln!(
            html,
            "<a href=\"{}\">{}</a>",
            encode_double_quoted_attribute(&utf8_percent_encode(&name, HREF).to_string()),
            encode_text(&name)
        );
    }
    html.push_str("</pre>\n");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn fixture() -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("hello.txt"), "hello").unwrap();
        std::fs::write(root.path().join(".secret"), "hidden").unwrap();
        std::fs::create_dir(root.path().join("docs")).unwrap();
        std::fs::write(root.path().join("docs/a b.md"), "# a").unwrap();
        std::fs::create_dir(root.path().join("site")).unwrap();
        std::fs::write(root.path().join("site/index.html"), "<h1>site</h1>").unwrap();
        root
    }

    async fn get(root: &Path, uri: &str) -> (StatusCode, String) {
        let response = file_service(root)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8_lossy(&body).into_owned())
    }

    #[test]
    fn resolve_rejects_traversal() {
        let listing = DirectoryListing::new("/srv");
        assert_eq!(listing.resolve("/docs/"), Some(PathBuf::from("/srv/docs")));
        assert_eq!(listing.resolve("/"), Some(PathBuf::from("/srv")));
        assert_eq!(listing.resolve("/a/../../etc/"), None);
        assert_eq!(listing.resolve("/%2e%2e/"), None);
    }

    #[test]
    fn listing_escapes_names() {
        let html = render_listing(&[
            ListingEntry { name: "a b.md".into(), is_dir: false },
            ListingEntry { name: "<x>".into(), is_dir: true },
            ListingEntry { name: "R&D.txt".into(), is_dir: false },
        ]);
        assert!(html.contains("<a href=\"a%20b.md\">a b.md</a>"));
        assert!(html.contains("<a href=\"%3Cx%3E/\">&lt;x&gt;/</a>"));
        assert!(html.contains("<a href=\"R&amp;D.txt\">R&amp;D.txt</a>"));
        assert!(html.starts_with("<!doctype html>"));
        assert!(html.ends_with("</pre>\n"));
    }

    #[tokio::test]
    async fn serves_files() {
        let root = fixture();
        let (status, body) = get(root.path(), "/hello.txt").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "hello");
    }

    #[tokio::test]
    async fn serves_index_html() {
        let root = fixture();
        let (status, body) = get(root.path(), "/site/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<h1>site</h1>");
    }

    #[tokio::test]
    async fn lists_directories_without_index() {
        let root = fixture();
        let (status, body) = get(root.path(), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<a href=\"docs/\">docs/</a>"));
        assert!(body.contains("<a href=\"hello.txt\">hello.txt</a>"));
        assert!(!body.contains(".secret"));

        let (status, body) = get(root.path(), "/docs/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("a%20b.md"));
    }

    #[tokio::test]
    async fn redirects_directory_without_slash() {
        let root = fixture();
        let response = file_service(root.path())
            .oneshot(Request::builder().uri("/docs").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.status().is_redirection());
        assert_eq!(response.headers()[header::LOCATION], "/docs/");
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let root = fixture();
        let (status, body) = get(root.path(), "/nope.txt").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "404 page not found");
    }
}
