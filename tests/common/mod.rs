//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use tokio::task::JoinHandle;
use xend::config::ServerConfig;
use xend::http::middleware::{AccessEntry, AccessLog};
use xend::http::{HttpServer, ServerError};
use xend::lifecycle::Shutdown;

/// Access log sink that keeps every entry in memory.
#[allow(dead_code)]
#[derive(Default)]
pub struct CollectingLog {
    entries: Mutex<Vec<AccessEntry>>,
}

impl AccessLog for CollectingLog {
    fn record(&self, entry: AccessEntry) {
        self.entries.lock().unwrap().push(entry);
    }
}

#[allow(dead_code)]
impl CollectingLog {
    pub fn entries(&self) -> Vec<AccessEntry> {
        self.entries.lock().unwrap().clone()
    }

    /// Wait until at least `count` entries were recorded.
    ///
    /// Entries are emitted when the server finishes the body, which may be
    /// a moment after the client has read it.
    pub async fn wait_for(&self, count: usize) -> Vec<AccessEntry> {
        for _ in 0..100 {
            let entries = self.entries();
            if entries.len() >= count {
                return entries;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.entries()
    }
}

/// A server running on an ephemeral loopback port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), ServerError>>,
}

#[allow(dead_code)]
impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

pub fn test_config(dir: &Path, grace_secs: u64) -> Arc<ServerConfig> {
    Arc::new(ServerConfig {
        host: "127.0.0.1".into(),
        port: 0,
        dir: dir.to_path_buf(),
        shutdown_grace_secs: grace_secs,
        ..ServerConfig::default()
    })
}

/// Serve `dir` with the full middleware chain, logging into `log`.
#[allow(dead_code)]
pub async fn start_file_server(dir: &Path, log: Arc<CollectingLog>) -> TestServer {
    let config = test_config(dir, 5);
    start(HttpServer::with_access_log(config.clone(), log), &config).await
}

/// Serve a custom application.
#[allow(dead_code)]
pub async fn start_app(app: Router, grace_secs: u64) -> TestServer {
    let config = test_config(Path::new("."), grace_secs);
    start(HttpServer::with_app(config.clone(), app), &config).await
}

async fn start(server: HttpServer, config: &ServerConfig) -> TestServer {
    let listener = xend::net::bind(config).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let handle = tokio::spawn(server.run(listener, server_shutdown));

    TestServer {
        addr,
        shutdown,
        handle,
    }
}

/// A served root with plain, compressible and hidden files.
#[allow(dead_code)]
pub fn fixture_root() -> tempfile::TempDir {
    let root = tempfile::tempdir().unwrap();
    let path = root.path();

    std::fs::write(path.join("hello.txt"), "hello, world\n").unwrap();
    std::fs::write(path.join("big.txt"), big_text()).unwrap();
    std::fs::write(path.join(".env"), "SECRET=1\n").unwrap();
    std::fs::create_dir(path.join(".git")).unwrap();
    std::fs::write(path.join(".git/config"), "[core]\n").unwrap();
    std::fs::create_dir(path.join("docs")).unwrap();
    std::fs::write(path.join("docs/readme.md"), "# docs\n").unwrap();
    std::fs::write(path.join("docs/.draft.md"), "wip\n").unwrap();

    root
}

#[allow(dead_code)]
pub fn big_text() -> String {
    "All work and no play makes Jack a dull boy.\n".repeat(2_000)
}

#[allow(dead_code)]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}
