//! xend: a local file-server that serves a directory over HTTP.
//!
//! Every request passes through a fixed middleware chain before reaching
//! the file handler:
//!
//! ```text
//! access log → hidden-path rejection → gzip compression → ServeDir
//! ```

pub mod cli;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod security;

pub use config::ServerConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
