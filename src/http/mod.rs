//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (hyper HTTP/1.1, peer address, graceful drain)
//!     → middleware/ (access log → hidden paths → gzip)
//!     → files.rs (ServeDir + directory listing)
//!     → response.rs (instrumented body) → client
//! ```

pub mod files;
pub mod middleware;
pub mod response;
pub mod server;

pub use server::{HttpServer, ServerError};
