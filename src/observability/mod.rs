//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Access log middleware, server lifecycle, connection loop
//!     → tracing events
//!     → logging.rs (subscriber: filter + text/JSON formatter)
//!     → stdout
//! ```

pub mod logging;

pub use logging::init_logging;
