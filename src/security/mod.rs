//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → hidden_path.rs (404 for any dot-prefixed segment)
//!     → Pass to compression and the file handler
//! ```
//!
//! # Design Decisions
//! - Fail closed: a rejected request never touches the file system
//! - No trust in client input: percent escapes are decoded before checking

pub mod hidden_path;

pub use hidden_path::{is_hidden_path, reject_hidden_paths};
