//! Configuration schema definitions.
//!
//! All types derive `Deserialize` so they can be read from an optional
//! TOML file; every field has a default so an empty file is a valid config.

use std::path::PathBuf;

use serde::Deserialize;

/// Root configuration for the file server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host name or address to listen on.
    pub host: String,

    /// TCP port to listen on.
    pub port: u16,

    /// Root directory to serve files from.
    pub dir: PathBuf,

    /// How long in-flight requests get to finish once shutdown starts.
    pub shutdown_grace_secs: u64,

    /// Logging settings.
    pub log: LogConfig,
}

impl ServerConfig {
    /// `host:port` as handed to the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8000,
            dir: PathBuf::from("."),
            shutdown_grace_secs: 5,
            log: LogConfig::default(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` takes precedence.
    pub filter: String,

    /// Output format.
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "xend=info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable, one line per event.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}
