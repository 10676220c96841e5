//! Command line interface.
//!
//! Flags follow the single-dash style (`-port 9000`, `-dir=./public`); the
//! usual `--port` spelling works too.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::Parser;

use crate::config::{self, ConfigError, ServerConfig};

const LONG_FLAGS: &[&str] = &["host", "port", "dir", "config", "help"];

/// xend - A local file-server
#[derive(Debug, Parser)]
#[command(name = "xend")]
#[command(about = "xend - A local file-server", long_about = None)]
#[command(override_usage = "xend [-host <HOST>] [-port <PORT>] [-dir <DIR>] [-config <FILE>]")]
#[command(after_help = "\
Every flag may be written with one dash or two: -port 9000, -dir=./public, --host localhost.

Example: xend -host 0.0.0.0 -port 9000 -dir ./public")]
pub struct Cli {
    /// HTTP network host to listen on, as -host [default: localhost]
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    /// HTTP network port to listen on, as -port [default: 8000]
    #[arg(long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Root directory to serve files from, as -dir [default: .]
    #[arg(long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Optional TOML config file, as -config; flags given on the command line win
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Parse the process arguments.
    pub fn parse_args() -> Self {
        Self::parse_from(normalize_args(std::env::args_os()))
    }

    /// Merge the optional config file with explicit flags and validate.
    pub fn into_config(self) -> Result<ServerConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => config::load_config(path)?,
            None => ServerConfig::default(),
        };

        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(dir) = self.dir {
            config.dir = dir;
        }

        config::loader::finalize(config)
    }
}

/// Rewrite `-flag` and `-flag=value` into `--flag` forms clap understands.
///
/// Arguments after a bare `--` are left alone.
pub fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    let mut passthrough = false;

    args.into_iter()
        .enumerate()
        .map(|(index, arg)| {
            if index == 0 || passthrough {
                return arg;
            }
            if arg == "--" {
                passthrough = true;
                return arg;
            }

            let Some(text) = arg.to_str() else {
                return arg;
            };
            let Some(rest) = text.strip_prefix('-').filter(|rest| !rest.starts_with('-')) else {
                return arg;
            };

            let name = rest.split_once('=').map_or(rest, |(name, _)| name);
            if LONG_FLAGS.contains(&name) {
                OsString::from(format!("--{}", rest))
            } else {
                arg
            }
        })
        .collect()
}
