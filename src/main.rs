//! xend - A local file-server.
//!
//! ```text
//!  flags / config file ──▶ ServerConfig ──▶ bind host:port
//!                                              │
//!   SIGINT/SIGTERM ──▶ Shutdown ──▶ drain ◀── serve dir
//! ```

use xend::cli::Cli;
use xend::lifecycle::startup;
use xend::observability::init_logging;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match Cli::parse_args().into_config() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("xend: {}", err);
            std::process::exit(2);
        }
    };

    init_logging(&config.log)?;

    if let Err(err) = startup::serve(config).await {
        tracing::error!(error = %err, "HTTP server error");
        std::process::exit(1);
    }

    Ok(())
}
