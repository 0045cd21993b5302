//! Canned-response HTTP server.
//!
//! Reads each request head, answers with the configured fallback response
//! and closes the connection.

use std::path::PathBuf;

use clap::Parser;

use http_exchange::config::{load_config, ServerConfig};
use http_exchange::http::FallbackHandler;
use http_exchange::net::listener::Listener;
use http_exchange::observability::{logging, metrics};
use http_exchange::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "http-exchange")]
#[command(about = "Serve a fixed HTTP response on every connection", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability)?;
    tracing::info!("http-exchange v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        exchange_timeout_secs = config.timeouts.exchange_secs,
        fallback_status = config.fallback.status,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = Listener::bind(&config.listener).await?;

    let shutdown = Shutdown::new();
    shutdown.trigger_on_ctrl_c();

    let server = HttpServer::new(FallbackHandler::from_config(&config.fallback), &config);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
