//! Forwarding proxy server.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌───────────────────────────────────────────────────┐
//!                     │                  FORWARD PROXY                    │
//!                     │                                                   │
//!   ANY /proxy        │  ┌────────────┐   ┌──────────┐   ┌────────────┐   │
//!   ──────────────────┼─▶│ rate limit │──▶│ api key  │──▶│ forwarder  │───┼──▶ Upstream
//!                     │  │ (window)   │   │ auth     │   │ (reqwest)  │   │
//!                     │  └────────────┘   └──────────┘   └─────┬──────┘   │
//!                     │                                        │          │
//!   JSON response     │  ┌──────────────────────────────┐      │          │
//!   ◀─────────────────┼──│ ProxyResponse (Success|Fail) │◀─────┘          │
//!                     │  └──────────────────────────────┘                 │
//!                     │                                                   │
//!                     │  config · observability · lifecycle               │
//!                     └───────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use forward_proxy::config::load_config;
use forward_proxy::lifecycle::{shutdown_signal, Shutdown};
use forward_proxy::observability::{logging, metrics};
use forward_proxy::HttpServer;

#[derive(Parser)]
#[command(name = "forward-proxy")]
#[command(about = "Authenticated, rate-limited HTTP forwarding proxy", long_about = None)]
struct Args {
    /// Optional TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listening port (overrides config and PORT).
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.listener.port = port;
    }

    logging::init_tracing(&config.observability.log_level);

    tracing::info!("forward-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address(),
        rate_limit_enabled = config.rate_limit.enabled,
        window_secs = config.rate_limit.window_secs,
        max_requests = config.rate_limit.max_requests,
        key_by = ?config.rate_limit.key_by,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(config.listener.bind_address()).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.trigger();
    });

    let server = HttpServer::new(config)?;
    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
