//! Cadastral Tile Gateway
//!
//! HTTP gateway that forwards map-tile requests to a national cadastral WMS
//! endpoint while protecting it from overload.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────┐
//!                      │                 TILE GATEWAY                  │
//!                      │                                               │
//!   GET /tiles?...     │  ┌──────────┐   ┌───────────┐   ┌──────────┐ │
//!   ───────────────────┼─▶│   wms    │──▶│ admission │──▶│ upstream │─┼──▶ WMS
//!                      │  │normalizer│   │ gate (N)  │   │ + retry  │ │    GetMap
//!                      │  └──────────┘   └───────────┘   └────┬─────┘ │
//!                      │       │ 400                          │       │
//!   tile bytes /       │       ▼                              ▼       │
//!   JSON error         │  ┌────────────────────────────────────────┐  │
//!   ◀──────────────────┼──│    response classifier (cache tiers)   │  │
//!                      │  └────────────────────────────────────────┘  │
//!                      │                                               │
//!                      │  config · observability · lifecycle          │
//!                      └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tile_gateway::config::{loader::load_config, GatewayConfig};
use tile_gateway::http::HttpServer;
use tile_gateway::lifecycle::Shutdown;
use tile_gateway::observability::metrics;

/// Command-line options.
#[derive(Debug, Parser)]
#[command(name = "tile-gateway", about = "Caching gateway for cadastral WMS tiles")]
struct Cli {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    // Initialize tracing subscriber
    let default_filter = format!("tile_gateway={},tower_http=info", config.observability.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&default_filter)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("tile-gateway v0.1.0 starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.base_url,
        admission_capacity = config.admission.capacity,
        retry_grace_ms = config.upstream.grace_period_ms,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!(address = %local_addr, "Listening for connections");

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            shutdown.trigger();
        }
    });

    let server = HttpServer::new(config);
    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
