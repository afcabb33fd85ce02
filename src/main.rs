//! Admission Gateway
//!
//! HTTP-to-RPC gateway built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ request id → trace → CORS ──▶ /healthz, /openapi/, /swagger-ui
//!                         │
//!                         ▼
//!                    rate limiter ──(store down)──▶ fail open
//!                         │ (429 on deny)
//!                         ▼
//!                    route table ──▶ [timeout] auth interceptor ──▶ backend service
//!                                                             │
//!     Client Response                                         ▼
//!     ◀───────────────────────────────────────────── envelope marshaler
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use admission_gateway::config::load_config;
use admission_gateway::lifecycle::{wait_for_signal, Shutdown};
use admission_gateway::observability::{logging, metrics};
use admission_gateway::security::counter_store_from_config;
use admission_gateway::HttpServer;

#[derive(Parser, Debug)]
#[command(name = "admission-gateway", version, about = "HTTP admission gateway")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    logging::init_logging(&config.logging)?;

    tracing::info!(
        app = %config.server.app_name,
        env = %config.server.app_env,
        version = env!("CARGO_PKG_VERSION"),
        "Starting"
    );
    tracing::info!(
        bind_address = %config.server.bind_address,
        rate_limit_enabled = config.rate_limit.enabled,
        counter_store = ?config.counter_store.kind,
        services = config.services.len(),
        docs_enabled = config.docs.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let store = counter_store_from_config(&config.counter_store)?;
    let server = HttpServer::new(&config, store)?;

    let listener = TcpListener::bind(&config.server.bind_address).await?;

    let shutdown = Shutdown::new();
    let drain = shutdown.listener();
    tokio::spawn(async move {
        let signal = wait_for_signal().await;
        tracing::info!(signal, "Received shutdown signal");
        shutdown.trigger();
    });

    server.run(listener, drain).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
