//! Edge gateway binary.
//!
//! A single ingress point in front of several backend services, built
//! with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                   ┌────────────────────────────────────────────────┐
//!                   │                 EDGE GATEWAY                   │
//!                   │                                                │
//!   Client Request  │  ┌──────────┐  ┌──────┐  ┌──────┐  ┌───────┐  │
//!   ────────────────┼─▶│ security │─▶│ CORS │─▶│ auth │─▶│ route │  │
//!                   │  │ headers  │  └──────┘  │ gate │  │ match │  │
//!                   │  └──────────┘            └──────┘  └───┬───┘  │
//!                   │                                        ▼      │
//!                   │  ┌──────────┐  ┌────────────┐  ┌────────────┐ │
//!   Client Response │  │ response │◀─│ resilience │◀─│ rate       │ │     Backend
//!   ◀───────────────┼──│ relay    │  │ retry + cb │  │ limiter    │ │◀─── Services
//!                   │  └──────────┘  └────────────┘  └────────────┘ │
//!                   │                                                │
//!                   │  config · observability · lifecycle            │
//!                   └────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use edge_gateway::config::{load_config, GatewayConfig};
use edge_gateway::http::HttpServer;
use edge_gateway::lifecycle::{signals, Shutdown};
use edge_gateway::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(
    name = "edge-gateway",
    about = "Routing, auth, rate limiting and resilience at the ingress"
)]
struct Args {
    /// Path to the TOML configuration file. Built-in defaults are used
    /// when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Parse and validate the configuration, then exit.
    #[arg(long)]
    validate: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    if args.validate {
        println!("configuration OK");
        return Ok(());
    }

    logging::init_logging(&config.observability.log_level);

    tracing::info!(
        bind_address = %config.listener.bind_address,
        routes = config.routes.len(),
        tls = config.listener.tls.is_some(),
        "edge-gateway v0.1.0 starting"
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

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        signals::wait_for_signal().await;
        shutdown.trigger();
    });

    let tls_enabled = config.listener.tls.is_some();
    let bind_address = config.listener.bind_address.clone();
    let server = HttpServer::new(config);

    if tls_enabled {
        server.run_tls(server_shutdown).await?;
    } else {
        let listener = TcpListener::bind(&bind_address).await?;
        server.run(listener, server_shutdown).await?;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
