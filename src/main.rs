//! Plant identification gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────┐
//!                        │               IDENTIFICATION GATEWAY             │
//!                        │                                                  │
//!   POST /api/v1/identify│  ┌────────┐    ┌──────────────────────────┐      │
//!   ─────────────────────┼─▶│  http  │───▶│  IdentificationService   │      │
//!                        │  └────────┘    └───────┬──────────┬───────┘      │
//!                        │                        │          │              │
//!                        │              ┌─────────▼──┐  ┌────▼───────┐      │
//!                        │              │  breaker   │  │  breaker   │      │
//!                        │              │  plant_id  │  │ plant_net  │      │
//!                        │              └─────┬──────┘  └────┬───────┘      │
//!                        │              ┌─────▼──────┐  ┌────▼───────┐      │    Plant.id
//!                        │              │PlantIdClient│ │PlantNetClient├─────┼──▶ PlantNet
//!                        │              └─────┬──────┘  └────┬───────┘      │
//!                        │                    └──── cache ───┘              │
//!                        │                                                  │
//!                        │  config · observability · health · lifecycle     │
//!                        └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use plantid_gateway::config::load_or_default;
use plantid_gateway::http::HttpServer;
use plantid_gateway::lifecycle::{build_service, wait_for_shutdown_signal, Shutdown};
use plantid_gateway::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "plantid-gateway")]
#[command(about = "Plant identification gateway with per-provider circuit breakers", long_about = None)]
struct Args {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(short, long, env = "PLANTID_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_or_default(args.config.as_deref())?;

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "plantid-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_body_bytes = config.listener.max_body_bytes,
        request_timeout_secs = config.listener.request_timeout_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let service = Arc::new(build_service(&config)?);

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config.listener.clone(), service);
    let server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    wait_for_shutdown_signal().await;
    shutdown.trigger();

    server_task.await??;
    tracing::info!("Shutdown complete");
    Ok(())
}
