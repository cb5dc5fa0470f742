//! tiny-balancer
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────▶ http server ──▶ routing ──▶ admission ──▶ load_balancer ──▶ Backend
//!                                         (blacklist,     (strategy per
//!                                          gate, token,    route)
//!                                          leaky bucket)
//!     Client Response
//!     ◀────── http server ◀──────────────────────────────────────────── Backend
//!
//!     Cross-cutting: config, observability, lifecycle
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use tiny_balancer::config::load_config;
use tiny_balancer::lifecycle::{wait_for_signal, Shutdown};
use tiny_balancer::load_balancer::StrategyRegistry;
use tiny_balancer::observability::{logging, metrics};
use tiny_balancer::HttpServer;

#[derive(Debug, Parser)]
#[command(name = "tiny-balancer", version, about = "Reverse-proxy load balancer")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let registry = StrategyRegistry::with_defaults();

    let config = match load_config(&cli.config, &registry) {
        Ok(config) => config,
        Err(e) => {
            logging::init("info");
            tracing::error!(path = %cli.config.display(), error = %e, "Failed to load configuration");
            return Err(e.into());
        }
    };

    logging::init(&config.observability.log_level);
    tracing::info!("tiny-balancer v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        routes = config.routes.len(),
        request_timeout_secs = config.timeouts.request_secs,
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

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(config, &registry)?;

    for route in server.routes().routes() {
        tracing::info!(
            route = %route.name,
            strategy = route.balancer.strategy(),
            hosts = ?route.balancer.hosts(),
            admission = %route.admission.describe(),
            "Route ready"
        );
    }

    let shutdown = Shutdown::new();
    let server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    wait_for_signal().await;
    shutdown.trigger();
    server_task.await??;

    tracing::info!("Shutdown complete");
    Ok(())
}
