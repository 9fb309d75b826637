//! Admission gateway (v0.1)
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌───────────────────────────────────────────────┐
//!                      │               ADMISSION GATEWAY               │
//!                      │                                               │
//!   Client Request     │  ┌────────┐  ┌────────┐  ┌───────┐  ┌───────┐  │
//!   ───────────────────┼─▶│ origin │─▶│ cache  │─▶│ rate  │─▶│ fwd   │──┼──▶ Upstream
//!                      │  │ policy │  │ policy │  │ limit │  │       │  │    App Server
//!                      │  └───┬────┘  └────────┘  └───┬───┘  └───┬───┘  │
//!                      │      │ 403                   │ 429      │      │
//!   Client Response    │      ▼                       ▼          ▼      │
//!   ◀──────────────────┼──── CORS + cache headers merged on the way back │
//!                      └───────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio::net::TcpListener;

use admission_gateway::config::loader;
use admission_gateway::observability::{logging, metrics};
use admission_gateway::{GatewayServer, Shutdown};

#[derive(Debug, Parser)]
#[command(name = "admission-gateway", version, about = "HTTP admission-control gateway")]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Override listener.bind_address.
    #[arg(long)]
    bind: Option<String>,

    /// Override upstream.address.
    #[arg(long)]
    upstream: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match loader::read_config(args.config.as_deref()).and_then(|mut config| {
        if let Some(bind) = args.bind {
            config.listener.bind_address = bind;
        }
        if let Some(upstream) = args.upstream {
            config.upstream.address = upstream;
        }
        loader::finish(config)
    }) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("admission-gateway: refusing to start: {}", e);
            return ExitCode::FAILURE;
        }
    };

    logging::init(&config.observability);
    tracing::info!("admission-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        max_requests = config.rate_limit.max_requests,
        window_secs = config.rate_limit.window_secs,
        permitted_origins = config.cors.permitted_origins.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let bind_address = config.listener.bind_address.clone();
    let server = match GatewayServer::new(config) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "Invalid admission configuration");
            return ExitCode::FAILURE;
        }
    };

    let listener = match TcpListener::bind(&bind_address).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(address = %bind_address, error = %e, "Failed to bind listener");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();

    if let Err(e) = server.run(listener, shutdown.subscribe()).await {
        tracing::error!(error = %e, "Server error");
        return ExitCode::FAILURE;
    }

    tracing::info!("Shutdown complete");
    ExitCode::SUCCESS
}
