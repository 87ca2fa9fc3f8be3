//! swim-bff
//!
//! Backend-for-frontend gateway built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!     Browser ──▶ ┌──────────────────────────────────────────────┐
//!                 │ request id → CORS → trace                    │
//!                 │   /health ─────────────────────────▶ "OK"    │
//!                 │   /api/*  → denylist → rate limit            │
//!                 │           → auth headers (user + identity)   │
//!                 │           → upstream client ───────────────┼──▶ Backend
//!                 │ ◀── mirrored status + JSON body ◀──────────┼───
//!                 └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use swim_bff::config::load_config;
use swim_bff::lifecycle::signals::spawn_signal_handler;
use swim_bff::observability::{logging, metrics};
use swim_bff::{HttpServer, Shutdown};

#[derive(Parser, Debug)]
#[command(name = "swim-bff", version, about = "Backend-for-frontend API gateway")]
struct Args {
    /// Optional TOML configuration file; environment variables override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Load and validate the configuration, then exit.
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    dotenvy::dotenv().ok();

    let config = load_config(args.config.as_deref())?;

    if args.check_config {
        println!("Configuration OK");
        return Ok(());
    }

    logging::init(&config.observability);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "swim-bff starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        environment = ?config.environment,
        rate_limit_max = config.rate_limit.max_requests,
        rate_limit_window_secs = config.rate_limit.window_secs,
        cors_origin = ?config.cors.allowed_origin,
        "Configuration loaded"
    );

    if config.upstream.base_url.is_none() {
        tracing::warn!("BACKEND_URL is not set; /api requests will fail");
    }

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
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(config)?;

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    server.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
