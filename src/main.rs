//! PC Store API Gateway
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────────┐
//!                        │                     API GATEWAY                       │
//!   Client Request       │  ┌──────────┐   ┌─────────┐   ┌──────────────────┐   │
//!   ─────────────────────┼─▶│ request  │──▶│  CORS   │──▶│ routing (prefix) │   │
//!                        │  │ id/trace │   │normalize│   └────────┬─────────┘   │
//!                        │  └──────────┘   └─────────┘            │ plan        │
//!                        │                                        ▼             │
//!                        │                               ┌──────────────────┐   │
//!                        │                               │ fallback resolver│   │
//!                        │                               │ proxy → direct → │   │
//!                        │                               │ legacy url params│   │
//!                        │                               └────────┬─────────┘   │
//!   Client Response      │  ┌──────────┐                          ▼             │
//!   ◀────────────────────┼──│ response │◀─────────────── forwarder (hyper) ◀────┼── Service
//!                        │  └──────────┘                                        │
//!                        └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use pcstore_gateway::config::ObservabilityConfig;
use pcstore_gateway::lifecycle::{signals, startup, Shutdown};
use pcstore_gateway::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "pcstore-gateway", version)]
#[command(about = "API gateway for the PC Store services", long_about = None)]
struct Cli {
    /// TOML configuration file; built-in defaults when omitted.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match startup::load(cli.config.as_deref()) {
        Ok(config) => {
            init_logging(&config.observability);
            config
        }
        Err(e) => {
            init_logging(&ObservabilityConfig::default());
            tracing::error!(error = %e, "Startup failed");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "pcstore-gateway starting");

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    tokio::spawn(signals::wait_for_shutdown_signal(shutdown.clone()));

    match startup::run(config, receiver).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Gateway stopped with error");
            ExitCode::FAILURE
        }
    }
}
