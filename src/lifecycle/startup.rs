//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration
//! - Initialize subsystems in dependency order
//! - Bind the listener last, so traffic arrives only when ready
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Logging is initialized by the caller from the loaded configuration

use std::net::SocketAddr;
use std::path::Path;

use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::config::{load_config, GatewayConfig};
use crate::error::StartupError;
use crate::http::GatewayServer;
use crate::observability::metrics::init_metrics;

/// Load configuration from `path` (or defaults) plus environment overrides.
pub fn load(path: Option<&Path>) -> Result<GatewayConfig, StartupError> {
    Ok(load_config(path)?)
}

/// Build the gateway, bind, and serve until `shutdown` fires.
pub async fn run(config: GatewayConfig, shutdown: broadcast::Receiver<()>) -> Result<(), StartupError> {
    tracing::info!(
        bind_address = %config.listener.bind_address,
        services = config.services.len(),
        routes = config.routes.len(),
        attempt_timeout_ms = config.timeouts.attempt_ms,
        request_timeout_secs = config.timeouts.request_secs,
        direct_fallback = config.fallback.direct_enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => {
                if let Err(e) = init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let bind_address = config.listener.bind_address.clone();
    let server = GatewayServer::new(config)?;

    let listener = TcpListener::bind(&bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: bind_address.clone(),
            source,
        })?;

    server.run(listener, shutdown).await?;
    Ok(())
}
