//! Gateway and downstream service status.
//!
//! # Responsibilities
//! - Report gateway liveness (`GET /health`)
//! - Probe every configured service's health path on demand
//!   (`GET /health/services`), all probes concurrently
//!
//! Results are informational only; fallback never consults them.

use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{header, Request};
use chrono::{SecondsFormat, Utc};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::time;
use url::Url;

use crate::config::validation::parse_upstream_url;
use crate::config::{ConfigError, GatewayConfig};
use crate::forward::HttpClient;
use crate::observability::metrics;

const PROBE_USER_AGENT: &str = concat!("pcstore-gateway-health/", env!("CARGO_PKG_VERSION"));

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GatewayHealth {
    pub status: String,
    pub service: String,
    pub version: String,
    pub uptime_secs: u64,
    pub timestamp: String,
}

/// Probe result for one service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceHealth {
    pub name: String,
    pub url: String,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Body of `GET /health/services`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServicesReport {
    /// `ok` when every service is healthy, otherwise `degraded`.
    pub status: String,
    pub services: Vec<ServiceHealth>,
    pub timestamp: String,
}

#[derive(Debug, Clone)]
struct ProbeTarget {
    name: String,
    url: Url,
}

/// Builds status reports for the gateway's health endpoints.
pub struct StatusReporter {
    client: HttpClient,
    targets: Vec<ProbeTarget>,
    timeout: Duration,
    started: Instant,
}

impl StatusReporter {
    pub fn new(client: HttpClient, config: &GatewayConfig) -> Result<Self, ConfigError> {
        let targets = config
            .services
            .iter()
            .map(|service| {
                let mut url = parse_upstream_url(&service.url).map_err(|reason| ConfigError::Route {
                    route: service.name.clone(),
                    reason,
                })?;
                url.set_path(&service.health_path);
                Ok(ProbeTarget {
                    name: service.name.clone(),
                    url,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Self {
            client,
            targets,
            timeout: Duration::from_millis(config.timeouts.health_probe_ms),
            started: Instant::now(),
        })
    }

    pub fn gateway(&self) -> GatewayHealth {
        GatewayHealth {
            status: "ok".to_string(),
            service: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs: self.started.elapsed().as_secs(),
            timestamp: now(),
        }
    }

    /// Probe all services concurrently.
    pub async fn probe_all(&self) -> ServicesReport {
        let services = join_all(self.targets.iter().map(|t| self.probe(t))).await;
        let status = if services.iter().all(|s| s.healthy) { "ok" } else { "degraded" };

        ServicesReport {
            status: status.to_string(),
            services,
            timestamp: now(),
        }
    }

    async fn probe(&self, target: &ProbeTarget) -> ServiceHealth {
        let started = Instant::now();
        let mut result = ServiceHealth {
            name: target.name.clone(),
            url: target.url.to_string(),
            healthy: false,
            status: None,
            latency_ms: 0,
            error: None,
        };

        let request = match Request::get(target.url.as_str())
            .header(header::USER_AGENT, PROBE_USER_AGENT)
            .body(Body::empty())
        {
            Ok(req) => req,
            Err(e) => {
                result.error = Some(e.to_string());
                return result;
            }
        };

        match time::timeout(self.timeout, self.client.request(request)).await {
            Ok(Ok(response)) => {
                result.status = Some(response.status().as_u16());
                result.healthy = response.status().is_success();
                if !result.healthy {
                    tracing::warn!(service = %target.name, status = %response.status(), "Health probe: non-success status");
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(service = %target.name, error = %e, "Health probe: connection error");
                result.error = Some(e.to_string());
            }
            Err(_) => {
                tracing::warn!(service = %target.name, "Health probe: timeout");
                result.error = Some(format!("no response within {}ms", self.timeout.as_millis()));
            }
        }

        result.latency_ms = started.elapsed().as_millis() as u64;
        metrics::record_service_health(&target.name, result.healthy);
        result
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
