//! Forward attempts and their results.

use std::fmt;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, StatusCode};
use url::Url;

/// One transport path for a logical operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// The gateway's configured target for the service.
    GatewayProxy,
    /// The service's well-known address, bypassing the configured target.
    DirectService,
    /// Body moved into a percent-encoded trailing path segment.
    LegacyUrlParams,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::GatewayProxy => "gateway-proxy",
            Strategy::DirectService => "direct-service",
            Strategy::LegacyUrlParams => "legacy-url-params",
        }
    }

    /// Whether the inbound body is sent as the request body.
    pub fn carries_body(&self) -> bool {
        !matches!(self, Strategy::LegacyUrlParams)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single, bounded forwarding attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardAttempt {
    pub strategy: Strategy,
    /// Absolute upstream URL including path and query.
    pub target: Url,
    pub timeout: Duration,
}

/// Upstream response produced by exactly one successful attempt.
///
/// The body is the upstream's streaming body; nothing is buffered.
pub struct ForwardResult {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Body,
    /// Strategy that produced this response.
    pub strategy: Strategy,
}

impl fmt::Debug for ForwardResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForwardResult")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}
