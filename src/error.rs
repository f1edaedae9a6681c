//! Gateway error types.
//!
//! Every failure that originates in the gateway (as opposed to a downstream
//! service's own error response) is a [`GatewayError`] and is rendered to the
//! client as a JSON [`ErrorBody`] `{error, message, timestamp}`. CORS headers
//! are added afterwards by the CORS middleware.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigError;

/// Errors surfaced to clients by the gateway itself.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// No registered route prefix matches the path.
    #[error("No route matches '{path}'")]
    RouteNotFound { path: String },

    /// The method is unsupported or not allowed on the matched route.
    #[error("Method {method} is not allowed on route '{route}'")]
    MethodNotAllowed { method: String, route: String },

    /// Inbound body exceeded the configured buffer limit.
    #[error("Request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    /// Inbound body could not be read.
    #[error("{message}")]
    BadRequest { message: String },

    /// A request with the same client-supplied idempotency key is in flight.
    #[error("A request with idempotency key '{key}' is already in flight")]
    DuplicateRequest { key: String },

    /// Upstream reachable but every strategy failed.
    #[error("{message}")]
    BadGateway { message: String },

    /// No strategy responded in time.
    #[error("{message}")]
    GatewayTimeout { message: String },

    /// No strategy could be attempted.
    #[error("{message}")]
    ServiceUnavailable { message: String },

    /// Unexpected failure inside the gateway.
    #[error("{message}")]
    Internal { message: String },
}

impl GatewayError {
    /// HTTP status returned to the client.
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            GatewayError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            GatewayError::DuplicateRequest { .. } => StatusCode::CONFLICT,
            GatewayError::BadGateway { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::GatewayTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        error_response(self.status(), self.to_string())
    }
}

/// JSON body of every gateway-originated failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    /// Canonical reason phrase of the status, e.g. "Bad Gateway".
    pub error: String,
    /// Human readable detail.
    pub message: String,
    /// RFC 3339 UTC timestamp.
    pub timestamp: String,
}

impl ErrorBody {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: message.into(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Build a JSON error response.
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let mut response = (status, Json(ErrorBody::new(status, message))).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-store"),
    );
    response
}

/// Errors that prevent the gateway from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}
