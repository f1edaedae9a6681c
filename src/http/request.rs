//! Inbound request handling.
//!
//! # Responsibilities
//! - Request ID lookup (set by the request-id layer)
//! - Method support checks
//! - Buffer the inbound request once so every fallback strategy can resend it

use std::net::SocketAddr;

use axum::body::{Body, Bytes};
use axum::extract::ConnectInfo;
use axum::http::{header, HeaderMap, Method, Request, Uri};
use http_body_util::LengthLimitError;

use crate::error::GatewayError;

/// Header carrying the per-request correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Methods the gateway forwards (OPTIONS is answered by the CORS layer).
pub fn is_supported_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::POST | Method::PUT | Method::DELETE | Method::PATCH | Method::OPTIONS
    )
}

/// Methods whose body is forwarded upstream.
pub fn method_allows_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH | Method::DELETE)
}

/// Correlation ID of a request, or "unknown" when absent.
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

/// Buffered snapshot of a client request.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub client_addr: Option<SocketAddr>,
}

impl InboundRequest {
    /// Read the request, buffering at most `limit` body bytes.
    pub async fn from_request(request: Request<Body>, limit: usize) -> Result<Self, GatewayError> {
        let client_addr = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let (parts, body) = request.into_parts();

        let declared = parts
            .headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if declared.is_some_and(|len| len > limit) {
            return Err(GatewayError::PayloadTooLarge { limit });
        }

        let body = axum::body::to_bytes(body, limit).await.map_err(|e| {
            let inner = e.into_inner();
            if inner.downcast_ref::<LengthLimitError>().is_some() {
                GatewayError::PayloadTooLarge { limit }
            } else {
                GatewayError::BadRequest {
                    message: format!("Failed to read request body: {}", inner),
                }
            }
        })?;

        Ok(Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
            client_addr,
        })
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}
