//! Response handling.
//!
//! # Responsibilities
//! - Turn the winning upstream response into the client response, streaming
//! - Tag it with the strategy that produced it
//! - Render panics caught at the request boundary as a JSON 500

use std::any::Any;

use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};

use crate::error::GatewayError;
use crate::forward::ForwardResult;

/// Names the strategy that produced a forwarded response.
pub const X_GATEWAY_STRATEGY: &str = "x-gateway-strategy";

/// Status, headers and body of the upstream response, unchanged.
pub fn into_client_response(result: ForwardResult) -> Response {
    let mut response = Response::new(result.body);
    *response.status_mut() = result.status;
    *response.headers_mut() = result.headers;
    response
        .headers_mut()
        .insert(X_GATEWAY_STRATEGY, HeaderValue::from_static(result.strategy.as_str()));
    response
}

/// Handler for `tower_http::catch_panic::CatchPanicLayer::custom`.
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    };
    tracing::error!(panic = %detail, "Request handler panicked");

    GatewayError::Internal {
        message: "The gateway failed while handling this request".to_string(),
    }
    .into_response()
}
