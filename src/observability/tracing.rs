//! Per-request spans.
//!
//! Every log event emitted while a request is handled carries its
//! `request_id`, so one client call can be followed across all of its
//! fallback attempts.

use axum::body::Body;
use axum::http::Request;
use ::tracing::Span;

use crate::http::request::request_id;

/// Span factory for `tower_http::trace::TraceLayer::make_span_with`.
pub fn request_span(request: &Request<Body>) -> Span {
    ::tracing::info_span!(
        "request",
        request_id = %request_id(request.headers()),
        method = %request.method(),
        path = %request.uri().path(),
    )
}
