//! Outbound HTTP forwarding.
//!
//! # Responsibilities
//! - Build the outbound request for one attempt (method, headers, body)
//! - Send it on the shared pooled client
//! - Hand the upstream response back with its body still streaming
//! - Classify client failures into [`TransportError`]
//!
//! Deadlines are applied by the caller (see `resilience::timeouts`); dropping
//! the returned future drops the outbound connection.

use std::future::Future;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, HeaderValue, Request, Uri};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::config::TimeoutConfig;
use crate::forward::attempt::{ForwardAttempt, ForwardResult};
use crate::forward::error::TransportError;
use crate::http::request::{method_allows_body, InboundRequest};
use crate::security::headers::{forward_request_headers, strip_hop_by_hop};

/// Shared upstream HTTP client.
pub type HttpClient = Client<HttpConnector, Body>;

/// Create the pooled client used for forwarding and health probes.
pub fn build_client(timeouts: &TimeoutConfig) -> HttpClient {
    let mut connector = HttpConnector::new();
    connector.set_nodelay(true);

    Client::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(timeouts.pool_idle_secs))
        .build(connector)
}

/// Sends one forward attempt and returns the upstream response.
pub trait Forwarder: Send + Sync + 'static {
    fn forward(
        &self,
        attempt: &ForwardAttempt,
        request: &InboundRequest,
    ) -> impl Future<Output = Result<ForwardResult, TransportError>> + Send;
}

/// [`Forwarder`] backed by the hyper-util client.
#[derive(Clone)]
pub struct HttpForwarder {
    client: HttpClient,
}

impl HttpForwarder {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }
}

impl Forwarder for HttpForwarder {
    async fn forward(
        &self,
        attempt: &ForwardAttempt,
        request: &InboundRequest,
    ) -> Result<ForwardResult, TransportError> {
        let outbound = build_outbound(attempt, request)?;

        tracing::debug!(
            strategy = %attempt.strategy,
            target = %attempt.target,
            method = %request.method,
            "Sending upstream request"
        );

        let response: hyper::Response<Incoming> = self
            .client
            .request(outbound)
            .await
            .map_err(|e| TransportError::from_client_error(attempt.target.as_str(), &e))?;

        let (parts, body) = response.into_parts();
        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);

        Ok(ForwardResult {
            status: parts.status,
            headers,
            body: Body::new(body),
            strategy: attempt.strategy,
        })
    }
}

/// Build the outbound request for `attempt`.
///
/// All end-to-end headers are copied, `Authorization` included. The body is
/// sent only for methods that carry one and strategies that keep it in the
/// request body; a body without a declared type is sent as JSON.
pub fn build_outbound(
    attempt: &ForwardAttempt,
    request: &InboundRequest,
) -> Result<Request<Body>, TransportError> {
    let uri: Uri = attempt
        .target
        .as_str()
        .parse()
        .map_err(|e| TransportError::Protocol {
            target: attempt.target.to_string(),
            reason: format!("invalid upstream URI: {}", e),
        })?;

    let mut headers = forward_request_headers(&request.headers, request.client_addr);

    let send_body = attempt.strategy.carries_body()
        && method_allows_body(&request.method)
        && !request.body.is_empty();

    let body = if send_body {
        if !headers.contains_key(header::CONTENT_TYPE) {
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        Body::from(request.body.clone())
    } else {
        headers.remove(header::CONTENT_TYPE);
        Body::empty()
    };

    let mut outbound = Request::builder()
        .method(request.method.clone())
        .uri(uri)
        .body(body)
        .map_err(|e| TransportError::Protocol {
            target: attempt.target.to_string(),
            reason: e.to_string(),
        })?;
    *outbound.headers_mut() = headers;

    Ok(outbound)
}
