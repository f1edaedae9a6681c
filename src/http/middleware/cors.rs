//! CORS normalization.
//!
//! Outermost gateway middleware. Answers every preflight itself and stamps
//! one consistent set of `Access-Control-*` headers on every other response,
//! whether it came from a downstream service, a gateway error, or the panic
//! boundary. Upstream CORS headers are replaced, never merged.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::config::validation::ValidationError;
use crate::config::{ConfigError, CorsConfig};

#[derive(Debug, Clone)]
enum AllowedOrigins {
    Any,
    List(Vec<HeaderValue>),
}

/// Compiled CORS header set.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    origins: AllowedOrigins,
    allow_methods: HeaderValue,
    allow_headers: HeaderValue,
    max_age: HeaderValue,
    allow_credentials: bool,
}

impl CorsPolicy {
    pub fn from_config(config: &CorsConfig) -> Result<Self, ConfigError> {
        let origins = if config.allowed_origins.iter().any(|o| o == "*") {
            AllowedOrigins::Any
        } else {
            AllowedOrigins::List(
                config
                    .allowed_origins
                    .iter()
                    .map(|o| header_value("cors.allowed_origins", o))
                    .collect::<Result<_, _>>()?,
            )
        };

        Ok(Self {
            origins,
            allow_methods: header_value("cors.allowed_methods", &config.allowed_methods.join(", "))?,
            allow_headers: header_value("cors.allowed_headers", &config.allowed_headers.join(", "))?,
            max_age: HeaderValue::from(config.max_age_secs),
            allow_credentials: config.allow_credentials,
        })
    }

    /// `Access-Control-Allow-Origin` value for a request, and whether it
    /// depends on the request origin.
    fn allow_origin(&self, request_origin: Option<&HeaderValue>) -> (HeaderValue, bool) {
        match (&self.origins, request_origin) {
            (AllowedOrigins::Any, Some(origin)) if self.allow_credentials => (origin.clone(), true),
            (AllowedOrigins::Any, _) => (HeaderValue::from_static("*"), false),
            (AllowedOrigins::List(list), Some(origin)) if list.contains(origin) => (origin.clone(), true),
            (AllowedOrigins::List(list), _) => (
                list.first().cloned().unwrap_or_else(|| HeaderValue::from_static("null")),
                true,
            ),
        }
    }

    /// Replace any CORS headers in `headers` with this policy's.
    pub fn apply(&self, headers: &mut HeaderMap, request_origin: Option<&HeaderValue>) {
        let stale: Vec<HeaderName> = headers
            .keys()
            .filter(|name| name.as_str().starts_with("access-control-"))
            .cloned()
            .collect();
        for name in stale {
            headers.remove(&name);
        }

        let (origin, varies) = self.allow_origin(request_origin);
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, self.allow_methods.clone());
        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, self.allow_headers.clone());
        headers.insert(header::ACCESS_CONTROL_MAX_AGE, self.max_age.clone());
        if self.allow_credentials {
            headers.insert(header::ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
        }
        if varies {
            headers.append(header::VARY, HeaderValue::from_static("origin"));
        }
    }

    /// Immediate `200` answer to an `OPTIONS` request.
    pub fn preflight(&self, request_origin: Option<&HeaderValue>) -> Response {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::OK;
        self.apply(response.headers_mut(), request_origin);
        response
    }
}

fn header_value(field: &str, value: &str) -> Result<HeaderValue, ConfigError> {
    HeaderValue::from_str(value).map_err(|e| {
        ConfigError::Validation(vec![ValidationError::new(field, format!("'{}': {}", value, e))])
    })
}

/// Middleware entry point.
pub async fn cors_middleware(State(policy): State<Arc<CorsPolicy>>, request: Request, next: Next) -> Response {
    let origin = request.headers().get(header::ORIGIN).cloned();

    if request.method() == Method::OPTIONS {
        tracing::debug!(path = %request.uri().path(), "Answering preflight");
        return policy.preflight(origin.as_ref());
    }

    let mut response = next.run(request).await;
    policy.apply(response.headers_mut(), origin.as_ref());
    response
}
