//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (routes reference existing services)
//! - Validate target URLs (parseable, plain `http`)
//! - Detect duplicate route prefixes
//!
//! Returns every error found, not just the first.

use std::collections::HashSet;
use std::fmt;

use axum::http::Method;
use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field, e.g. `routes[2].path_prefix`.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Parse an upstream URL, accepting only `http` with a host.
pub fn parse_upstream_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw).map_err(|e| format!("invalid URL '{}': {}", raw, e))?;
    if url.scheme() != "http" {
        return Err(format!("unsupported scheme '{}' in '{}'", url.scheme(), raw));
    }
    if url.host_str().is_none() {
        return Err(format!("missing host in '{}'", raw));
    }
    Ok(url)
}

/// Validate a loaded configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::new("listener.max_body_bytes", "must be > 0"));
    }
    if config.timeouts.attempt_ms == 0 {
        errors.push(ValidationError::new("timeouts.attempt_ms", "must be > 0"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be > 0"));
    }
    if config.cors.allowed_origins.is_empty() {
        errors.push(ValidationError::new("cors.allowed_origins", "at least one origin required"));
    }
    if config.idempotency.enabled
        && axum::http::HeaderName::from_bytes(config.idempotency.header.as_bytes()).is_err()
    {
        errors.push(ValidationError::new(
            "idempotency.header",
            format!("'{}' is not a valid header name", config.idempotency.header),
        ));
    }

    let mut service_names = HashSet::new();
    for (i, service) in config.services.iter().enumerate() {
        if service.name.is_empty() {
            errors.push(ValidationError::new(format!("services[{}].name", i), "must not be empty"));
        }
        if !service_names.insert(service.name.as_str()) {
            errors.push(ValidationError::new(
                format!("services[{}].name", i),
                format!("duplicate service '{}'", service.name),
            ));
        }
        if let Err(e) = parse_upstream_url(&service.url) {
            errors.push(ValidationError::new(format!("services[{}].url", i), e));
        }
        if let Some(direct) = &service.direct_url {
            if let Err(e) = parse_upstream_url(direct) {
                errors.push(ValidationError::new(format!("services[{}].direct_url", i), e));
            }
        }
        if !service.health_path.starts_with('/') {
            errors.push(ValidationError::new(
                format!("services[{}].health_path", i),
                "must start with '/'",
            ));
        }
    }

    let mut prefixes = HashSet::new();
    for (i, route) in config.routes.iter().enumerate() {
        let prefix = route.path_prefix.trim_end_matches('/');
        if !route.path_prefix.starts_with('/') {
            errors.push(ValidationError::new(
                format!("routes[{}].path_prefix", i),
                "must start with '/'",
            ));
        } else if !prefixes.insert(prefix.to_string()) {
            errors.push(ValidationError::new(
                format!("routes[{}].path_prefix", i),
                format!("duplicate prefix '{}'", route.path_prefix),
            ));
        }
        if !service_names.contains(route.service.as_str()) {
            errors.push(ValidationError::new(
                format!("routes[{}].service", i),
                format!("unknown service '{}'", route.service),
            ));
        }
        if let Some(upstream) = &route.upstream_prefix {
            if !upstream.starts_with('/') {
                errors.push(ValidationError::new(
                    format!("routes[{}].upstream_prefix", i),
                    "must start with '/'",
                ));
            }
        }
        for method in &route.methods {
            if !matches!(
                method.parse::<Method>(),
                Ok(ref m) if crate::http::request::is_supported_method(m)
            ) {
                errors.push(ValidationError::new(
                    format!("routes[{}].methods", i),
                    format!("unsupported method '{}'", method),
                ));
            }
        }
        if route.timeout_ms == Some(0) {
            errors.push(ValidationError::new(format!("routes[{}].timeout_ms", i), "must be > 0"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
