//! Route lookup.
//!
//! # Responsibilities
//! - Compile `RouteConfig`s against their services at startup (fail fast)
//! - Look up the matching route for a path (longest prefix wins)
//! - Return an explicit no-match rather than a silent default
//!
//! Immutable after construction; shared via `Arc` without locks.

use std::collections::HashSet;
use std::time::Duration;

use axum::http::Method;
use url::Url;

use crate::config::validation::parse_upstream_url;
use crate::config::{ConfigError, GatewayConfig, RouteConfig};
use crate::routing::matcher::PathPrefixMatcher;

/// A compiled route.
#[derive(Debug, Clone)]
pub struct Route {
    pub name: String,
    pub service: String,
    matcher: PathPrefixMatcher,
    /// Configured proxy target of the service.
    pub target: Url,
    /// Well-known direct address of the service.
    pub direct: Option<Url>,
    /// Allowed methods; empty allows all supported methods.
    pub methods: Vec<Method>,
    pub upstream_prefix: Option<String>,
    /// Per-attempt deadline.
    pub timeout: Duration,
    pub legacy_params: bool,
}

impl Route {
    fn compile(route: &RouteConfig, config: &GatewayConfig) -> Result<Self, ConfigError> {
        let fail = |reason: String| ConfigError::Route {
            route: route.name.clone(),
            reason,
        };

        let service = config
            .service(&route.service)
            .ok_or_else(|| fail(format!("unknown service '{}'", route.service)))?;
        let target = parse_upstream_url(&service.url).map_err(fail)?;
        let direct = service
            .direct_url
            .as_deref()
            .map(parse_upstream_url)
            .transpose()
            .map_err(fail)?;
        let methods = route
            .methods
            .iter()
            .map(|m| {
                m.to_uppercase()
                    .parse::<Method>()
                    .map_err(|_| fail(format!("invalid method '{}'", m)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: route.name.clone(),
            service: route.service.clone(),
            matcher: PathPrefixMatcher::new(route.path_prefix.clone()),
            target,
            direct,
            methods,
            upstream_prefix: route.upstream_prefix.clone(),
            timeout: Duration::from_millis(route.timeout_ms.unwrap_or(config.timeouts.attempt_ms)),
            legacy_params: route.legacy_params,
        })
    }

    pub fn prefix(&self) -> &str {
        self.matcher.prefix()
    }

    pub fn matches(&self, path: &str) -> bool {
        self.matcher.matches(path)
    }

    pub fn allows(&self, method: &Method) -> bool {
        self.methods.is_empty() || self.methods.contains(method)
    }

    /// Path sent upstream: the matched prefix replaced by `upstream_prefix`
    /// when one is configured, otherwise the inbound path unchanged.
    pub fn upstream_path(&self, path: &str) -> String {
        match &self.upstream_prefix {
            Some(upstream) => {
                let rest = self.matcher.remainder(path);
                format!("{}{}", upstream.trim_end_matches('/'), rest)
            }
            None => path.to_string(),
        }
    }
}

/// Immutable route table.
#[derive(Debug, Clone)]
pub struct Router {
    /// Ordered by prefix specificity, longest first.
    routes: Vec<Route>,
}

impl Router {
    /// Compile every configured route. Any bad target fails the whole build.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, ConfigError> {
        let mut routes = config
            .routes
            .iter()
            .map(|r| Route::compile(r, config))
            .collect::<Result<Vec<_>, _>>()?;

        routes.sort_by(|a, b| b.matcher.len().cmp(&a.matcher.len()));

        let mut prefixes = HashSet::new();
        for route in &routes {
            if !prefixes.insert(route.prefix()) {
                return Err(ConfigError::Route {
                    route: route.name.clone(),
                    reason: format!("duplicate prefix '{}'", route.prefix()),
                });
            }
        }

        Ok(Self { routes })
    }

    /// Longest-prefix match.
    pub fn match_path(&self, path: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.matches(path))
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
}
