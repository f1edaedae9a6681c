//! Fallback plan construction.
//!
//! Turns a matched [`Route`] and an inbound request into the ordered list of
//! attempts the resolver executes:
//!
//! 1. `GatewayProxy`    → configured target + upstream path
//! 2. `DirectService`   → well-known direct address + upstream path
//!    (skipped when disabled or identical to the proxy target)
//! 3. `LegacyUrlParams` → direct address (or target) + upstream path +
//!    `/<percent-encoded body>`; only for routes with `legacy_params` and a
//!    UTF-8 body

use url::Url;

use crate::forward::{ForwardAttempt, Strategy};
use crate::http::request::{method_allows_body, InboundRequest};
use crate::routing::router::Route;

/// Build the ordered attempt list for one request.
pub fn build_plan(route: &Route, request: &InboundRequest, direct_enabled: bool) -> Vec<ForwardAttempt> {
    let path = route.upstream_path(request.path());
    let query = request.query();
    let mut attempts = Vec::with_capacity(3);

    let proxy = join(&route.target, &path, query);
    attempts.push(ForwardAttempt {
        strategy: Strategy::GatewayProxy,
        target: proxy.clone(),
        timeout: route.timeout,
    });

    if direct_enabled {
        if let Some(direct) = &route.direct {
            let direct = join(direct, &path, query);
            if direct != proxy {
                attempts.push(ForwardAttempt {
                    strategy: Strategy::DirectService,
                    target: direct,
                    timeout: route.timeout,
                });
            }
        }
    }

    if route.legacy_params && method_allows_body(&request.method) {
        if let Some(legacy) = legacy_target(route, &path, query, request) {
            attempts.push(ForwardAttempt {
                strategy: Strategy::LegacyUrlParams,
                target: legacy,
                timeout: route.timeout,
            });
        }
    }

    attempts
}

/// `base` with its path extended by `path` and the query replaced.
fn join(base: &Url, path: &str, query: Option<&str>) -> Url {
    let mut url = base.clone();
    let joined = format!("{}{}", base.path().trim_end_matches('/'), path);
    url.set_path(if joined.is_empty() { "/" } else { &joined });
    url.set_query(query);
    url
}

fn legacy_target(route: &Route, path: &str, query: Option<&str>, request: &InboundRequest) -> Option<Url> {
    if request.body.is_empty() {
        return None;
    }
    let payload = std::str::from_utf8(&request.body).ok()?;
    let base = route.direct.as_ref().unwrap_or(&route.target);

    let mut url = join(base, path, query);
    url.path_segments_mut().ok()?.pop_if_empty().push(payload);
    Some(url)
}
