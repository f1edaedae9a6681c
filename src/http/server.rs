//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Create the Axum Router with the gateway and health handlers
//! - Wire up middleware (request ID, tracing, CORS, panic boundary)
//! - Dispatch requests: route → idempotency → plan → fallback resolver
//! - Bound every request with the overall deadline
//! - Serve with graceful shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request},
    middleware,
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::validation::validate_config;
use crate::config::{ConfigError, GatewayConfig};
use crate::error::GatewayError;
use crate::forward::{build_client, HttpForwarder};
use crate::health::{GatewayHealth, ServicesReport, StatusReporter};
use crate::http::middleware::{cors_middleware, CorsPolicy};
use crate::http::request::{is_supported_method, request_id, InboundRequest};
use crate::http::response::{into_client_response, panic_response};
use crate::observability::metrics;
use crate::observability::tracing::request_span;
use crate::resilience::timeouts::bounded_body;
use crate::resilience::{Backoff, FallbackResolver, IdempotencyStore, LogicalOperation};
use crate::routing::{build_plan, Router as GatewayRouter};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<GatewayRouter>,
    pub resolver: Arc<FallbackResolver<HttpForwarder>>,
    pub idempotency: Arc<IdempotencyStore>,
    pub status: Arc<StatusReporter>,
    pub max_body_bytes: usize,
    pub request_deadline: Duration,
    pub direct_enabled: bool,
}

/// HTTP server for the gateway.
pub struct GatewayServer {
    app: Router,
    config: GatewayConfig,
}

impl GatewayServer {
    /// Build every subsystem from `config`. Fails on any invalid route,
    /// target URL or header value.
    pub fn new(config: GatewayConfig) -> Result<Self, ConfigError> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let router = Arc::new(GatewayRouter::from_config(&config)?);
        for route in router.routes() {
            tracing::info!(
                route = %route.name,
                prefix = %route.prefix(),
                service = %route.service,
                target = %route.target,
                timeout_ms = route.timeout.as_millis() as u64,
                legacy_params = route.legacy_params,
                "Route registered"
            );
        }

        let client = build_client(&config.timeouts);
        let resolver = Arc::new(FallbackResolver::new(
            HttpForwarder::new(client.clone()),
            Backoff::from_config(&config.fallback),
        ));

        let state = AppState {
            router,
            resolver,
            idempotency: Arc::new(IdempotencyStore::from_config(&config.idempotency)?),
            status: Arc::new(StatusReporter::new(client, &config)?),
            max_body_bytes: config.listener.max_body_bytes,
            request_deadline: Duration::from_secs(config.timeouts.request_secs),
            direct_enabled: config.fallback.direct_enabled,
        };
        let cors = Arc::new(CorsPolicy::from_config(&config.cors)?);

        let app = Self::build_router(state, cors);
        Ok(Self { app, config })
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Layers listed innermost first; CORS sits outside the panic boundary so
    /// panic responses carry CORS headers too.
    fn build_router(state: AppState, cors: Arc<CorsPolicy>) -> Router {
        Router::new()
            .route("/health", get(health_handler).fallback(method_not_allowed))
            .route("/health/services", get(services_health_handler).fallback(method_not_allowed))
            .route("/", any(gateway_handler))
            .route("/{*path}", any(gateway_handler))
            .with_state(state)
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(middleware::from_fn_with_state(cors, cors_middleware))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(request_span))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The fully layered application, for serving or in-process testing.
    pub fn router(&self) -> Router {
        self.app.clone()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Serve on `listener` until `shutdown` fires, then drain in-flight requests.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = self.config.routes.len(),
            services = self.config.services.len(),
            "Gateway listening"
        );

        let app = self.app.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining in-flight requests");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Catch-all gateway handler.
async fn gateway_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let started = Instant::now();
    let request_id = request_id(request.headers());
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let route_label = state
        .router
        .match_path(&path)
        .map(|r| r.name.clone())
        .unwrap_or_else(|| "none".to_string());

    let deadline = state.request_deadline;
    let deadline_at = tokio::time::Instant::now() + deadline;
    let result = match tokio::time::timeout_at(deadline_at, dispatch(&state, request, &request_id, deadline_at)).await {
        Ok(result) => result,
        Err(_) => Err(GatewayError::GatewayTimeout {
            message: format!("Request did not complete within {}s", deadline.as_secs()),
        }),
    };

    let response = match result {
        Ok(response) => response,
        Err(err) => {
            if err.status().is_server_error() {
                tracing::error!(request_id = %request_id, method = %method, path = %path, error = %err, "Request failed");
            } else {
                tracing::warn!(request_id = %request_id, method = %method, path = %path, error = %err, "Request rejected");
            }
            err.into_response()
        }
    };

    metrics::record_request(&route_label, method.as_str(), response.status().as_u16(), started);
    response
}

/// Route, buffer, and resolve one request.
///
/// A client-supplied idempotency key stays reserved until the upstream
/// response head arrives or the request is cancelled. The streamed body
/// stays bounded by the route's attempt timeout between frames and by
/// `deadline_at` overall.
async fn dispatch(
    state: &AppState,
    request: Request<Body>,
    request_id: &str,
    deadline_at: tokio::time::Instant,
) -> Result<Response, GatewayError> {
    let route = state
        .router
        .match_path(request.uri().path())
        .ok_or_else(|| GatewayError::RouteNotFound {
            path: request.uri().path().to_string(),
        })?;

    if !is_supported_method(request.method()) || !route.allows(request.method()) {
        return Err(GatewayError::MethodNotAllowed {
            method: request.method().to_string(),
            route: route.name.clone(),
        });
    }

    let mut inbound = InboundRequest::from_request(request, state.max_body_bytes).await?;
    let _in_flight = state.idempotency.prepare(&mut inbound, request_id)?;

    let operation = LogicalOperation::new(route.name.clone(), &inbound, request_id);
    let plan = build_plan(route, &inbound, state.direct_enabled);

    tracing::debug!(
        request_id = %request_id,
        route = %route.name,
        method = %inbound.method,
        strategies = plan.len(),
        "Dispatching request"
    );

    let mut result = state.resolver.resolve(&operation, &plan, &inbound).await?;
    result.body = bounded_body(result.body, route.timeout, deadline_at);
    Ok(into_client_response(result))
}

async fn health_handler(State(state): State<AppState>) -> Json<GatewayHealth> {
    Json(state.status.gateway())
}

async fn services_health_handler(State(state): State<AppState>) -> Json<ServicesReport> {
    Json(state.status.probe_all().await)
}

async fn method_not_allowed(method: Method) -> GatewayError {
    GatewayError::MethodNotAllowed {
        method: method.to_string(),
        route: "health".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouteConfig;
    use crate::error::ErrorBody;
    use axum::http::{header, StatusCode};
    use tower::ServiceExt;

    fn server() -> GatewayServer {
        GatewayServer::new(GatewayConfig::default()).unwrap()
    }

    async fn json_body(response: Response) -> ErrorBody {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn unknown_path_is_json_404_with_cors() {
        let request = Request::get("/nope").body(Body::empty()).unwrap();
        let response = server().router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(response.headers().contains_key("x-request-id"));
        let body = json_body(response).await;
        assert_eq!(body.error, "Not Found");
        assert!(body.message.contains("/nope"));
    }

    #[tokio::test]
    async fn method_outside_route_set_is_405() {
        let request = Request::get("/login").body(Body::empty()).unwrap();
        let response = server().router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(json_body(response).await.error, "Method Not Allowed");
    }

    #[tokio::test]
    async fn unsupported_method_is_405() {
        let request = Request::builder()
            .method(Method::TRACE)
            .uri("/api/products")
            .body(Body::empty())
            .unwrap();
        let response = server().router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn oversized_body_is_413() {
        let mut config = GatewayConfig::default();
        config.listener.max_body_bytes = 16;
        let server = GatewayServer::new(config).unwrap();

        let request = Request::post("/api/cart")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"items":[1,2,3,4,5,6,7,8,9]}"#))
            .unwrap();
        let response = server.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[tokio::test]
    async fn preflight_never_reaches_routing() {
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/definitely/not/routed")
            .body(Body::empty())
            .unwrap();
        let response = server().router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_MAX_AGE], "86400");
    }

    #[tokio::test]
    async fn gateway_health_is_local() {
        let request = Request::get("/health").body(Body::empty()).unwrap();
        let response = server().router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let health: GatewayHealth = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(health.status, "ok");
        assert_eq!(health.service, "pcstore-gateway");
    }

    #[tokio::test]
    async fn health_rejects_other_methods_as_json() {
        let request = Request::delete("/health").body(Body::empty()).unwrap();
        let response = server().router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(json_body(response).await.error, "Method Not Allowed");
    }

    #[test]
    fn unknown_service_reference_fails_startup() {
        let mut config = GatewayConfig::default();
        config.routes.push(RouteConfig {
            name: "ghost".into(),
            path_prefix: "/api/ghost".into(),
            service: "ghost".into(),
            upstream_prefix: None,
            methods: Vec::new(),
            timeout_ms: None,
            legacy_params: false,
        });
        assert!(GatewayServer::new(config).is_err());
    }
}
