//! Shared utilities for gateway integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::Request;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::IntoResponse;
use axum::Router;
use tokio::net::TcpListener;

use pcstore_gateway::config::GatewayConfig;
use pcstore_gateway::{GatewayServer, Shutdown};

/// One request as a mock service saw it.
#[derive(Debug, Clone)]
pub struct Seen {
    pub method: Method,
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Requests received by a mock service.
#[derive(Clone, Default)]
pub struct Recorder {
    hits: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl Recorder {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    async fn record(&self, request: Request) {
        self.hits.fetch_add(1, Ordering::SeqCst);
        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();
        self.seen.lock().unwrap().push(Seen {
            method: parts.method,
            path_and_query: parts
                .uri
                .path_and_query()
                .map(|pq| pq.to_string())
                .unwrap_or_default(),
            headers: parts.headers,
            body,
        });
    }
}

/// Serve `app` on an ephemeral port.
pub async fn start_backend(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Mock service answering every request with `status` and a JSON `body`
/// after `delay`.
pub async fn recording_backend(status: StatusCode, body: &'static str, delay: Duration) -> (SocketAddr, Recorder) {
    let recorder = Recorder::default();
    let handle = recorder.clone();
    let app = Router::new().fallback(move |request: Request| {
        let handle = handle.clone();
        async move {
            handle.record(request).await;
            tokio::time::sleep(delay).await;
            (status, [("content-type", "application/json")], body).into_response()
        }
    });
    (start_backend(app).await, recorder)
}

/// An address with nothing listening on it.
pub fn unused_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

pub fn url(addr: SocketAddr) -> String {
    format!("http://{}", addr)
}

/// Point `service` at a proxy target and an optional direct address.
pub fn point_service(config: &mut GatewayConfig, service: &str, proxy: SocketAddr, direct: Option<SocketAddr>) {
    let entry = config
        .services
        .iter_mut()
        .find(|s| s.name == service)
        .expect("service exists in default config");
    entry.url = url(proxy);
    entry.direct_url = direct.map(url);
}

/// Default configuration with short attempt deadlines for tests.
pub fn test_config(attempt_ms: u64) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.timeouts.attempt_ms = attempt_ms;
    config.timeouts.health_probe_ms = 500;
    for route in config.routes.iter_mut() {
        route.timeout_ms = None;
    }
    config
}

/// Start a gateway on an ephemeral port.
pub async fn spawn_gateway(config: GatewayConfig) -> (SocketAddr, Shutdown) {
    let server = GatewayServer::new(config).expect("valid test config");
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, receiver).await;
    });
    (addr, shutdown)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .pool_max_idle_per_host(0)
        .build()
        .unwrap()
}
