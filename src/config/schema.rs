//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files, and
//! every section has defaults so an empty file (or no file) yields a working
//! gateway for the PC Store services on localhost.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Cross-origin header policy.
    pub cors: CorsConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Fallback strategy settings.
    pub fallback: FallbackConfig,

    /// Idempotency key handling for non-idempotent methods.
    pub idempotency: IdempotencyConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Downstream service definitions.
    pub services: Vec<ServiceConfig>,

    /// Route definitions mapping path prefixes to services.
    pub routes: Vec<RouteConfig>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            cors: CorsConfig::default(),
            timeouts: TimeoutConfig::default(),
            fallback: FallbackConfig::default(),
            idempotency: IdempotencyConfig::default(),
            observability: ObservabilityConfig::default(),
            services: default_services(),
            routes: default_routes(),
        }
    }
}

impl GatewayConfig {
    /// Look up a service definition by name.
    pub fn service(&self, name: &str) -> Option<&ServiceConfig> {
        self.services.iter().find(|s| s.name == name)
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Maximum inbound body size buffered for forwarding.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Cross-origin resource sharing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Allowed origins. `["*"]` allows any origin.
    pub allowed_origins: Vec<String>,

    /// Methods advertised in `Access-Control-Allow-Methods`.
    pub allowed_methods: Vec<String>,

    /// Headers advertised in `Access-Control-Allow-Headers`.
    pub allowed_headers: Vec<String>,

    /// Preflight cache lifetime in seconds.
    pub max_age_secs: u64,

    /// Emit `Access-Control-Allow-Credentials: true`.
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            allowed_methods: ["GET", "POST", "PUT", "DELETE", "PATCH", "OPTIONS"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            allowed_headers: [
                "Content-Type",
                "Authorization",
                "X-Requested-With",
                "Idempotency-Key",
                "X-Request-ID",
            ]
            .iter()
            .map(|h| h.to_string())
            .collect(),
            max_age_secs: 86_400,
            allow_credentials: false,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Default deadline for a single forward attempt in milliseconds.
    pub attempt_ms: u64,

    /// Deadline for the whole inbound request (all attempts) in seconds.
    pub request_secs: u64,

    /// Idle pooled upstream connections are closed after this many seconds.
    pub pool_idle_secs: u64,

    /// Deadline for a single downstream health probe in milliseconds.
    pub health_probe_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            attempt_ms: 10_000,
            request_secs: 60,
            pool_idle_secs: 90,
            health_probe_ms: 3_000,
        }
    }
}

/// Fallback strategy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Try the service's well-known direct address after the proxy target.
    pub direct_enabled: bool,

    /// Base pause between strategies in milliseconds (0 disables).
    pub backoff_base_ms: u64,

    /// Upper bound for the pause between strategies in milliseconds.
    pub backoff_max_ms: u64,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            direct_enabled: true,
            backoff_base_ms: 0,
            backoff_max_ms: 1_000,
        }
    }
}

/// Idempotency key configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IdempotencyConfig {
    /// Attach a stable key to every attempt of a POST/PATCH request.
    pub enabled: bool,

    /// Header carrying the key.
    pub header: String,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            header: "idempotency-key".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Downstream service definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Service name; also selects the `<NAME>_SERVICE_URL` override.
    pub name: String,

    /// Target the gateway proxies to (e.g., "http://products:3001").
    pub url: String,

    /// Well-known direct address tried when the target fails.
    #[serde(default)]
    pub direct_url: Option<String>,

    /// Path probed by the status endpoint.
    #[serde(default = "default_health_path")]
    pub health_path: String,
}

fn default_health_path() -> String {
    "/health".to_string()
}

/// Route configuration mapping a path prefix to a service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics.
    pub name: String,

    /// Path prefix to match (segment boundary, longest wins).
    pub path_prefix: String,

    /// Service this route forwards to.
    pub service: String,

    /// Replacement for the matched prefix on the upstream path.
    #[serde(default)]
    pub upstream_prefix: Option<String>,

    /// Allowed methods; empty allows every supported method.
    #[serde(default)]
    pub methods: Vec<String>,

    /// Per-attempt deadline override in milliseconds.
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Enable the URL-encoded body fallback for this route.
    #[serde(default)]
    pub legacy_params: bool,
}

/// Well-known local ports of the PC Store services.
const SERVICE_PORTS: [(&str, u16); 7] = [
    ("products", 3001),
    ("inventory", 3002),
    ("cart", 3003),
    ("orders", 3004),
    ("auth", 3005),
    ("notification", 3006),
    ("payment", 3007),
];

fn default_services() -> Vec<ServiceConfig> {
    SERVICE_PORTS
        .iter()
        .map(|(name, port)| {
            let local = format!("http://localhost:{}", port);
            ServiceConfig {
                name: name.to_string(),
                url: local.clone(),
                direct_url: Some(local),
                health_path: default_health_path(),
            }
        })
        .collect()
}

fn default_routes() -> Vec<RouteConfig> {
    let mut routes: Vec<RouteConfig> = SERVICE_PORTS
        .iter()
        .map(|(name, _)| RouteConfig {
            name: name.to_string(),
            path_prefix: format!("/api/{}", name),
            service: name.to_string(),
            upstream_prefix: None,
            methods: Vec::new(),
            timeout_ms: if *name == "orders" { Some(15_000) } else { None },
            legacy_params: false,
        })
        .collect();

    routes.push(RouteConfig {
        name: "users".to_string(),
        path_prefix: "/api/users".to_string(),
        service: "auth".to_string(),
        upstream_prefix: None,
        methods: Vec::new(),
        timeout_ms: None,
        legacy_params: false,
    });

    for (name, upstream) in [("register", "/api/auth/register"), ("login", "/api/auth/login")] {
        routes.push(RouteConfig {
            name: name.to_string(),
            path_prefix: format!("/{}", name),
            service: "auth".to_string(),
            upstream_prefix: Some(upstream.to_string()),
            methods: vec!["POST".to_string()],
            timeout_ms: None,
            legacy_params: false,
        });
    }

    routes.push(RouteConfig {
        name: "update".to_string(),
        path_prefix: "/update".to_string(),
        service: "orders".to_string(),
        upstream_prefix: Some("/api/orders/update".to_string()),
        methods: vec!["PUT".to_string(), "POST".to_string()],
        timeout_ms: Some(15_000),
        legacy_params: true,
    });

    routes
}
