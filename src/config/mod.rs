//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional) or built-in defaults
//!     → loader.rs (parse & deserialize)
//!     → env.rs (PORT, ALLOWED_ORIGINS, <SERVICE>_SERVICE_URL)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → compiled into Router / CorsPolicy at startup
//! ```
//!
//! Config is loaded once; routes do not change while the process runs.

pub mod env;
pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    CorsConfig, FallbackConfig, GatewayConfig, IdempotencyConfig, ListenerConfig, LogFormat,
    ObservabilityConfig, RouteConfig, ServiceConfig, TimeoutConfig,
};
