//! PC Store API gateway library.
//!
//! Single entry point in front of the PC Store services (products,
//! inventory, cart, orders, auth, notification, payment). Every request is
//! matched to a route and forwarded through an ordered chain of strategies
//! (gateway proxy, direct service, optional legacy URL params); only
//! transport failures move on to the next strategy.

// Core subsystems
pub mod config;
pub mod error;
pub mod forward;
pub mod http;
pub mod routing;

// Cross-cutting concerns
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;

pub use config::GatewayConfig;
pub use error::{GatewayError, StartupError};
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
