//! Health reporting subsystem.
//!
//! # Data Flow
//! ```text
//! GET /health
//!     → status.rs (gateway liveness, no I/O)
//!
//! GET /health/services
//!     → status.rs (probe every service health_path concurrently)
//!     → gateway_service_health gauge updated per service
//! ```

pub mod status;

pub use status::{GatewayHealth, ServiceHealth, ServicesReport, StatusReporter};
