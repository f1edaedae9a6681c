//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, pretty or JSON)
//!     → metrics.rs (counters, gauges, histograms)
//!     → tracing.rs (per-request span carrying request_id)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```

pub mod logging;
pub mod metrics;
pub mod tracing;
