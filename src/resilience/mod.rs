//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request with a plan:
//!     → idempotency.rs (attach/track Idempotency-Key for POST/PATCH)
//!     → fallback.rs (walk the plan sequentially)
//!         → timeouts.rs (per-attempt deadline)
//!         → backoff.rs (optional pause before the next strategy)
//!     → timeouts.rs (winning body bounded while it streams)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every upstream call has a deadline
//! - Only transport failures move to the next strategy
//! - Non-idempotent operations carry one key across all attempts

pub mod backoff;
pub mod fallback;
pub mod idempotency;
pub mod timeouts;

pub use backoff::Backoff;
pub use fallback::{FallbackResolver, LogicalOperation};
pub use idempotency::{IdempotencyStore, InFlightGuard};
