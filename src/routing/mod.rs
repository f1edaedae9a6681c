//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request path
//!     → router.rs (longest-prefix lookup)
//!     → matcher.rs (segment-boundary prefix test)
//!     → Return: matched Route or NoMatch (404)
//!     → plan.rs (ordered ForwardAttempts for the fallback resolver)
//!
//! Route Compilation (at startup):
//!     RouteConfig[] + ServiceConfig[]
//!     → parse target URLs (fail fast)
//!     → sort by prefix length
//!     → freeze as immutable Router
//! ```

pub mod matcher;
pub mod plan;
pub mod router;

pub use plan::build_plan;
pub use router::{Route, Router};
