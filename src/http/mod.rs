//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (request ID, trace span, CORS, panic boundary)
//!     → request.rs (method check, buffer body once)
//!     → [routing builds the plan, resilience walks it]
//!     → response.rs (stream upstream response back, tag strategy)
//!     → Send to client
//! ```

pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::{InboundRequest, X_REQUEST_ID};
pub use server::{AppState, GatewayServer};
