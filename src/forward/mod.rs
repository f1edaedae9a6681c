//! Request forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! ForwardAttempt (strategy, target URL, deadline) + InboundRequest
//!     → client.rs (build outbound request, copy headers/body, send)
//!     → Ok(ForwardResult)      upstream answered (any status), body streaming
//!     → Err(TransportError)    refused / unreachable / protocol failure
//! ```

pub mod attempt;
pub mod client;
pub mod error;

pub use attempt::{ForwardAttempt, ForwardResult, Strategy};
pub use client::{build_client, Forwarder, HttpClient, HttpForwarder};
pub use error::TransportError;
