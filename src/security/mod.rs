//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request:
//!     → headers.rs (strip hop-by-hop, add X-Forwarded-*)
//!     → forwarded upstream
//! Upstream response:
//!     → headers.rs (strip hop-by-hop)
//!     → returned to client
//! ```

pub mod headers;
