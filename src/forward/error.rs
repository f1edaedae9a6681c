//! Transport-level failures of a single forward attempt.
//!
//! These are the only errors that advance the fallback chain. An upstream
//! that answers with any HTTP status is not a transport failure.

use std::error::Error as StdError;
use std::time::Duration;

use thiserror::Error;

/// Why a forward attempt produced no upstream response.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// TCP connect was actively refused.
    #[error("connection refused by {target}")]
    ConnectionRefused { target: String },

    /// DNS resolution or another connect-phase failure.
    #[error("{target} unreachable: {reason}")]
    Unreachable { target: String, reason: String },

    /// The attempt's deadline expired; the outbound connection was dropped.
    #[error("{target} did not respond within {}ms", .timeout.as_millis())]
    Timeout { target: String, timeout: Duration },

    /// Connected, but the exchange failed (reset, malformed response).
    #[error("protocol error talking to {target}: {reason}")]
    Protocol { target: String, reason: String },
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout { .. })
    }

    /// Short label used in metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            TransportError::ConnectionRefused { .. } => "connection_refused",
            TransportError::Unreachable { .. } => "unreachable",
            TransportError::Timeout { .. } => "timeout",
            TransportError::Protocol { .. } => "protocol",
        }
    }

    /// Classify an error returned by the hyper-util client.
    pub fn from_client_error(target: &str, err: &hyper_util::client::legacy::Error) -> Self {
        let target = target.to_string();
        let reason = error_chain(err);

        if err.is_connect() {
            if io_kind(err) == Some(std::io::ErrorKind::ConnectionRefused) {
                return TransportError::ConnectionRefused { target };
            }
            return TransportError::Unreachable { target, reason };
        }

        TransportError::Protocol { target, reason }
    }
}

/// First `io::ErrorKind` found in the source chain.
fn io_kind(err: &(dyn StdError + 'static)) -> Option<std::io::ErrorKind> {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            return Some(io.kind());
        }
        current = e.source();
    }
    None
}

/// Render an error and its sources as `outer: inner: root`.
fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut current = err.source();
    while let Some(e) = current {
        let text = e.to_string();
        if parts.last() != Some(&text) {
            parts.push(text);
        }
        current = e.source();
    }
    parts.join(": ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_display_includes_deadline() {
        let err = TransportError::Timeout {
            target: "http://localhost:3005/api/auth/users".into(),
            timeout: Duration::from_millis(10_000),
        };
        assert_eq!(
            err.to_string(),
            "http://localhost:3005/api/auth/users did not respond within 10000ms"
        );
        assert!(err.is_timeout());
        assert_eq!(err.kind(), "timeout");
    }

    #[test]
    fn io_kind_walks_sources() {
        #[derive(Debug, Error)]
        #[error("wrapper")]
        struct Wrapper(#[source] std::io::Error);

        let err = Wrapper(std::io::Error::from(std::io::ErrorKind::ConnectionRefused));
        assert_eq!(io_kind(&err), Some(std::io::ErrorKind::ConnectionRefused));
        assert_eq!(error_chain(&err), "wrapper: connection refused");
    }
}
