//! Idempotency keys for non-idempotent operations.
//!
//! # Responsibilities
//! - Ensure every POST/PATCH carries an idempotency key before the first
//!   attempt, so all fallback attempts send the same key downstream
//! - Reject a concurrent duplicate of a client-supplied key (409)
//!
//! # Design Decisions
//! - Only client-supplied keys are tracked; generated keys are unique
//! - Tracking lasts exactly as long as the request (guard dropped on return)
//! - No response replay; deduplication beyond in-flight is downstream's job

use std::sync::Arc;
use std::time::Instant;

use axum::http::{HeaderName, HeaderValue, Method};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::config::validation::ValidationError;
use crate::config::{ConfigError, IdempotencyConfig};
use crate::error::GatewayError;
use crate::http::request::InboundRequest;

/// Methods that may execute twice if replayed without a key.
pub fn needs_key(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PATCH)
}

/// In-flight set of client-supplied idempotency keys.
#[derive(Debug)]
pub struct IdempotencyStore {
    enabled: bool,
    header: HeaderName,
    /// Key → when the original request reserved it.
    in_flight: DashMap<String, Instant>,
}

impl IdempotencyStore {
    pub fn from_config(config: &IdempotencyConfig) -> Result<Self, ConfigError> {
        let header = HeaderName::from_bytes(config.header.as_bytes()).map_err(|e| {
            ConfigError::Validation(vec![ValidationError::new("idempotency.header", e.to_string())])
        })?;
        Ok(Self {
            enabled: config.enabled,
            header,
            in_flight: DashMap::new(),
        })
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Attach a key to `request` when its method needs one.
    ///
    /// Returns a guard while a client-supplied key is tracked; dropping it
    /// releases the key.
    pub fn prepare(
        self: &Arc<Self>,
        request: &mut InboundRequest,
        request_id: &str,
    ) -> Result<Option<InFlightGuard>, GatewayError> {
        if !self.enabled || !needs_key(&request.method) {
            return Ok(None);
        }

        let supplied = match request.headers.get(&self.header) {
            Some(value) => Some(
                value
                    .to_str()
                    .map_err(|_| GatewayError::BadRequest {
                        message: format!("{} header must be visible ASCII", self.header),
                    })?
                    .to_string(),
            ),
            None => None,
        };

        let Some(key) = supplied else {
            let generated = Uuid::new_v4().to_string();
            tracing::debug!(
                request_id = %request_id,
                idempotency_key = %generated,
                "Generated idempotency key"
            );
            if let Ok(value) = HeaderValue::from_str(&generated) {
                request.headers.insert(self.header.clone(), value);
            }
            return Ok(None);
        };

        match self.in_flight.entry(key.clone()) {
            Entry::Occupied(original) => {
                tracing::warn!(
                    request_id = %request_id,
                    idempotency_key = %key,
                    original_in_flight_ms = original.get().elapsed().as_millis() as u64,
                    "Duplicate request while original is in flight"
                );
                Err(GatewayError::DuplicateRequest { key })
            }
            Entry::Vacant(slot) => {
                slot.insert(Instant::now());
                Ok(Some(InFlightGuard {
                    store: Arc::clone(self),
                    key,
                }))
            }
        }
    }
}

/// Releases a tracked key on drop, including when the request is cancelled.
#[derive(Debug)]
pub struct InFlightGuard {
    store: Arc<IdempotencyStore>,
    key: String,
}

impl InFlightGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.store.in_flight.remove(&self.key);
    }
}
