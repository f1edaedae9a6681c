//! Fallback resolution.
//!
//! # Responsibilities
//! - Execute a plan of forward attempts strictly one after another
//! - Stop at the first upstream response, whatever its status
//! - Advance only on transport failure (refused, unreachable, timeout, protocol)
//! - Turn exhaustion into a 502/504 carrying the last underlying error
//!
//! # Data Flow
//! ```text
//! plan: [GatewayProxy, DirectService, LegacyUrlParams]
//!     → attempt 1 (own deadline) ── response ──▶ return verbatim
//!          │ transport error
//!          ▼ (optional backoff)
//!     → attempt 2 (fresh deadline) ── response ──▶ return verbatim
//!          │ transport error
//!          ▼
//!     → ... → exhausted: all timed out → 504, otherwise → 502
//! ```
//!
//! # Design Decisions
//! - Upstream 5xx is final: the service received the request, so replaying
//!   a POST elsewhere could execute it twice
//! - Never more than one attempt in flight per request

use std::time::Duration;

use axum::http::Method;
use tokio::time::Instant;

use crate::error::GatewayError;
use crate::forward::{ForwardAttempt, ForwardResult, Forwarder, TransportError};
use crate::http::request::InboundRequest;
use crate::observability::metrics;
use crate::resilience::backoff::Backoff;
use crate::resilience::idempotency::needs_key;
use crate::resilience::timeouts::bounded;

/// The client call a plan executes on behalf of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalOperation {
    /// Name of the matched route.
    pub route: String,
    pub method: Method,
    pub request_id: String,
    /// Safe to execute more than once without a key.
    pub idempotent: bool,
}

impl LogicalOperation {
    pub fn new(route: impl Into<String>, request: &InboundRequest, request_id: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            method: request.method.clone(),
            request_id: request_id.into(),
            idempotent: !needs_key(&request.method),
        }
    }
}

/// Runs fallback plans against a [`Forwarder`].
#[derive(Debug, Clone)]
pub struct FallbackResolver<F> {
    forwarder: F,
    backoff: Backoff,
}

impl<F: Forwarder> FallbackResolver<F> {
    pub fn new(forwarder: F, backoff: Backoff) -> Self {
        Self { forwarder, backoff }
    }

    pub fn forwarder(&self) -> &F {
        &self.forwarder
    }

    /// Execute `attempts` in order and return the first upstream response.
    pub async fn resolve(
        &self,
        operation: &LogicalOperation,
        attempts: &[ForwardAttempt],
        request: &InboundRequest,
    ) -> Result<ForwardResult, GatewayError> {
        let mut last_error: Option<TransportError> = None;
        let mut all_timed_out = true;

        for (index, attempt) in attempts.iter().enumerate() {
            let pause = self.backoff.delay(index as u32);
            if !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }

            let started = Instant::now();
            let outcome = bounded(
                attempt.timeout,
                &attempt.target,
                self.forwarder.forward(attempt, request),
            )
            .await;

            match outcome {
                Ok(result) => {
                    metrics::record_forward_attempt(attempt.strategy, "response");
                    tracing::info!(
                        request_id = %operation.request_id,
                        route = %operation.route,
                        strategy = %attempt.strategy,
                        target = %attempt.target,
                        status = result.status.as_u16(),
                        attempt = index + 1,
                        elapsed_ms = millis(started.elapsed()),
                        "Upstream responded"
                    );
                    return Ok(result);
                }
                Err(err) => {
                    metrics::record_forward_attempt(attempt.strategy, err.kind());
                    tracing::warn!(
                        request_id = %operation.request_id,
                        route = %operation.route,
                        strategy = %attempt.strategy,
                        target = %attempt.target,
                        idempotent = operation.idempotent,
                        attempt = index + 1,
                        remaining = attempts.len() - index - 1,
                        elapsed_ms = millis(started.elapsed()),
                        error = %err,
                        "Forward attempt failed"
                    );
                    all_timed_out &= err.is_timeout();
                    last_error = Some(err);
                }
            }
        }

        let Some(last) = last_error else {
            tracing::error!(
                request_id = %operation.request_id,
                route = %operation.route,
                "No forwarding strategy available"
            );
            return Err(GatewayError::ServiceUnavailable {
                message: format!("No forwarding strategy available for route '{}'", operation.route),
            });
        };

        metrics::record_fallback_exhausted(&operation.route);
        tracing::error!(
            request_id = %operation.request_id,
            route = %operation.route,
            method = %operation.method,
            strategies = attempts.len(),
            error = %last,
            "All forwarding strategies failed"
        );

        if all_timed_out {
            Err(GatewayError::GatewayTimeout {
                message: format!(
                    "No upstream responded in time after {} strategies; last error: {}",
                    attempts.len(),
                    last
                ),
            })
        } else {
            Err(GatewayError::BadGateway {
                message: format!(
                    "All {} forwarding strategies failed; last error: {}",
                    attempts.len(),
                    last
                ),
            })
        }
    }
}

fn millis(elapsed: Duration) -> u64 {
    elapsed.as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forward::Strategy;
    use axum::body::{Body, Bytes};
    use axum::http::{HeaderMap, StatusCode};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use url::Url;

    #[derive(Clone)]
    enum Behavior {
        Respond { status: StatusCode, body: &'static str, after: Duration },
        Refuse,
        Hang,
    }

    #[derive(Debug, Clone)]
    struct Call {
        strategy: Strategy,
        at: Instant,
        authorization: Option<String>,
        idempotency_key: Option<String>,
    }

    #[derive(Default)]
    struct Tracker {
        calls: Mutex<Vec<Call>>,
        active: AtomicUsize,
        max_active: AtomicUsize,
    }

    struct ActiveGuard(Arc<Tracker>);

    impl Drop for ActiveGuard {
        fn drop(&mut self) {
            self.0.active.fetch_sub(1, Ordering::SeqCst);
        }
    }

    struct ScriptedForwarder {
        script: HashMap<Strategy, Behavior>,
        tracker: Arc<Tracker>,
    }

    impl ScriptedForwarder {
        fn new(script: &[(Strategy, Behavior)]) -> Self {
            Self {
                script: script.iter().cloned().collect(),
                tracker: Arc::new(Tracker::default()),
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.tracker.calls.lock().unwrap().clone()
        }

        fn strategies(&self) -> Vec<Strategy> {
            self.calls().iter().map(|c| c.strategy).collect()
        }
    }

    impl Forwarder for ScriptedForwarder {
        async fn forward(
            &self,
            attempt: &ForwardAttempt,
            request: &InboundRequest,
        ) -> Result<ForwardResult, TransportError> {
            self.tracker.calls.lock().unwrap().push(Call {
                strategy: attempt.strategy,
                at: Instant::now(),
                authorization: request.header_str("authorization").map(String::from),
                idempotency_key: request.header_str("idempotency-key").map(String::from),
            });
            let now = self.tracker.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.tracker.max_active.fetch_max(now, Ordering::SeqCst);
            let _active = ActiveGuard(Arc::clone(&self.tracker));

            match self.script.get(&attempt.strategy).cloned().unwrap_or(Behavior::Refuse) {
                Behavior::Respond { status, body, after } => {
                    tokio::time::sleep(after).await;
                    Ok(ForwardResult {
                        status,
                        headers: HeaderMap::new(),
                        body: Body::from(body),
                        strategy: attempt.strategy,
                    })
                }
                Behavior::Refuse => Err(TransportError::ConnectionRefused {
                    target: attempt.target.to_string(),
                }),
                Behavior::Hang => std::future::pending().await,
            }
        }
    }

    fn attempt(strategy: Strategy, port: u16, timeout: Duration) -> ForwardAttempt {
        ForwardAttempt {
            strategy,
            target: Url::parse(&format!("http://localhost:{}/api/auth/users", port)).unwrap(),
            timeout,
        }
    }

    fn full_plan(timeout: Duration) -> Vec<ForwardAttempt> {
        vec![
            attempt(Strategy::GatewayProxy, 8000, timeout),
            attempt(Strategy::DirectService, 3005, timeout),
            attempt(Strategy::LegacyUrlParams, 3005, timeout),
        ]
    }

    fn request() -> InboundRequest {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer tok-123".parse().unwrap());
        headers.insert("idempotency-key", "key-1".parse().unwrap());
        InboundRequest {
            method: Method::POST,
            uri: "/api/auth/users".parse().unwrap(),
            headers,
            body: Bytes::from_static(br#"{"name":"ada"}"#),
            client_addr: None,
        }
    }

    fn operation(req: &InboundRequest) -> LogicalOperation {
        LogicalOperation::new("auth", req, "req-1")
    }

    fn ok(status: StatusCode, body: &'static str) -> Behavior {
        Behavior::Respond { status, body, after: Duration::ZERO }
    }

    async fn body_of(result: ForwardResult) -> Bytes {
        axum::body::to_bytes(result.body, usize::MAX).await.unwrap()
    }

    #[tokio::test]
    async fn strategies_run_in_order_one_at_a_time() {
        let forwarder = ScriptedForwarder::new(&[
            (Strategy::GatewayProxy, Behavior::Refuse),
            (Strategy::DirectService, Behavior::Refuse),
            (Strategy::LegacyUrlParams, ok(StatusCode::OK, "legacy")),
        ]);
        let resolver = FallbackResolver::new(forwarder, Backoff::none());
        let req = request();

        let result = resolver
            .resolve(&operation(&req), &full_plan(Duration::from_secs(1)), &req)
            .await
            .unwrap();

        assert_eq!(result.strategy, Strategy::LegacyUrlParams);
        assert_eq!(body_of(result).await, "legacy");
        let forwarder = resolver.forwarder();
        assert_eq!(
            forwarder.strategies(),
            vec![Strategy::GatewayProxy, Strategy::DirectService, Strategy::LegacyUrlParams]
        );
        assert_eq!(forwarder.tracker.max_active.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn upstream_response_is_final() {
        for status in [StatusCode::NOT_FOUND, StatusCode::UNAUTHORIZED, StatusCode::SERVICE_UNAVAILABLE] {
            let forwarder = ScriptedForwarder::new(&[
                (Strategy::GatewayProxy, ok(status, "upstream says no")),
                (Strategy::DirectService, ok(StatusCode::OK, "should not be reached")),
            ]);
            let resolver = FallbackResolver::new(forwarder, Backoff::none());
            let req = request();

            let result = resolver
                .resolve(&operation(&req), &full_plan(Duration::from_secs(1)), &req)
                .await
                .unwrap();

            assert_eq!(result.status, status);
            assert_eq!(body_of(result).await, "upstream says no");
            assert_eq!(resolver.forwarder().strategies(), vec![Strategy::GatewayProxy]);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn next_strategy_gets_a_fresh_deadline() {
        let forwarder = ScriptedForwarder::new(&[
            (Strategy::GatewayProxy, Behavior::Hang),
            (
                Strategy::DirectService,
                Behavior::Respond {
                    status: StatusCode::OK,
                    body: "slow but in time",
                    after: Duration::from_millis(9_500),
                },
            ),
        ]);
        let resolver = FallbackResolver::new(forwarder, Backoff::none());
        let req = request();
        let plan = full_plan(Duration::from_secs(10));

        let result = resolver.resolve(&operation(&req), &plan[..2], &req).await.unwrap();

        assert_eq!(result.status, StatusCode::OK);
        let calls = resolver.forwarder().calls();
        let gap = calls[1].at - calls[0].at;
        assert!(gap >= Duration::from_secs(10) && gap < Duration::from_millis(10_050), "{:?}", gap);
    }

    #[tokio::test]
    async fn refused_everywhere_is_bad_gateway() {
        let forwarder = ScriptedForwarder::new(&[]);
        let resolver = FallbackResolver::new(forwarder, Backoff::none());
        let req = request();

        let err = resolver
            .resolve(&operation(&req), &full_plan(Duration::from_secs(1)), &req)
            .await
            .unwrap_err();

        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        let message = err.to_string();
        assert!(message.contains("All 3 forwarding strategies failed"), "{}", message);
        assert!(message.contains("connection refused by http://localhost:3005/"), "{}", message);
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_everywhere_is_gateway_timeout() {
        let forwarder = ScriptedForwarder::new(&[
            (Strategy::GatewayProxy, Behavior::Hang),
            (Strategy::DirectService, Behavior::Hang),
        ]);
        let resolver = FallbackResolver::new(forwarder, Backoff::none());
        let req = request();
        let plan = full_plan(Duration::from_secs(2));

        let err = resolver.resolve(&operation(&req), &plan[..2], &req).await.unwrap_err();

        assert_eq!(err.status(), StatusCode::GATEWAY_TIMEOUT);
        assert!(err.to_string().contains("did not respond within 2000ms"));
        assert_eq!(resolver.forwarder().tracker.active.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn mixed_failures_are_bad_gateway() {
        let forwarder = ScriptedForwarder::new(&[
            (Strategy::GatewayProxy, Behavior::Hang),
            (Strategy::DirectService, Behavior::Refuse),
        ]);
        let resolver = FallbackResolver::new(forwarder, Backoff::none());
        let req = request();
        let plan = full_plan(Duration::from_secs(1));

        let err = resolver.resolve(&operation(&req), &plan[..2], &req).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn empty_plan_is_service_unavailable() {
        let resolver = FallbackResolver::new(ScriptedForwarder::new(&[]), Backoff::none());
        let req = request();

        let err = resolver.resolve(&operation(&req), &[], &req).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(resolver.forwarder().calls().is_empty());
    }

    #[tokio::test]
    async fn every_attempt_sees_the_same_credentials_and_key() {
        let forwarder = ScriptedForwarder::new(&[
            (Strategy::GatewayProxy, Behavior::Refuse),
            (Strategy::DirectService, ok(StatusCode::CREATED, "{}")),
        ]);
        let resolver = FallbackResolver::new(forwarder, Backoff::none());
        let req = request();

        resolver
            .resolve(&operation(&req), &full_plan(Duration::from_secs(1)), &req)
            .await
            .unwrap();

        let calls = resolver.forwarder().calls();
        assert_eq!(calls.len(), 2);
        for call in calls {
            assert_eq!(call.authorization.as_deref(), Some("Bearer tok-123"));
            assert_eq!(call.idempotency_key.as_deref(), Some("key-1"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_pauses_between_strategies() {
        let forwarder = ScriptedForwarder::new(&[
            (Strategy::GatewayProxy, Behavior::Refuse),
            (Strategy::DirectService, ok(StatusCode::OK, "")),
        ]);
        let resolver = FallbackResolver::new(forwarder, Backoff::new(100, 1_000));
        let req = request();

        resolver
            .resolve(&operation(&req), &full_plan(Duration::from_secs(1)), &req)
            .await
            .unwrap();

        let calls = resolver.forwarder().calls();
        let gap = calls[1].at - calls[0].at;
        assert!(gap >= Duration::from_millis(100) && gap < Duration::from_millis(120), "{:?}", gap);
    }

    #[tokio::test(start_paused = true)]
    async fn proxy_timeout_then_direct_success_takes_about_ten_seconds() {
        let forwarder = ScriptedForwarder::new(&[
            (Strategy::GatewayProxy, Behavior::Hang),
            (
                Strategy::DirectService,
                Behavior::Respond {
                    status: StatusCode::OK,
                    body: r#"{"message":"updated"}"#,
                    after: Duration::from_millis(200),
                },
            ),
        ]);
        let resolver = FallbackResolver::new(forwarder, Backoff::none());
        let req = request();
        let plan = full_plan(Duration::from_secs(10));

        let started = Instant::now();
        let result = resolver.resolve(&operation(&req), &plan[..2], &req).await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(result.status, StatusCode::OK);
        assert_eq!(result.strategy, Strategy::DirectService);
        assert_eq!(body_of(result).await, r#"{"message":"updated"}"#);
        assert!(elapsed >= Duration::from_millis(10_200), "{:?}", elapsed);
        assert!(elapsed < Duration::from_millis(10_300), "{:?}", elapsed);
    }
}
