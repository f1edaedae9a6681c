//! Timeout enforcement.
//!
//! # Responsibilities
//! - Bound every forward attempt with its own deadline
//! - Cancel the attempt cleanly on expiry (the future is dropped)
//! - Report expiry as a distinct [`TransportError::Timeout`]
//! - Keep bounding the upstream body after the response head is returned
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Deadlines never carry over between attempts
//! - A streamed body is cut off by an idle limit between frames and by the
//!   request deadline, whichever comes first

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::{Body, Bytes};
use hyper::body::{Body as HttpBody, Frame, SizeHint};
use tokio::time::{Instant, Sleep};
use tower_http::timeout::TimeoutBody;
use url::Url;

use crate::forward::TransportError;

/// Run `fut` with `deadline`; on expiry the future is dropped and a timeout
/// error naming `target` is returned.
pub async fn bounded<T, F>(deadline: Duration, target: &Url, fut: F) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout {
            target: target.to_string(),
            timeout: deadline,
        }),
    }
}

/// The request deadline passed while the response body was streaming.
#[derive(Debug, thiserror::Error)]
#[error("response body still streaming at the request deadline")]
pub struct BodyDeadlineElapsed;

/// Wrap a streaming upstream body so it yields an error once `idle` passes
/// without a frame, or once `deadline` is reached.
///
/// Dropping the erroring body drops the upstream connection with it.
pub fn bounded_body(body: Body, idle: Duration, deadline: Instant) -> Body {
    Body::new(DeadlineBody {
        inner: Body::new(TimeoutBody::new(idle, body)),
        deadline: Box::pin(tokio::time::sleep_until(deadline)),
    })
}

struct DeadlineBody {
    inner: Body,
    deadline: Pin<Box<Sleep>>,
}

impl HttpBody for DeadlineBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        if self.deadline.as_mut().poll(cx).is_ready() {
            return Poll::Ready(Some(Err(axum::Error::new(BodyDeadlineElapsed))));
        }
        Pin::new(&mut self.inner).poll_frame(cx)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
