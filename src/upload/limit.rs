//! Request body ceiling
//!
//! Wraps an HTTP body as a byte stream that fails once more than `ceiling`
//! bytes have been received. The failure is recorded on a shared
//! [`LimitTripwire`] because the error itself is wrapped (and flattened into a
//! string) by the multipart parser before it reaches the handler.

use bytes::{Buf, Bytes};
use futures::Stream;
use hyper::body::Body;
use hyper::header::{HeaderMap, CONTENT_LENGTH};
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{ready, Context, Poll};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error yielded by [`CappedBody`] when the ceiling is crossed
#[derive(Debug, thiserror::Error)]
#[error("request body exceeds {ceiling} bytes")]
pub struct BodyLimitExceeded {
    pub ceiling: u64,
}

/// Shared flag set when a [`CappedBody`] refuses further bytes
#[derive(Debug, Clone, Default)]
pub struct LimitTripwire(Arc<AtomicBool>);

impl LimitTripwire {
    /// Whether the ceiling has been crossed
    pub fn tripped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn trip(&self) {
        self.0.store(true, Ordering::Release);
    }
}

pin_project! {
    /// Body stream with a hard byte ceiling
    pub struct CappedBody<B> {
        #[pin]
        inner: B,
        ceiling: u64,
        received: u64,
        done: bool,
        tripwire: LimitTripwire,
    }
}

impl<B> CappedBody<B> {
    /// Cap `inner` at `ceiling` bytes
    pub fn new(inner: B, ceiling: u64) -> Self {
        Self {
            inner,
            ceiling,
            received: 0,
            done: false,
            tripwire: LimitTripwire::default(),
        }
    }

    /// Handle for observing the ceiling after the stream has been moved away
    pub fn tripwire(&self) -> LimitTripwire {
        self.tripwire.clone()
    }
}

impl<B> Stream for CappedBody<B>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    type Item = Result<Bytes, BoxError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if *this.done {
                return Poll::Ready(None);
            }

            let frame = match ready!(this.inner.as_mut().poll_frame(cx)) {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => {
                    *this.done = true;
                    return Poll::Ready(Some(Err(e.into())));
                }
                None => {
                    *this.done = true;
                    return Poll::Ready(None);
                }
            };

            // Trailers carry no payload
            let Ok(mut data) = frame.into_data() else {
                continue;
            };

            let len = data.remaining();
            *this.received = this.received.saturating_add(len as u64);

            if *this.received > *this.ceiling {
                *this.done = true;
                this.tripwire.trip();
                return Poll::Ready(Some(Err(Box::new(BodyLimitExceeded {
                    ceiling: *this.ceiling,
                }))));
            }

            return Poll::Ready(Some(Ok(data.copy_to_bytes(len))));
        }
    }
}

/// Compare a declared `Content-Length` against the ceiling.
///
/// Returns the declared length when it is already known to be too large.
/// Missing or unparsable headers pass; the stream ceiling still applies.
pub fn declared_length_exceeds(headers: &HeaderMap, ceiling: u64) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|len| *len > ceiling)
}
