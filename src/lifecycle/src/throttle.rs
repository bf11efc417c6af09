//! Rate limiting for provider listings.
//!
//! Provider APIs throttle per account and region. Instead of pausing after
//! every element, a listing is wrapped in [`Throttled`], which pauses once
//! after the wrapped sequence has been traversed completely. A traversal
//! abandoned early does not pause.

use futures::Stream;
use futures::stream::{self, Iter};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use std::time::Duration;
use tokio::time::Sleep;

/// Pause applied after each complete listing traversal.
///
/// A zero pause disables throttling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimiter {
    pause: Duration,
}

impl RateLimiter {
    pub fn new(pause: Duration) -> Self {
        Self { pause }
    }

    /// A limiter that never pauses.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn pause(&self) -> Duration {
        self.pause
    }

    pub fn is_enabled(&self) -> bool {
        !self.pause.is_zero()
    }

    /// Wraps a stream so that it pauses after yielding its last item.
    pub fn throttle<S: Stream + Unpin>(&self, inner: S) -> Throttled<S> {
        Throttled {
            inner,
            pause: self.pause,
            sleep: None,
            finished: false,
        }
    }

    /// Wraps an in-memory sequence, typically a provider listing.
    pub fn throttle_iter<I>(&self, items: I) -> Throttled<Iter<I::IntoIter>>
    where
        I: IntoIterator,
        I::IntoIter: Unpin,
    {
        self.throttle(stream::iter(items))
    }
}

/// A stream that sleeps for a fixed pause once its inner stream is exhausted.
#[derive(Debug)]
pub struct Throttled<S> {
    inner: S,
    pause: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
    finished: bool,
}

impl<S: Stream + Unpin> Stream for Throttled<S> {
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;

        loop {
            if this.finished {
                return Poll::Ready(None);
            }

            if let Some(sleep) = this.sleep.as_mut() {
                ready!(sleep.as_mut().poll(cx));
                this.sleep = None;
                this.finished = true;
                continue;
            }

            match ready!(Pin::new(&mut this.inner).poll_next(cx)) {
                Some(item) => return Poll::Ready(Some(item)),
                None if this.pause.is_zero() => this.finished = true,
                None => {
                    tracing::debug!(pause = ?this.pause, "Listing traversed, pausing");
                    this.sleep = Some(Box::pin(tokio::time::sleep(this.pause)));
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.finished || self.sleep.is_some() {
            (0, Some(0))
        } else {
            self.inner.size_hint()
        }
    }
}
