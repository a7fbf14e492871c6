use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use fetchgate_core::RequestKey;
use tokio::sync::oneshot;

use super::Inner;

/// The shared fetch ended without producing an outcome.
///
/// Happens when the fetch task panicked, was aborted, or the runtime shut down
/// before it settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("in-flight fetch was dropped before it settled")]
pub struct Abandoned;

/// One caller's handle on a shared fetch.
///
/// Resolves to the fetch outcome. Dropping the waiter before it resolves
/// detaches the caller, the same as [`cancel`](Waiter::cancel).
#[must_use = "a waiter detaches from its fetch when dropped"]
pub struct Waiter<T> {
    key: RequestKey,
    id: u64,
    inner: Arc<Inner<T>>,
    receiver: oneshot::Receiver<T>,
    started: bool,
    done: bool,
}

impl<T> Waiter<T> {
    pub(super) fn new(
        key: RequestKey,
        id: u64,
        inner: Arc<Inner<T>>,
        receiver: oneshot::Receiver<T>,
        started: bool,
    ) -> Self {
        Self {
            key,
            id,
            inner,
            receiver,
            started,
            done: false,
        }
    }

    /// Key of the fetch this waiter is attached to.
    pub fn key(&self) -> &RequestKey {
        &self.key
    }

    /// Returns `true` if joining started a new fetch, `false` if it attached
    /// to one already in flight.
    pub fn started_fetch(&self) -> bool {
        self.started
    }

    /// Stops waiting. The shared fetch and the other waiters are unaffected.
    ///
    /// Returns `false` if the outcome was already delivered to this waiter.
    pub fn cancel(mut self) -> bool {
        self.detach()
    }

    fn detach(&mut self) -> bool {
        if self.done {
            return false;
        }
        self.done = true;
        self.inner.detach(&self.key, self.id)
    }
}

impl<T> Future for Waiter<T> {
    type Output = Result<T, Abandoned>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        match Pin::new(&mut this.receiver).poll(cx) {
            Poll::Ready(outcome) => {
                this.done = true;
                Poll::Ready(outcome.map_err(|_| Abandoned))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> Drop for Waiter<T> {
    fn drop(&mut self) {
        self.detach();
    }
}

impl<T> std::fmt::Debug for Waiter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Waiter")
            .field("key", &self.key)
            .field("id", &self.id)
            .field("started", &self.started)
            .field("done", &self.done)
            .finish()
    }
}
