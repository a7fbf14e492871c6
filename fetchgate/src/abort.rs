//! Caller-side cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Shared {
    aborted: AtomicBool,
    notify: Notify,
}

/// Cancels one intercepted request from anywhere.
///
/// Clones control the same request. Aborting affects only the request the
/// handle belongs to: a shared fetch keeps running for the other callers.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
    shared: Arc<Shared>,
}

impl AbortHandle {
    /// Creates a handle that is not aborted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Aborts the request. Calling it again has no effect.
    pub fn abort(&self) {
        if !self.shared.aborted.swap(true, Ordering::AcqRel) {
            self.shared.notify.notify_waiters();
        }
    }

    /// Returns `true` once [`abort`](Self::abort) has been called.
    pub fn is_aborted(&self) -> bool {
        self.shared.aborted.load(Ordering::Acquire)
    }

    /// Completes when the request is aborted.
    pub async fn aborted(&self) {
        let notified = self.shared.notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so an abort in between is not lost.
        notified.as_mut().enable();
        if self.is_aborted() {
            return;
        }
        notified.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn aborted_completes_after_abort() {
        let handle = AbortHandle::new();
        let remote = handle.clone();
        let task = tokio::spawn(async move { remote.aborted().await });

        tokio::task::yield_now().await;
        handle.abort();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn already_aborted_completes_immediately() {
        let handle = AbortHandle::new();
        handle.abort();
        handle.abort();
        assert!(handle.is_aborted());
        handle.aborted().await;
    }
}
