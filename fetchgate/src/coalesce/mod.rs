//! In-flight request coalescing.
//!
//! When many callers ask for the same resource at once, only one of them
//! should go to the network. [`Coalescer`] keeps a table of the fetches that
//! are currently outstanding, keyed by [`RequestKey`]:
//!
//! - the first [`join`](Coalescer::join) for an idle key spawns the shared
//!   fetch and registers the caller as its first waiter;
//! - every later `join` for that key, until the fetch settles, only registers
//!   another waiter;
//! - when the fetch settles its entry is removed from the table and the
//!   outcome is delivered to every waiter, in the order they joined.
//!
//! Each caller gets its own [`Waiter`]. Cancelling or dropping a waiter
//! detaches that caller only; the shared fetch and the other waiters are not
//! affected. What happens when the *last* waiter leaves is governed by
//! [`UnobservedFetch`].
//!
//! ```
//! use fetchgate::coalesce::Coalescer;
//! use fetchgate_core::RequestKey;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let coalescer: Coalescer<u32> = Coalescer::default();
//! let key = RequestKey::new("https://host/api/items/1");
//!
//! let first = coalescer.join(key.clone(), || async { 42 });
//! // Not called: a fetch for this key is already in flight.
//! let second = coalescer.join(key, || async { 0 });
//!
//! assert_eq!(first.await.unwrap(), 42);
//! assert_eq!(second.await.unwrap(), 42);
//! # }
//! ```

mod waiter;

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use fetchgate_core::RequestKey;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tracing::{Instrument, debug, info_span, warn};

pub use waiter::{Abandoned, Waiter};

use crate::metrics;

/// What to do with a shared fetch once nobody waits for it anymore.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Default)]
pub enum UnobservedFetch {
    /// Let the fetch finish. Its result is still written to the cache, so the
    /// work is not wasted for the next caller.
    #[default]
    Continue,
    /// Abort the fetch as soon as its last waiter detaches.
    Abort,
}

/// A fetch currently outstanding for one key.
struct InFlight<T> {
    /// Distinguishes successive fetches for the same key.
    generation: u64,
    /// Waiters in join order.
    waiters: Vec<(u64, oneshot::Sender<T>)>,
    /// Unset until the shared task has been spawned.
    task: Option<AbortHandle>,
}

pub(crate) struct Inner<T> {
    table: DashMap<RequestKey, InFlight<T>>,
    ids: AtomicU64,
    settled: AtomicU64,
    unobserved: UnobservedFetch,
}

impl<T> Inner<T> {
    fn next_id(&self) -> u64 {
        self.ids.fetch_add(1, Ordering::Relaxed)
    }

    /// Removes one waiter. Returns `false` if it was not registered (already
    /// notified, or its fetch is gone).
    pub(crate) fn detach(&self, key: &RequestKey, id: u64) -> bool {
        let Entry::Occupied(mut entry) = self.table.entry(key.clone()) else {
            return false;
        };
        let waiters = &mut entry.get_mut().waiters;
        let Some(position) = waiters.iter().position(|(waiter, _)| *waiter == id) else {
            return false;
        };
        waiters.remove(position);
        let remaining = waiters.len();
        debug!(%key, remaining, "waiter detached");
        metrics::record_waiter_detached();

        if remaining == 0 && self.unobserved == UnobservedFetch::Abort {
            let (_, in_flight) = entry.remove_entry();
            if let Some(task) = in_flight.task {
                task.abort();
            }
            debug!(%key, "aborted unobserved fetch");
            metrics::record_in_flight(self.table.len());
        }
        true
    }

    /// Removes the entry of `generation` and hands its waiters back.
    fn take_waiters(&self, key: &RequestKey, generation: u64) -> Option<Vec<(u64, oneshot::Sender<T>)>> {
        let removed = self
            .table
            .remove_if(key, |_, in_flight| in_flight.generation == generation);
        metrics::record_in_flight(self.table.len());
        removed.map(|(_, in_flight)| in_flight.waiters)
    }
}

impl<T: Clone> Inner<T> {
    /// Delivers the outcome of a fetch. The entry leaves the table before any
    /// waiter is woken.
    fn settle(&self, key: &RequestKey, generation: u64, outcome: T) {
        self.settled.fetch_add(1, Ordering::SeqCst);
        let Some(mut waiters) = self.take_waiters(key, generation) else {
            debug!(%key, "fetch settled after its entry was dropped");
            return;
        };
        debug!(%key, waiters = waiters.len(), "fetch settled");

        let last = waiters.pop();
        for (_, sender) in waiters {
            // A closed receiver only means that waiter is being dropped.
            let _ = sender.send(outcome.clone());
        }
        if let Some((_, sender)) = last {
            let _ = sender.send(outcome);
        }
    }
}

/// Clears the table entry if the shared task ends without settling
/// (panic, abort, runtime shutdown). Dropping the senders wakes the waiters
/// with [`Abandoned`].
struct SettleGuard<T> {
    inner: Arc<Inner<T>>,
    key: RequestKey,
    generation: u64,
    armed: bool,
}

impl<T> Drop for SettleGuard<T> {
    fn drop(&mut self) {
        if self.armed
            && let Some(waiters) = self.inner.take_waiters(&self.key, self.generation)
        {
            warn!(key = %self.key, waiters = waiters.len(), "in-flight fetch abandoned");
        }
    }
}

/// Deduplicates concurrent fetches per [`RequestKey`].
///
/// `T` is the outcome shared by all waiters of one fetch; it is cloned once
/// per waiter but the last. Use a cheaply clonable type such as
/// `Result<CachedResponse, FetchError>`.
///
/// Create one coalescer per session and share it (it is `Clone`, clones share
/// the same table). Spawning the shared fetch requires a Tokio runtime.
pub struct Coalescer<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Coalescer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for Coalescer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coalescer")
            .field("in_flight", &self.inner.table.len())
            .field("unobserved", &self.inner.unobserved)
            .finish()
    }
}

impl<T> Default for Coalescer<T> {
    fn default() -> Self {
        Self::new(UnobservedFetch::default())
    }
}

impl<T> Coalescer<T> {
    /// Creates an empty coalescer.
    pub fn new(unobserved: UnobservedFetch) -> Self {
        Self {
            inner: Arc::new(Inner {
                table: DashMap::new(),
                ids: AtomicU64::new(0),
                settled: AtomicU64::new(0),
                unobserved,
            }),
        }
    }

    /// Returns the number of keys with a fetch in flight.
    pub fn in_flight(&self) -> usize {
        self.inner.table.len()
    }

    /// Returns `true` if a fetch for `key` is in flight.
    pub fn is_pending(&self, key: &RequestKey) -> bool {
        self.inner.table.contains_key(key)
    }

    /// Returns the number of callers waiting on the fetch for `key`.
    pub fn waiter_count(&self, key: &RequestKey) -> usize {
        self.inner
            .table
            .get(key)
            .map_or(0, |in_flight| in_flight.waiters.len())
    }

    /// Returns the number of fetches that have settled so far.
    ///
    /// Anything a fetch did before settling (such as a cache write) is visible
    /// to whoever observes the incremented count.
    pub fn settlements(&self) -> u64 {
        self.inner.settled.load(Ordering::SeqCst)
    }

    /// Returns the policy applied when a fetch loses its last waiter.
    pub fn unobserved(&self) -> UnobservedFetch {
        self.inner.unobserved
    }
}

impl<T> Coalescer<T>
where
    T: Clone + Send + 'static,
{
    /// Waits for the outcome of the fetch for `key`, starting it if needed.
    ///
    /// `fetch` is called, and its future spawned, only when no fetch for `key`
    /// is in flight. The table is not locked while it runs.
    pub fn join<F, Fut>(&self, key: RequestKey, fetch: F) -> Waiter<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        let id = self.inner.next_id();

        let generation = match self.inner.table.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                let waiters = &mut entry.get_mut().waiters;
                waiters.push((id, sender));
                debug!(%key, waiters = waiters.len(), "joined in-flight fetch");
                metrics::record_waiter_joined(false);
                return Waiter::new(key, id, Arc::clone(&self.inner), receiver, false);
            }
            Entry::Vacant(entry) => {
                let generation = self.inner.next_id();
                entry.insert(InFlight {
                    generation,
                    waiters: vec![(id, sender)],
                    task: None,
                });
                generation
            }
        };
        // The shard lock is released from here on: a task dropped by a
        // stopped runtime clears its own entry.
        debug!(%key, "starting shared fetch");
        metrics::record_waiter_joined(true);
        metrics::record_in_flight(self.inner.table.len());

        let guard = SettleGuard {
            inner: Arc::clone(&self.inner),
            key: key.clone(),
            generation,
            armed: true,
        };
        let fetch = fetch();
        let task = self.spawn(guard, fetch);
        self.attach_task(&key, generation, task);

        Waiter::new(key, id, Arc::clone(&self.inner), receiver, true)
    }

    /// Records the task of `generation`, or aborts it if its entry is
    /// already gone.
    fn attach_task(&self, key: &RequestKey, generation: u64, task: AbortHandle) {
        match self.inner.table.get_mut(key) {
            Some(mut in_flight) if in_flight.generation == generation => {
                in_flight.task = Some(task);
            }
            _ => {
                if self.inner.unobserved == UnobservedFetch::Abort {
                    task.abort();
                }
            }
        }
    }

    fn spawn<Fut>(&self, mut guard: SettleGuard<T>, fetch: Fut) -> AbortHandle
    where
        Fut: Future<Output = T> + Send + 'static,
    {
        let span = info_span!("coalesced_fetch", key = %guard.key, generation = guard.generation);
        let handle = tokio::spawn(
            async move {
                let start = Instant::now();
                let outcome = fetch.await;
                metrics::record_fetch_duration(start.elapsed());
                guard.armed = false;
                guard.inner.settle(&guard.key, guard.generation, outcome);
            }
            .instrument(span),
        );
        handle.abort_handle()
    }
}
