//! Freshness-checked access to a [`Store`].
//!
//! [`CacheStore`] wraps a raw store and never fails: a read error reads as a
//! miss and a write error leaves the response uncached. Both are logged.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use fetchgate_backend::{DeleteStatus, Store};
use fetchgate_core::{CacheEntry, CachedResponse, RequestKey};
use tracing::{debug, warn};

use crate::metrics;

/// Whether a cache entry may still be served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Younger than its route's max age.
    Fresh,
    /// Too old, undated, or its route has a zero max age.
    Stale,
}

/// Returns `true` if `entry` is younger than `max_age` at `now`.
///
/// The boundary is inclusive: an entry exactly `max_age` old is fresh. An
/// entry without a timestamp is never fresh, nor is anything under a zero
/// `max_age`.
pub fn is_fresh(entry: &CacheEntry, max_age: Duration, now: DateTime<Utc>) -> bool {
    if max_age.is_zero() {
        return false;
    }
    let Some(timestamp) = entry.timestamp() else {
        return false;
    };
    let max_age = TimeDelta::from_std(max_age).unwrap_or(TimeDelta::MAX);
    now.signed_duration_since(timestamp) <= max_age
}

/// [`is_fresh`] as a [`Freshness`].
pub fn freshness(entry: &CacheEntry, max_age: Duration, now: DateTime<Utc>) -> Freshness {
    if is_fresh(entry, max_age, now) {
        Freshness::Fresh
    } else {
        Freshness::Stale
    }
}

/// Session cache over a [`Store`].
pub struct CacheStore<S> {
    store: Arc<S>,
}

impl<S> Clone for CacheStore<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S> std::fmt::Debug for CacheStore<S>
where
    S: Store,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("store", &self.store.label())
            .finish()
    }
}

impl<S> CacheStore<S>
where
    S: Store,
{
    /// Wraps `store`.
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    /// Wraps a store that is shared with other owners.
    pub fn from_shared(store: Arc<S>) -> Self {
        Self { store }
    }

    /// The wrapped store.
    pub fn store_ref(&self) -> &S {
        &self.store
    }

    /// Reads the entry for `key`. Store errors read as a miss.
    pub async fn lookup(&self, key: &RequestKey) -> Option<CacheEntry> {
        match self.store.read(key).await {
            Ok(entry) => entry,
            Err(error) => {
                let store = self.store.label();
                warn!(%key, %store, %error, "cache read failed, treating as miss");
                metrics::record_store_error(store.as_str(), "read");
                None
            }
        }
    }

    /// Stores `response` for `key`, timestamped `now`, replacing any previous
    /// entry. Returns `false` if the store rejected the write.
    pub async fn store(&self, key: &RequestKey, response: CachedResponse, now: DateTime<Utc>) -> bool {
        match self.store.write(key, CacheEntry::new(response, now)).await {
            Ok(()) => {
                debug!(%key, "cache updated");
                true
            }
            Err(error) => {
                let store = self.store.label();
                warn!(%key, %store, %error, "cache write failed, response not cached");
                metrics::record_store_error(store.as_str(), "write");
                false
            }
        }
    }

    /// Drops the entry for `key`. Returns `true` if an entry was removed.
    pub async fn invalidate(&self, key: &RequestKey) -> bool {
        match self.store.remove(key).await {
            Ok(DeleteStatus::Deleted(_)) => {
                debug!(%key, "cache entry invalidated");
                true
            }
            Ok(DeleteStatus::Missing) => false,
            Err(error) => {
                let store = self.store.label();
                warn!(%key, %store, %error, "cache remove failed");
                metrics::record_store_error(store.as_str(), "remove");
                false
            }
        }
    }

    /// Drops every entry. Returns `false` if the store failed to clear.
    pub async fn clear(&self) -> bool {
        match self.store.clear().await {
            Ok(()) => {
                debug!(store = %self.store.label(), "cache cleared");
                true
            }
            Err(error) => {
                let store = self.store.label();
                warn!(%store, %error, "cache clear failed");
                metrics::record_store_error(store.as_str(), "clear");
                false
            }
        }
    }
}
