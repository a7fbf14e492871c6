//! Moka store implementation.

use async_trait::async_trait;
use fetchgate_backend::{DeleteStatus, Store, StoreResult};
use fetchgate_core::{CacheEntry, RequestKey, StoreLabel};
use moka::future::Cache;
use tracing::trace;

/// In-memory response store powered by Moka.
///
/// `MokaStore` keeps one [`CacheEntry`] per [`RequestKey`] for the lifetime
/// of the process. Inserting a key that is already present replaces the old
/// entry.
///
/// # Examples
///
/// ```
/// use fetchgate_moka::MokaStore;
///
/// let store = MokaStore::builder().max_entries(10_000).build();
/// ```
///
/// # Caveats
///
/// - Data is **not persisted**: the store lives as long as the process
/// - Entries are never expired by age; staleness is the interceptor's call.
///   Capacity and the optional idle timeout are the only eviction triggers
#[derive(Clone)]
pub struct MokaStore {
    pub(crate) cache: Cache<RequestKey, CacheEntry>,
    pub(crate) label: StoreLabel,
}

impl std::fmt::Debug for MokaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaStore")
            .field("label", &self.label)
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}

impl MokaStore {
    /// Creates a new builder for `MokaStore`.
    ///
    /// A capacity must be chosen with
    /// [`max_entries`](crate::MokaStoreBuilder::max_entries) or
    /// [`max_bytes`](crate::MokaStoreBuilder::max_bytes) before building.
    pub fn builder() -> crate::builder::MokaStoreBuilder<crate::builder::NoCapacity> {
        crate::builder::MokaStoreBuilder::new()
    }

    /// Returns the underlying Moka cache.
    pub fn cache(&self) -> &Cache<RequestKey, CacheEntry> {
        &self.cache
    }

    fn record_capacity(&self) {
        crate::metrics::record_capacity(
            self.label.as_str(),
            self.cache.entry_count(),
            self.cache.weighted_size(),
        );
    }
}

#[async_trait]
impl Store for MokaStore {
    async fn read(&self, key: &RequestKey) -> StoreResult<Option<CacheEntry>> {
        Ok(self.cache.get(key).await)
    }

    async fn write(&self, key: &RequestKey, entry: CacheEntry) -> StoreResult<()> {
        trace!(store = %self.label, %key, "insert entry");
        self.cache.insert(key.clone(), entry).await;
        self.record_capacity();
        Ok(())
    }

    async fn remove(&self, key: &RequestKey) -> StoreResult<DeleteStatus> {
        let value = self.cache.remove(key).await;
        self.record_capacity();
        match value {
            Some(_) => Ok(DeleteStatus::Deleted(1)),
            None => Ok(DeleteStatus::Missing),
        }
    }

    async fn clear(&self) -> StoreResult<()> {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        self.record_capacity();
        Ok(())
    }

    fn label(&self) -> StoreLabel {
        self.label.clone()
    }
}
