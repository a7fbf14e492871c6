use std::sync::Arc;

use async_trait::async_trait;
use fetchgate_core::{CacheEntry, RequestKey, StoreLabel};

use crate::{DeleteStatus, StoreError};

pub type StoreResult<T> = Result<T, StoreError>;

/// Keyed storage for timestamped responses.
///
/// A store keeps at most one [`CacheEntry`] per [`RequestKey`]. Writing a key
/// that already has an entry replaces it (last write wins). Repeating an
/// identical write leaves the store in the same state.
///
/// Stores know nothing about freshness: they return whatever entry they hold
/// and the interceptor decides whether it is still usable.
#[async_trait]
pub trait Store: Sync + Send {
    async fn read(&self, key: &RequestKey) -> StoreResult<Option<CacheEntry>>;

    async fn write(&self, key: &RequestKey, entry: CacheEntry) -> StoreResult<()>;

    async fn remove(&self, key: &RequestKey) -> StoreResult<DeleteStatus>;

    /// Drops every entry.
    async fn clear(&self) -> StoreResult<()>;

    /// Returns the label of this store for logs and metrics.
    fn label(&self) -> StoreLabel {
        StoreLabel::new_static("store")
    }
}

#[async_trait]
impl Store for &dyn Store {
    async fn read(&self, key: &RequestKey) -> StoreResult<Option<CacheEntry>> {
        (*self).read(key).await
    }

    async fn write(&self, key: &RequestKey, entry: CacheEntry) -> StoreResult<()> {
        (*self).write(key, entry).await
    }

    async fn remove(&self, key: &RequestKey) -> StoreResult<DeleteStatus> {
        (*self).remove(key).await
    }

    async fn clear(&self) -> StoreResult<()> {
        (*self).clear().await
    }

    fn label(&self) -> StoreLabel {
        (*self).label()
    }
}

#[async_trait]
impl Store for Box<dyn Store> {
    async fn read(&self, key: &RequestKey) -> StoreResult<Option<CacheEntry>> {
        (**self).read(key).await
    }

    async fn write(&self, key: &RequestKey, entry: CacheEntry) -> StoreResult<()> {
        (**self).write(key, entry).await
    }

    async fn remove(&self, key: &RequestKey) -> StoreResult<DeleteStatus> {
        (**self).remove(key).await
    }

    async fn clear(&self) -> StoreResult<()> {
        (**self).clear().await
    }

    fn label(&self) -> StoreLabel {
        (**self).label()
    }
}

#[async_trait]
impl Store for Arc<dyn Store + Send + 'static> {
    async fn read(&self, key: &RequestKey) -> StoreResult<Option<CacheEntry>> {
        (**self).read(key).await
    }

    async fn write(&self, key: &RequestKey, entry: CacheEntry) -> StoreResult<()> {
        (**self).write(key, entry).await
    }

    async fn remove(&self, key: &RequestKey) -> StoreResult<DeleteStatus> {
        (**self).remove(key).await
    }

    async fn clear(&self) -> StoreResult<()> {
        (**self).clear().await
    }

    fn label(&self) -> StoreLabel {
        (**self).label()
    }
}
