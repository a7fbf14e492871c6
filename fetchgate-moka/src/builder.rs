//! Builder for configuring [`MokaStore`].

use std::time::Duration;

use fetchgate_core::{CacheEntry, RequestKey, StoreLabel};
use moka::future::{Cache, CacheBuilder};
use moka::policy::EvictionPolicy;

use crate::backend::MokaStore;

/// Marker type: capacity has not been configured yet.
///
/// This is the initial state of a [`MokaStoreBuilder`]. You must call either
/// [`max_entries()`](MokaStoreBuilder::max_entries) or
/// [`max_bytes()`](MokaStoreBuilder::max_bytes) before calling `build()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCapacity;

/// Marker type: entry-count capacity has been configured.
#[derive(Debug, Clone, Copy)]
pub struct EntryCapacity(pub(crate) u64);

/// Marker type: byte-based capacity has been configured.
///
/// The store will use at most `n` bytes (approximate), counting the key, the
/// response headers and the response body of every entry.
#[derive(Debug, Clone, Copy)]
pub struct ByteCapacity(pub(crate) u64);

/// Builder for creating and configuring a [`MokaStore`].
///
/// `build()` is only available once a capacity has been set, and only one
/// kind of capacity can be set.
///
/// # Examples
///
/// ```
/// use fetchgate_moka::MokaStore;
/// use std::time::Duration;
///
/// let store = MokaStore::builder()
///     .label("api-cache")
///     .time_to_idle(Duration::from_secs(600))
///     .max_bytes(32 * 1024 * 1024)
///     .build();
/// # let _ = store;
/// ```
#[derive(Debug)]
pub struct MokaStoreBuilder<Cap> {
    capacity: Cap,
    label: StoreLabel,
    eviction_policy: Option<EvictionPolicy>,
    time_to_idle: Option<Duration>,
}

impl MokaStoreBuilder<NoCapacity> {
    /// Creates a new builder with no capacity configured.
    pub fn new() -> Self {
        Self {
            capacity: NoCapacity,
            label: StoreLabel::new_static("moka"),
            eviction_policy: None,
            time_to_idle: None,
        }
    }

    /// Sets the maximum number of entries the store can hold.
    pub fn max_entries(self, capacity: u64) -> MokaStoreBuilder<EntryCapacity> {
        MokaStoreBuilder {
            capacity: EntryCapacity(capacity),
            label: self.label,
            eviction_policy: self.eviction_policy,
            time_to_idle: self.time_to_idle,
        }
    }

    /// Sets the maximum memory budget in bytes.
    pub fn max_bytes(self, bytes: u64) -> MokaStoreBuilder<ByteCapacity> {
        MokaStoreBuilder {
            capacity: ByteCapacity(bytes),
            label: self.label,
            eviction_policy: self.eviction_policy,
            time_to_idle: self.time_to_idle,
        }
    }
}

impl Default for MokaStoreBuilder<NoCapacity> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Cap> MokaStoreBuilder<Cap> {
    /// Sets a custom label for this store.
    ///
    /// # Default
    ///
    /// `"moka"`
    pub fn label(mut self, label: impl Into<StoreLabel>) -> Self {
        self.label = label.into();
        self
    }

    /// Sets the eviction policy.
    ///
    /// # Default
    ///
    /// - entry capacity: [`EvictionPolicy::tiny_lfu()`]
    /// - byte capacity: [`EvictionPolicy::lru()`], so a large response is never
    ///   refused admission while eviction could make room for it
    pub fn eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.eviction_policy = Some(policy);
        self
    }

    /// Evicts entries that have not been read or written for `idle`.
    ///
    /// Unlike a freshness window this only bounds memory: a stale entry that is
    /// still being read stays in the store until it is refreshed.
    pub fn time_to_idle(mut self, idle: Duration) -> Self {
        self.time_to_idle = Some(idle);
        self
    }

    fn finish(
        label: StoreLabel,
        builder: CacheBuilder<RequestKey, CacheEntry, Cache<RequestKey, CacheEntry>>,
        time_to_idle: Option<Duration>,
    ) -> MokaStore {
        let builder = match time_to_idle {
            Some(idle) => builder.time_to_idle(idle),
            None => builder,
        };
        MokaStore {
            cache: builder.build(),
            label,
        }
    }
}

impl MokaStoreBuilder<EntryCapacity> {
    /// Builds the [`MokaStore`] with entry-count based capacity.
    pub fn build(self) -> MokaStore {
        let policy = self
            .eviction_policy
            .unwrap_or_else(EvictionPolicy::tiny_lfu);
        let builder = CacheBuilder::new(self.capacity.0).eviction_policy(policy);
        Self::finish(self.label, builder, self.time_to_idle)
    }
}

impl MokaStoreBuilder<ByteCapacity> {
    /// Builds the [`MokaStore`] with byte-based capacity.
    pub fn build(self) -> MokaStore {
        let policy = self.eviction_policy.unwrap_or_else(EvictionPolicy::lru);
        let builder = CacheBuilder::new(self.capacity.0)
            .weigher(Self::byte_weigher)
            .eviction_policy(policy);
        Self::finish(self.label, builder, self.time_to_idle)
    }

    /// Weigher function that calculates the approximate byte cost of an entry.
    fn byte_weigher(key: &RequestKey, entry: &CacheEntry) -> u32 {
        (key.memory_size() + entry.memory_size()).min(u32::MAX as usize) as u32
    }
}
