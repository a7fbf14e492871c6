//! Stored cache entries.
//!
//! A [`CacheEntry`] pairs a [`CachedResponse`] with the instant it was
//! received from the network. The freshness of an entry is judged from its
//! [`timestamp`](CacheEntry::timestamp):
//!
//! 1. `stored_at`, recorded when the response was written to the store;
//! 2. otherwise the response `Date` header, for entries written by something
//!    that did not record a time.
//!
//! An entry with neither is *undated* and is never considered fresh.

use chrono::{DateTime, Utc};

use crate::response::CachedResponse;

/// A response held by a store, with its receive time.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    response: CachedResponse,
    stored_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    /// Creates an entry received at `stored_at`.
    pub fn new(response: CachedResponse, stored_at: DateTime<Utc>) -> Self {
        Self {
            response,
            stored_at: Some(stored_at),
        }
    }

    /// Creates an entry without a recorded receive time.
    pub fn undated(response: CachedResponse) -> Self {
        Self {
            response,
            stored_at: None,
        }
    }

    /// Returns the cached response.
    #[inline]
    pub fn response(&self) -> &CachedResponse {
        &self.response
    }

    /// Returns when the response was stored, if recorded.
    #[inline]
    pub fn stored_at(&self) -> Option<DateTime<Utc>> {
        self.stored_at
    }

    /// Returns the instant this entry's age is measured from.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.stored_at.or_else(|| self.response.date())
    }

    /// Returns the approximate memory held by this entry in bytes.
    pub fn memory_size(&self) -> usize {
        std::mem::size_of::<Option<DateTime<Utc>>>() + self.response.memory_size()
    }

    /// Consumes the entry and returns the response.
    pub fn into_response(self) -> CachedResponse {
        self.response
    }
}
