#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

/// Caller-side cancellation handles.
pub mod abort;

/// Freshness-checked access to the session store.
///
/// Provides [`CacheStore`](cache::CacheStore), which turns store failures into
/// misses, and the [`is_fresh`](cache::is_fresh) check.
pub mod cache;

/// In-flight request coalescing.
pub mod coalesce;

/// YAML configuration for routes, the store and the coalescer.
pub mod config;

/// Error types for interception and configuration.
pub mod error;

/// The interceptor and its result handle.
pub mod intercept;

/// Metrics collection for cache observability.
///
/// When the `metrics` feature is enabled, this module provides counters,
/// a gauge and a histogram for:
/// - Cache hits, misses, stale entries and bypassed requests
/// - Shared fetches started, coalesced and cancelled waiters, fetch failures
/// - Swallowed store errors
pub mod metrics;

/// Route rules deciding which requests are cacheable.
pub mod route;

pub use abort::AbortHandle;
pub use cache::{CacheStore, Freshness, is_fresh};
pub use coalesce::{Abandoned, Coalescer, UnobservedFetch, Waiter};
pub use config::Config;
pub use error::{ConfigError, InterceptError};
pub use intercept::{
    CacheStatus, FetchOutcome, Intercepted, Interception, Interceptor, InterceptorBuilder, NotSet,
};
pub use route::{RouteRule, RouteTable};

pub use fetchgate_backend::{Store, StoreError};
pub use fetchgate_core::{
    CacheEntry, CachedResponse, Clock, Fetch, FetchError, FetchFn, FetchRequest, RequestKey,
    SystemClock,
};
