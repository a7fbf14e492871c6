//! Metrics declaration and recording helpers.
//!
//! With the `metrics` feature disabled every `record_*` function is an empty
//! inline function and the calls compile away.

use std::time::Duration;

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

use crate::intercept::CacheStatus;

#[cfg(feature = "metrics")]
lazy_static! {
    // Cache status metrics

    /// Track number of cache hit events.
    pub static ref CACHE_HIT_COUNTER: &'static str = {
        metrics::describe_counter!(
            "fetchgate_cache_hit_total",
            "Total number of requests served from a fresh cache entry."
        );
        "fetchgate_cache_hit_total"
    };
    /// Track number of cache miss events.
    pub static ref CACHE_MISS_COUNTER: &'static str = {
        metrics::describe_counter!(
            "fetchgate_cache_miss_total",
            "Total number of cacheable requests with no cache entry."
        );
        "fetchgate_cache_miss_total"
    };
    /// Track number of cache stale events.
    pub static ref CACHE_STALE_COUNTER: &'static str = {
        metrics::describe_counter!(
            "fetchgate_cache_stale_total",
            "Total number of cacheable requests that found an expired entry."
        );
        "fetchgate_cache_stale_total"
    };
    /// Track number of requests that matched no route.
    pub static ref CACHE_BYPASS_COUNTER: &'static str = {
        metrics::describe_counter!(
            "fetchgate_cache_bypass_total",
            "Total number of requests passed straight to the network."
        );
        "fetchgate_cache_bypass_total"
    };

    // Coalescer metrics

    /// Track number of shared fetches started.
    pub static ref FETCHES_STARTED: &'static str = {
        metrics::describe_counter!(
            "fetchgate_fetches_started_total",
            "Total number of shared network fetches started."
        );
        "fetchgate_fetches_started_total"
    };
    /// Track number of waiters attached to a fetch already in flight.
    pub static ref WAITERS_COALESCED: &'static str = {
        metrics::describe_counter!(
            "fetchgate_waiters_coalesced_total",
            "Total number of requests attached to a fetch already in flight."
        );
        "fetchgate_waiters_coalesced_total"
    };
    /// Track number of waiters that detached before settlement.
    pub static ref WAITERS_CANCELLED: &'static str = {
        metrics::describe_counter!(
            "fetchgate_waiters_cancelled_total",
            "Total number of waiters detached before their fetch settled."
        );
        "fetchgate_waiters_cancelled_total"
    };
    /// Gauge of keys with a fetch in flight.
    pub static ref FETCHES_IN_FLIGHT: &'static str = {
        metrics::describe_gauge!(
            "fetchgate_fetches_in_flight",
            "Number of keys with a shared fetch in flight."
        );
        "fetchgate_fetches_in_flight"
    };
    /// Histogram of shared fetch duration.
    pub static ref FETCH_DURATION: &'static str = {
        metrics::describe_histogram!(
            "fetchgate_fetch_duration_seconds",
            metrics::Unit::Seconds,
            "Duration of shared network fetches in seconds."
        );
        "fetchgate_fetch_duration_seconds"
    };
    /// Track number of failed fetches.
    pub static ref FETCH_FAILURES: &'static str = {
        metrics::describe_counter!(
            "fetchgate_fetch_failures_total",
            "Total number of network fetches that settled with an error."
        );
        "fetchgate_fetch_failures_total"
    };

    // Store metrics

    /// Track store errors per store and operation.
    pub static ref STORE_ERRORS: &'static str = {
        metrics::describe_counter!(
            "fetchgate_store_errors_total",
            "Total number of swallowed store errors."
        );
        "fetchgate_store_errors_total"
    };
}

/// Record the outcome of a cache lookup.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_status(status: CacheStatus) {
    let counter = match status {
        CacheStatus::Hit => *CACHE_HIT_COUNTER,
        CacheStatus::Miss => *CACHE_MISS_COUNTER,
        CacheStatus::Stale => *CACHE_STALE_COUNTER,
        CacheStatus::Bypass => *CACHE_BYPASS_COUNTER,
    };
    metrics::counter!(counter).increment(1);
}

/// Record a waiter joining the coalescer. `started` is `true` when joining
/// started a new shared fetch.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_waiter_joined(started: bool) {
    if started {
        metrics::counter!(*FETCHES_STARTED).increment(1);
    } else {
        metrics::counter!(*WAITERS_COALESCED).increment(1);
    }
}

/// Record a waiter detaching before settlement.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_waiter_detached() {
    metrics::counter!(*WAITERS_CANCELLED).increment(1);
}

/// Record the number of keys with a fetch in flight.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_in_flight(count: usize) {
    metrics::gauge!(*FETCHES_IN_FLIGHT).set(count as f64);
}

/// Record how long a shared fetch took.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_fetch_duration(duration: Duration) {
    metrics::histogram!(*FETCH_DURATION).record(duration.as_secs_f64());
}

/// Record a fetch that settled with an error.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_fetch_failure() {
    metrics::counter!(*FETCH_FAILURES).increment(1);
}

/// Record a swallowed store error.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_store_error(store: &str, operation: &'static str) {
    metrics::counter!(
        *STORE_ERRORS,
        "store" => store.to_string(),
        "operation" => operation
    )
    .increment(1);
}

/// No-op version when metrics feature is disabled.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_status(_status: CacheStatus) {}

/// No-op version when metrics feature is disabled.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_waiter_joined(_started: bool) {}

/// No-op version when metrics feature is disabled.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_waiter_detached() {}

/// No-op version when metrics feature is disabled.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_in_flight(_count: usize) {}

/// No-op version when metrics feature is disabled.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_fetch_duration(_duration: Duration) {}

/// No-op version when metrics feature is disabled.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_fetch_failure() {}

/// No-op version when metrics feature is disabled.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_store_error(_store: &str, _operation: &'static str) {}
