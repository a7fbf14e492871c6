//! Moka store capacity metrics.
//!
//! Enable the `metrics` feature to use these metrics.
//!
//! ## Metrics
//!
//! - `fetchgate_moka_entries` - Current number of entries in the store (gauge)
//! - `fetchgate_moka_size_bytes` - Current weighted size in bytes (gauge)
//!
//! Both metrics include a `store` label to distinguish between multiple Moka stores.

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
lazy_static! {
    /// Metric name for entry count gauge.
    pub static ref MOKA_ENTRIES: &'static str = {
        metrics::describe_gauge!(
            "fetchgate_moka_entries",
            "Current number of entries in the Moka store."
        );
        "fetchgate_moka_entries"
    };

    /// Metric name for size gauge.
    pub static ref MOKA_SIZE_BYTES: &'static str = {
        metrics::describe_gauge!(
            "fetchgate_moka_size_bytes",
            "Current weighted size of the Moka store in bytes."
        );
        "fetchgate_moka_size_bytes"
    };
}

/// Record current store capacity metrics.
///
/// For entry-capacity stores the weighted size equals the entry count.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_capacity(store: &str, entries: u64, size_bytes: u64) {
    metrics::gauge!(*MOKA_ENTRIES, "store" => store.to_string()).set(entries as f64);
    metrics::gauge!(*MOKA_SIZE_BYTES, "store" => store.to_string()).set(size_bytes as f64);
}

/// Record current store capacity metrics (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_capacity(_store: &str, _entries: u64, _size_bytes: u64) {}
