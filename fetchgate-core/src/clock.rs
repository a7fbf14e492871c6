//! Wall clock abstraction used for freshness checks.

use std::sync::Arc;

use chrono::{DateTime, Utc};

/// Source of the current time.
pub trait Clock: Send + Sync + 'static {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// [`Clock`] reading the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl<T> Clock for Arc<T>
where
    T: Clock,
{
    fn now(&self) -> DateTime<Utc> {
        self.as_ref().now()
    }
}

#[cfg(any(test, feature = "test-helpers"))]
pub use manual::ManualClock;

#[cfg(any(test, feature = "test-helpers"))]
mod manual {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::time::Duration;

    use chrono::{DateTime, TimeZone, Utc};

    use super::Clock;

    /// Clock that only moves when told to.
    ///
    /// Clones share the same time, so a test can keep one handle and give the
    /// other to the code under test.
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        millis: Arc<AtomicI64>,
    }

    impl ManualClock {
        /// Creates a clock starting at the Unix epoch.
        pub fn new() -> Self {
            Self::starting_at(DateTime::<Utc>::UNIX_EPOCH)
        }

        /// Creates a clock starting at `start`.
        pub fn starting_at(start: DateTime<Utc>) -> Self {
            Self {
                millis: Arc::new(AtomicI64::new(start.timestamp_millis())),
            }
        }

        /// Moves the clock to `millis` milliseconds after the epoch.
        pub fn set_millis(&self, millis: i64) {
            self.millis.store(millis, Ordering::SeqCst);
        }

        /// Moves the clock forward.
        pub fn advance(&self, by: Duration) {
            self.millis
                .fetch_add(by.as_millis() as i64, Ordering::SeqCst);
        }
    }

    impl Default for ManualClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            Utc.timestamp_millis_opt(self.millis.load(Ordering::SeqCst))
                .single()
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
        }
    }
}
