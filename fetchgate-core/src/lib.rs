#![warn(missing_docs)]
//! # fetchgate-core
//!
//! Core types for the fetchgate request-coalescing cache.
//!
//! This crate holds the data model shared by the interceptor, the store
//! backends and the HTTP client integrations:
//!
//! - **Identify** resources ([`RequestKey`])
//! - **Describe** requests and buffered responses ([`FetchRequest`], [`CachedResponse`])
//! - **Store** timestamped responses ([`CacheEntry`])
//! - **Go to network** ([`Fetch`])
//! - **Tell the time** ([`Clock`])
//!
//! ## Feature Flags
//!
//! - `test-helpers` - Enable [`ManualClock`](clock::ManualClock) for tests
//!

pub mod clock;
pub mod fetch;
pub mod key;
pub mod label;
pub mod request;
pub mod response;
pub mod value;

pub use clock::{Clock, SystemClock};
#[cfg(any(test, feature = "test-helpers"))]
pub use clock::ManualClock;
pub use fetch::{Fetch, FetchError, FetchFn};
pub use key::RequestKey;
pub use label::StoreLabel;
pub use request::FetchRequest;
pub use response::CachedResponse;
pub use value::CacheEntry;
