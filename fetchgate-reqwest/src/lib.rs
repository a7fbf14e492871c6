#![doc = include_str!("../README.md")]

mod fetcher;
mod middleware;

pub use fetcher::ReqwestFetcher;
pub use middleware::{CacheMiddleware, DEFAULT_CACHE_STATUS_HEADER};

// Re-export common types
pub use fetchgate::{CacheStatus, Config, InterceptError, Interceptor, RouteRule, RouteTable};
