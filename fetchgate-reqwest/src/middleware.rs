//! Cache middleware for reqwest-middleware.

use async_trait::async_trait;
use fetchgate::Interceptor;
use fetchgate_backend::Store;
use fetchgate_core::{Clock, Fetch, FetchRequest};
use http::header::{HeaderName, HeaderValue};
use http::{Extensions, Method};
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next, Result};
use tracing::debug;

/// Header carrying the [`CacheStatus`](fetchgate::CacheStatus) of a response.
pub const DEFAULT_CACHE_STATUS_HEADER: HeaderName = HeaderName::from_static("x-cache-status");

/// Cache middleware for reqwest-middleware.
///
/// `GET` requests whose URL matches a route of the interceptor are answered
/// from the cache or through the interceptor's coalesced fetch; the response
/// carries an `x-cache-status` header (`HIT`, `MISS` or `STALE`). Every other
/// request continues down the middleware chain untouched.
///
/// Fetch failures, including non-success statuses, surface as
/// [`reqwest_middleware::Error::Middleware`] wrapping an
/// [`InterceptError`](fetchgate::InterceptError). Dropping the request future
/// detaches this caller only.
pub struct CacheMiddleware<F, S, C> {
    interceptor: Interceptor<F, S, C>,
    status_header: HeaderName,
}

impl<F, S, C> CacheMiddleware<F, S, C> {
    /// Create a new cache middleware.
    pub fn new(interceptor: Interceptor<F, S, C>) -> Self {
        Self {
            interceptor,
            status_header: DEFAULT_CACHE_STATUS_HEADER,
        }
    }

    /// Sets the name of the cache status header.
    pub fn status_header(mut self, name: HeaderName) -> Self {
        self.status_header = name;
        self
    }

    /// The interceptor behind this middleware.
    pub fn interceptor(&self) -> &Interceptor<F, S, C> {
        &self.interceptor
    }
}

impl<F, S, C> Clone for CacheMiddleware<F, S, C> {
    fn clone(&self) -> Self {
        Self {
            interceptor: self.interceptor.clone(),
            status_header: self.status_header.clone(),
        }
    }
}

#[async_trait]
impl<F, S, C> Middleware for CacheMiddleware<F, S, C>
where
    F: Fetch,
    S: Store + 'static,
    C: Clock,
{
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        if req.method() != Method::GET || !self.interceptor.is_cacheable(req.url().as_str()) {
            debug!(method = %req.method(), url = %req.url(), "not cacheable, passing through");
            return next.run(req, extensions).await;
        }

        let request = FetchRequest::get(req.url().as_str()).with_headers(req.headers().clone());
        let intercepted = self
            .interceptor
            .intercept(request)
            .await
            .map_err(reqwest_middleware::Error::middleware)?;

        let (status, mut headers, body) = intercepted.response.into_parts();
        headers.insert(
            self.status_header.clone(),
            HeaderValue::from_static(intercepted.status.as_str()),
        );
        let mut http_response = http::Response::new(body);
        *http_response.status_mut() = status;
        *http_response.headers_mut() = headers;

        Ok(http_response.into())
    }
}
