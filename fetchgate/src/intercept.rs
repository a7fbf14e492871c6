//! The request interception entry point.
//!
//! For every outgoing request [`Interceptor::intercept`]:
//!
//! 1. classifies the URL against the [`RouteTable`]; unmatched requests go
//!    straight to the network, uncoalesced and uncached;
//! 2. serves a fresh cache entry without touching the network;
//! 3. otherwise joins the [`Coalescer`] so that one fetch per key is in
//!    flight. The shared fetch writes its response to the cache before any
//!    waiter is notified.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use fetchgate_backend::Store;
use fetchgate_core::{CachedResponse, Clock, Fetch, FetchError, FetchRequest, RequestKey, SystemClock};
use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::{debug, warn};

use crate::abort::AbortHandle;
use crate::cache::{CacheStore, is_fresh};
use crate::coalesce::{Coalescer, UnobservedFetch};
use crate::error::InterceptError;
use crate::metrics;
use crate::route::RouteTable;

/// Outcome shared by every waiter of one fetch.
pub type FetchOutcome = Result<CachedResponse, FetchError>;

/// Where an intercepted response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheStatus {
    /// Served from a fresh cache entry.
    Hit,
    /// No entry; fetched from the network.
    Miss,
    /// The entry was too old; fetched from the network.
    Stale,
    /// The URL matched no route; fetched without caching.
    Bypass,
}

impl CacheStatus {
    /// Returns the status as an upper-case string, e.g. for an
    /// `X-Cache-Status` header.
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
            CacheStatus::Stale => "STALE",
            CacheStatus::Bypass => "BYPASS",
        }
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A successfully intercepted response.
#[derive(Debug, Clone, PartialEq)]
pub struct Intercepted {
    /// The response, fresh from the cache or from the network.
    pub response: CachedResponse,
    /// How it was obtained.
    pub status: CacheStatus,
}

struct Shared<F, S, C> {
    routes: RouteTable,
    cache: CacheStore<S>,
    coalescer: Coalescer<FetchOutcome>,
    fetcher: F,
    clock: C,
}

impl<F, S, C> Shared<F, S, C>
where
    F: Fetch,
    S: Store + 'static,
    C: Clock,
{
    async fn run(
        self: Arc<Self>,
        request: FetchRequest,
        abort: AbortHandle,
    ) -> Result<Intercepted, InterceptError> {
        let key = request.key();
        let Some(max_age) = self.routes.classify(request.url()).map(|rule| rule.max_age()) else {
            debug!(%key, "no route matched, passing through");
            metrics::record_status(CacheStatus::Bypass);
            let response = tokio::select! {
                biased;
                _ = abort.aborted() => return Err(InterceptError::Aborted),
                response = self.fetcher.fetch(request) => response?,
            };
            return Ok(Intercepted {
                response,
                status: CacheStatus::Bypass,
            });
        };

        // Attach to a fetch already in flight without reading the cache: a
        // slow read could outlast that fetch and start a second one.
        let settled = self.coalescer.settlements();
        let status = if self.coalescer.is_pending(&key) {
            debug!(%key, "fetch in flight, attaching");
            metrics::record_status(CacheStatus::Miss);
            CacheStatus::Miss
        } else {
            let cached = tokio::select! {
                biased;
                _ = abort.aborted() => return Err(InterceptError::Aborted),
                cached = self.cache.lookup(&key) => cached,
            };
            let status = match cached {
                Some(entry) if is_fresh(&entry, max_age, self.clock.now()) => {
                    debug!(%key, "cache hit");
                    metrics::record_status(CacheStatus::Hit);
                    return Ok(Intercepted {
                        response: entry.into_response(),
                        status: CacheStatus::Hit,
                    });
                }
                Some(_) => {
                    debug!(%key, "cache expired");
                    CacheStatus::Stale
                }
                None => {
                    debug!(%key, "cache miss");
                    CacheStatus::Miss
                }
            };
            metrics::record_status(status);
            status
        };

        let shared = Arc::clone(&self);
        let fetch_key = key.clone();
        let waiter = self.coalescer.join(key, move || {
            debug!(key = %fetch_key, "creating new fetch request");
            async move { shared.fetch_and_store(fetch_key, request, max_age, settled).await }
        });

        let outcome = tokio::select! {
            biased;
            _ = abort.aborted() => return Err(InterceptError::Aborted),
            outcome = waiter => outcome?,
        };
        Ok(Intercepted {
            response: outcome?,
            status,
        })
    }

    /// Body of the shared fetch. Successful responses are cached before the
    /// outcome is handed to the waiters.
    ///
    /// If another fetch settled since the caller last looked, its response
    /// may already be in the cache; a fresh one is returned without fetching.
    async fn fetch_and_store(
        &self,
        key: RequestKey,
        request: FetchRequest,
        max_age: Duration,
        settled: u64,
    ) -> FetchOutcome {
        if self.coalescer.settlements() != settled
            && let Some(entry) = self.cache.lookup(&key).await
            && is_fresh(&entry, max_age, self.clock.now())
        {
            debug!(%key, "cache filled while joining, skipping fetch");
            return Ok(entry.into_response());
        }

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if response.is_success() {
                    self.cache
                        .store(&key, response.clone(), self.clock.now())
                        .await;
                } else {
                    debug!(%key, status = %response.status(), "not caching unsuccessful response");
                }
                Ok(response)
            }
            Err(error) => {
                warn!(%key, %error, "fetch failed");
                metrics::record_fetch_failure();
                Err(error)
            }
        }
    }
}

/// Caching, coalescing front for a [`Fetch`] implementation.
///
/// Create one per session and clone it freely: clones share the route table,
/// the cache and the in-flight table.
///
/// ```
/// use fetchgate::{CacheStatus, Interceptor, RouteRule, RouteTable};
/// use fetchgate_core::{CachedResponse, FetchError, FetchFn, FetchRequest};
/// use fetchgate_moka::MokaStore;
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let interceptor = Interceptor::builder()
///     .routes(RouteTable::new(vec![
///         RouteRule::new("/api/items/[0-9]+$", Duration::from_secs(60)).unwrap(),
///     ]))
///     .store(MokaStore::builder().max_entries(1_000).build())
///     .fetcher(FetchFn::new(|_request: FetchRequest| async {
///         Ok::<_, FetchError>(CachedResponse::ok("item"))
///     }))
///     .build();
///
/// let first = interceptor.intercept(FetchRequest::get("https://host/api/items/1")).await.unwrap();
/// assert_eq!(first.status, CacheStatus::Miss);
///
/// let second = interceptor.intercept(FetchRequest::get("https://host/api/items/1")).await.unwrap();
/// assert_eq!(second.status, CacheStatus::Hit);
/// # }
/// ```
pub struct Interceptor<F, S, C = SystemClock> {
    inner: Arc<Shared<F, S, C>>,
}

impl<F, S, C> Clone for Interceptor<F, S, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F, S, C> fmt::Debug for Interceptor<F, S, C>
where
    S: Store,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptor")
            .field("routes", &self.inner.routes)
            .field("cache", &self.inner.cache)
            .field("coalescer", &self.inner.coalescer)
            .finish_non_exhaustive()
    }
}

impl Interceptor<NotSet, NotSet, SystemClock> {
    /// Creates a new [`InterceptorBuilder`].
    pub fn builder() -> InterceptorBuilder<NotSet, NotSet, SystemClock> {
        InterceptorBuilder::new()
    }
}

impl<F, S, C> Interceptor<F, S, C>
where
    F: Fetch,
    S: Store + 'static,
    C: Clock,
{
    /// Intercepts `request`.
    ///
    /// Nothing happens until the returned [`Interception`] is polled. Dropping
    /// it, or cancelling it, detaches this caller only.
    pub fn intercept(&self, request: FetchRequest) -> Interception {
        let abort = AbortHandle::new();
        let inner = Arc::clone(&self.inner);
        let future = inner.run(request, abort.clone()).boxed();
        Interception { future, abort }
    }

    /// Returns `true` if requests for `url` go through the cache.
    pub fn is_cacheable(&self, url: &str) -> bool {
        self.inner.routes.classify(url).is_some()
    }

    /// Drops the cached entry for `key`. A fetch already in flight for it is
    /// not affected and will store its response when it settles.
    pub async fn invalidate(&self, key: &RequestKey) -> bool {
        self.inner.cache.invalidate(key).await
    }

    /// Drops every cached entry.
    pub async fn clear(&self) -> bool {
        self.inner.cache.clear().await
    }
}

impl<F, S, C> Interceptor<F, S, C> {
    /// The route table.
    pub fn routes(&self) -> &RouteTable {
        &self.inner.routes
    }

    /// The cache the interceptor reads and writes.
    pub fn cache(&self) -> &CacheStore<S> {
        &self.inner.cache
    }

    /// The in-flight table.
    pub fn coalescer(&self) -> &Coalescer<FetchOutcome> {
        &self.inner.coalescer
    }
}

/// Handle on one intercepted request.
///
/// Resolves to the response or the error. [`cancel`](Self::cancel) or an
/// [`AbortHandle`] from [`abort_handle`](Self::abort_handle) makes it resolve
/// to [`InterceptError::Aborted`] instead, without disturbing other callers
/// of the same resource.
#[must_use = "an interception does nothing unless polled"]
pub struct Interception {
    future: BoxFuture<'static, Result<Intercepted, InterceptError>>,
    abort: AbortHandle,
}

impl Interception {
    /// Cancels this request. Awaiting it afterwards yields
    /// [`InterceptError::Aborted`].
    pub fn cancel(&mut self) {
        self.abort.abort();
        // Dropping the running future detaches its waiter right away.
        self.future = std::future::ready(Err(InterceptError::Aborted)).boxed();
    }

    /// Returns a handle that cancels this request from another task.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }
}

impl Future for Interception {
    type Output = Result<Intercepted, InterceptError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match this.future.as_mut().poll(cx) {
            Poll::Ready(_) if this.abort.is_aborted() => Poll::Ready(Err(InterceptError::Aborted)),
            other => other,
        }
    }
}

impl fmt::Debug for Interception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interception")
            .field("aborted", &self.abort.is_aborted())
            .finish_non_exhaustive()
    }
}

/// Marker type for unset builder fields.
///
/// When you see `NotSet` in a compiler error, it means you haven't called
/// the corresponding builder method yet.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotSet;

/// Builder for [`Interceptor`].
///
/// A fetcher and a store are required. Routes default to an empty table
/// (nothing is cached), the clock to [`SystemClock`] and the unobserved
/// fetch policy to [`UnobservedFetch::Continue`].
#[derive(Debug)]
pub struct InterceptorBuilder<F, S, C> {
    fetcher: F,
    store: S,
    clock: C,
    routes: RouteTable,
    unobserved: UnobservedFetch,
}

impl InterceptorBuilder<NotSet, NotSet, SystemClock> {
    /// Creates a new builder with no fetcher and no store.
    pub fn new() -> Self {
        Self {
            fetcher: NotSet,
            store: NotSet,
            clock: SystemClock,
            routes: RouteTable::default(),
            unobserved: UnobservedFetch::default(),
        }
    }
}

impl Default for InterceptorBuilder<NotSet, NotSet, SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F, S, C> InterceptorBuilder<F, S, C> {
    /// Sets the network fetcher.
    pub fn fetcher<NewF>(self, fetcher: NewF) -> InterceptorBuilder<NewF, S, C> {
        InterceptorBuilder {
            fetcher,
            store: self.store,
            clock: self.clock,
            routes: self.routes,
            unobserved: self.unobserved,
        }
    }

    /// Sets the cache store.
    pub fn store<NewS>(self, store: NewS) -> InterceptorBuilder<F, NewS, C> {
        InterceptorBuilder {
            fetcher: self.fetcher,
            store,
            clock: self.clock,
            routes: self.routes,
            unobserved: self.unobserved,
        }
    }

    /// Sets the clock used to timestamp and age entries.
    pub fn clock<NewC>(self, clock: NewC) -> InterceptorBuilder<F, S, NewC> {
        InterceptorBuilder {
            fetcher: self.fetcher,
            store: self.store,
            clock,
            routes: self.routes,
            unobserved: self.unobserved,
        }
    }

    /// Sets the cacheable routes.
    pub fn routes(self, routes: RouteTable) -> Self {
        Self { routes, ..self }
    }

    /// Sets what happens to a shared fetch once all its callers cancelled.
    pub fn unobserved(self, unobserved: UnobservedFetch) -> Self {
        Self { unobserved, ..self }
    }
}

impl<F, S, C> InterceptorBuilder<F, S, C>
where
    F: Fetch,
    S: Store + 'static,
    C: Clock,
{
    /// Builds the [`Interceptor`].
    pub fn build(self) -> Interceptor<F, S, C> {
        Interceptor {
            inner: Arc::new(Shared {
                routes: self.routes,
                cache: CacheStore::new(self.store),
                coalescer: Coalescer::new(self.unobserved),
                fetcher: self.fetcher,
                clock: self.clock,
            }),
        }
    }
}
