use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use http::StatusCode;
use thiserror::Error;

use crate::request::FetchRequest;
use crate::response::CachedResponse;

/// Error produced by a network fetch.
///
/// One fetch outcome is delivered to every caller waiting on it, so the error
/// is cheap to clone: foreign errors are kept behind an [`Arc`].
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The server answered with a non-success status.
    #[error("upstream responded with status {status}")]
    Status {
        /// Status code returned by the server.
        status: StatusCode,
    },
    /// The request could not be completed (connect, TLS, read failure...).
    #[error("network error: {0}")]
    Network(Arc<dyn StdError + Send + Sync>),
    /// Any other failure reported by the fetch implementation.
    #[error("{0}")]
    Other(String),
}

impl FetchError {
    /// Wraps a transport error.
    pub fn network<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Network(Arc::new(error))
    }

    /// Creates a status error.
    pub fn status(status: StatusCode) -> Self {
        Self::Status { status }
    }
}

/// Performs the actual network exchange for a request.
///
/// This trait is transport-agnostic: implement it for any HTTP client. A
/// non-success response should be reported as [`FetchError::Status`] so that
/// it is never written to the cache.
///
/// # Examples
///
/// ```rust,ignore
/// use fetchgate_core::{CachedResponse, Fetch, FetchError, FetchRequest};
/// use std::future::Ready;
///
/// struct Static(CachedResponse);
///
/// impl Fetch for Static {
///     type Future = Ready<Result<CachedResponse, FetchError>>;
///
///     fn fetch(&self, _request: FetchRequest) -> Self::Future {
///         std::future::ready(Ok(self.0.clone()))
///     }
/// }
/// ```
pub trait Fetch: Send + Sync + 'static {
    /// The future that resolves to the fetch outcome.
    ///
    /// It must be `'static`: a shared fetch outlives the caller that started it.
    type Future: Future<Output = Result<CachedResponse, FetchError>> + Send + 'static;

    /// Sends the request to the network.
    fn fetch(&self, request: FetchRequest) -> Self::Future;
}

impl<T> Fetch for Arc<T>
where
    T: Fetch,
{
    type Future = T::Future;

    fn fetch(&self, request: FetchRequest) -> Self::Future {
        self.as_ref().fetch(request)
    }
}

/// [`Fetch`] implementation backed by a closure.
///
/// ```
/// use fetchgate_core::{CachedResponse, FetchError, FetchFn, FetchRequest};
///
/// let fetcher = FetchFn::new(|request: FetchRequest| async move {
///     Ok::<_, FetchError>(CachedResponse::ok(request.url().to_owned()))
/// });
/// # let _ = fetcher;
/// ```
#[derive(Clone)]
pub struct FetchFn<F> {
    f: F,
}

impl<F> FetchFn<F> {
    /// Wraps a closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> fmt::Debug for FetchFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchFn").finish_non_exhaustive()
    }
}

impl<F, Fut> Fetch for FetchFn<F>
where
    F: Fn(FetchRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<CachedResponse, FetchError>> + Send + 'static,
{
    type Future = Fut;

    fn fetch(&self, request: FetchRequest) -> Self::Future {
        (self.f)(request)
    }
}
