//! Error types for store operations.

use thiserror::Error;

/// Error type for store operations.
///
/// The interceptor never surfaces these to callers: a failed read is treated
/// as a miss and a failed write as fetch-without-caching. The variants exist
/// so stores can report *what* went wrong in logs.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Internal store error, state or computation error.
    ///
    /// Any error not related to network interaction.
    #[error(transparent)]
    InternalError(Box<dyn std::error::Error + Send + Sync>),

    /// Connection error.
    ///
    /// Errors occurring while talking to an out-of-process store.
    #[error(transparent)]
    ConnectionError(Box<dyn std::error::Error + Send + Sync>),

    /// The store is not available at all (closed, not yet opened).
    #[error("store `{0}` is unavailable")]
    Unavailable(String),
}

impl StoreError {
    /// Wraps an internal error.
    pub fn internal<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::InternalError(Box::new(error))
    }
}
