//! Error types surfaced to callers.

use fetchgate_core::FetchError;
use thiserror::Error;

use crate::coalesce::Abandoned;

/// Error returned by [`Interceptor::intercept`](crate::Interceptor::intercept).
///
/// Store failures never show up here: they are logged and the request falls
/// back to the network.
#[derive(Debug, Clone, Error)]
pub enum InterceptError {
    /// The network fetch failed. Every caller waiting on the same fetch gets
    /// this same error.
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// This caller cancelled its request before it settled.
    #[error("request was aborted by the caller")]
    Aborted,
    /// The shared fetch disappeared without settling.
    #[error(transparent)]
    Abandoned(#[from] Abandoned),
}

impl InterceptError {
    /// Returns `true` if the caller cancelled the request.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }

    /// Returns the underlying fetch error, if any.
    pub fn as_fetch(&self) -> Option<&FetchError> {
        match self {
            Self::Fetch(error) => Some(error),
            _ => None,
        }
    }
}

/// Error building a route table or loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A route pattern is not a valid regular expression.
    #[error("invalid route pattern `{pattern}`")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Why it was rejected.
        #[source]
        source: regex::Error,
    },
    /// The configuration document could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(String),
    /// The configuration is well formed but contradictory.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
