//! Store label type.
//!
//! `StoreLabel` is a newtype wrapper around `SmolStr` naming a cache store in
//! logs and metrics, e.g. `"api-cache"`.

use smol_str::SmolStr;
use std::fmt;

/// A label identifying a cache store.
///
/// # Example
/// ```
/// use fetchgate_core::StoreLabel;
///
/// let label = StoreLabel::new_static("api-cache");
/// assert_eq!(label.as_str(), "api-cache");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct StoreLabel(SmolStr);

impl StoreLabel {
    /// Creates a new store label.
    #[inline]
    pub fn new(s: impl Into<SmolStr>) -> Self {
        Self(s.into())
    }

    /// Creates a store label from a static string (no allocation).
    #[inline]
    pub const fn new_static(s: &'static str) -> Self {
        Self(SmolStr::new_static(s))
    }

    /// Returns the label as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for StoreLabel {
    fn from(s: &'static str) -> Self {
        Self::new_static(s)
    }
}

impl From<String> for StoreLabel {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<SmolStr> for StoreLabel {
    fn from(s: SmolStr) -> Self {
        Self(s)
    }
}
