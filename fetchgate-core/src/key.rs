//! Request key type.
//!
//! A [`RequestKey`] identifies one cacheable resource. It is derived from the
//! request method and URL:
//!
//! - `GET` requests use the URL as-is: `https://host/api/items/1`
//! - any other method is prefixed: `POST https://host/api/items`
//!
//! ```
//! use fetchgate_core::{FetchRequest, RequestKey};
//! use http::Method;
//!
//! let get = FetchRequest::get("https://host/api/items/1");
//! assert_eq!(RequestKey::from_request(&get).as_str(), "https://host/api/items/1");
//!
//! let post = FetchRequest::new(Method::POST, "https://host/api/items");
//! assert_eq!(RequestKey::from_request(&post).as_str(), "POST https://host/api/items");
//! ```
//!
//! [`RequestKey`] wraps a [`SmolStr`], so cloning is cheap: short keys are
//! stored inline and long ones share a reference-counted buffer.

use std::fmt;

use http::Method;
use serde::{Deserialize, Serialize};
use smol_str::{SmolStr, format_smolstr};

use crate::request::FetchRequest;

/// Key identifying a cacheable resource.
///
/// Two requests for the same logical resource always produce equal keys;
/// requests for different resources (different URL, or a different method)
/// produce different keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestKey(SmolStr);

impl RequestKey {
    /// Creates a key from a raw string.
    ///
    /// Prefer [`RequestKey::from_request`] when a request is at hand so that
    /// keys stay consistent with the ones the interceptor derives.
    pub fn new(key: impl Into<SmolStr>) -> Self {
        Self(key.into())
    }

    /// Derives the key for a request.
    pub fn from_request(request: &FetchRequest) -> Self {
        Self::from_parts(request.method(), request.url())
    }

    /// Derives the key from a method and URL.
    pub fn from_parts(method: &Method, url: &str) -> Self {
        if method == Method::GET {
            Self(SmolStr::new(url))
        } else {
            Self(format_smolstr!("{} {}", method, url))
        }
    }

    /// Returns the key as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the approximate memory held by this key in bytes.
    ///
    /// `SmolStr` keeps strings up to 23 bytes inline, so only longer keys
    /// add heap content.
    pub fn memory_size(&self) -> usize {
        std::mem::size_of::<Self>() + self.0.len().saturating_sub(23)
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RequestKey {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl AsRef<str> for RequestKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn same_resource_same_key() {
        let a = FetchRequest::get("https://host/api/experiments/1");
        let b = FetchRequest::get("https://host/api/experiments/1");
        assert_eq!(RequestKey::from_request(&a), RequestKey::from_request(&b));
    }

    #[test]
    fn method_is_part_of_non_get_keys() {
        let get = RequestKey::from_parts(&Method::GET, "https://host/x");
        let head = RequestKey::from_parts(&Method::HEAD, "https://host/x");
        assert_ne!(get, head);
        assert_eq!(head.as_str(), "HEAD https://host/x");
    }

    #[test]
    fn query_string_distinguishes_keys() {
        let a = RequestKey::from_parts(&Method::GET, "https://host/x?page=1");
        let b = RequestKey::from_parts(&Method::GET, "https://host/x?page=2");
        assert_ne!(a, b);
    }

    #[test]
    fn memory_size_counts_heap_content() {
        let short = RequestKey::new("short");
        let long = RequestKey::new("x".repeat(100));
        assert_eq!(short.memory_size(), std::mem::size_of::<RequestKey>());
        assert_eq!(long.memory_size(), std::mem::size_of::<RequestKey>() + 77);
    }
}
