//! Outbound request descriptor.

use http::{HeaderMap, HeaderName, HeaderValue, Method};

use crate::key::RequestKey;

/// A request the interceptor may serve from cache or forward to the network.
///
/// Only the parts that matter for caching and for replaying the request are
/// kept: the method, the absolute URL and the request headers. Request bodies
/// are not cached and therefore not carried.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    method: Method,
    url: String,
    headers: HeaderMap,
}

impl FetchRequest {
    /// Creates a request with the given method and URL and no headers.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
        }
    }

    /// Creates a `GET` request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// Adds a header, replacing any previous value with the same name.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Replaces all headers.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Returns the HTTP method.
    #[inline]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request URL.
    #[inline]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the request headers.
    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the key identifying the resource this request targets.
    pub fn key(&self) -> RequestKey {
        RequestKey::from_request(self)
    }

    /// Consumes the request and returns its parts.
    pub fn into_parts(self) -> (Method, String, HeaderMap) {
        (self.method, self.url, self.headers)
    }
}
