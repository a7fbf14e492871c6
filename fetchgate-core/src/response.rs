//! Buffered response type shared between waiters.
//!
//! A [`CachedResponse`] is fully buffered so it can be cloned cheaply: the
//! body is [`Bytes`] (reference counted) and the headers are a plain
//! [`HeaderMap`]. The same value is handed to every caller that waited on one
//! network fetch, and the same value is what the store keeps.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::{HeaderMap, StatusCode, header};

/// A buffered HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl CachedResponse {
    /// Creates a response from its parts.
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// Creates a `200 OK` response with no headers.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(StatusCode::OK, HeaderMap::new(), body)
    }

    /// Returns the status code.
    #[inline]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the response headers.
    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns a mutable reference to the response headers.
    #[inline]
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Returns the buffered body.
    #[inline]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns `true` for 2xx responses.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Parses the `Date` header, if present and well formed.
    ///
    /// HTTP dates use the IMF-fixdate form (`Sun, 06 Nov 1994 08:49:37 GMT`),
    /// which is a valid RFC 2822 date.
    pub fn date(&self) -> Option<DateTime<Utc>> {
        let value = self.headers.get(header::DATE)?.to_str().ok()?;
        DateTime::parse_from_rfc2822(value)
            .ok()
            .map(|date| date.with_timezone(&Utc))
    }

    /// Returns the approximate memory held by this response in bytes.
    pub fn memory_size(&self) -> usize {
        let headers: usize = self
            .headers
            .iter()
            .map(|(name, value)| name.as_str().len() + value.len())
            .sum();
        std::mem::size_of::<Self>() + headers + self.body.len()
    }

    /// Consumes the response and returns its parts.
    pub fn into_parts(self) -> (StatusCode, HeaderMap, Bytes) {
        (self.status, self.headers, self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use http::HeaderValue;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_http_date_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::DATE,
            HeaderValue::from_static("Sun, 06 Nov 1994 08:49:37 GMT"),
        );
        let response = CachedResponse::new(StatusCode::OK, headers, "body");

        let expected = Utc.with_ymd_and_hms(1994, 11, 6, 8, 49, 37).unwrap();
        assert_eq!(response.date(), Some(expected));
    }

    #[test]
    fn malformed_date_header_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::DATE, HeaderValue::from_static("yesterday"));
        let response = CachedResponse::new(StatusCode::OK, headers, "body");
        assert_eq!(response.date(), None);
    }

    #[test]
    fn missing_date_header() {
        assert_eq!(CachedResponse::ok("body").date(), None);
    }
}
