//! [`Fetch`] implementation over a plain `reqwest::Client`.

use fetchgate_core::{CachedResponse, Fetch, FetchError, FetchRequest};
use futures::future::BoxFuture;
use tracing::trace;

/// Sends fetches with a [`reqwest::Client`].
///
/// The whole body is read before the response is returned, so one response
/// can be handed to every coalesced caller and stored. Non-success statuses
/// are reported as [`FetchError::Status`] and are never cached.
///
/// Give it a client *without* the cache middleware: the shared fetch must go
/// to the network.
#[derive(Debug, Clone, Default)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    /// Wraps `client`.
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// The wrapped client.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

impl Fetch for ReqwestFetcher {
    type Future = BoxFuture<'static, Result<CachedResponse, FetchError>>;

    fn fetch(&self, request: FetchRequest) -> Self::Future {
        let client = self.client.clone();
        Box::pin(async move {
            let (method, url, headers) = request.into_parts();
            trace!(%method, %url, "sending request");
            let response = client
                .request(method, url)
                .headers(headers)
                .send()
                .await
                .map_err(FetchError::network)?;

            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::status(status));
            }
            let headers = response.headers().clone();
            let body = response.bytes().await.map_err(FetchError::network)?;
            Ok(CachedResponse::new(status, headers, body))
        })
    }
}
