//! Retrieval of request objects passed by reference.

use std::time::Duration;

use oidc_core::config::RequestObjectConfig;
use oidc_crypto::{b64_encode, sha256};
use tracing::{debug, instrument};
use url::Url;

use crate::client::ClientMetadata;
use crate::error::{RequestObjectError, RequestObjectResult};

/// Fetches `request_uri` documents.
#[derive(Debug, Clone)]
pub struct RequestUriFetcher {
    client: reqwest::Client,
    blocklist: Vec<String>,
}

impl RequestUriFetcher {
    /// Creates a fetcher with the configured timeout and blocklist.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &RequestObjectConfig) -> RequestObjectResult<Self> {
        Self::with_timeout(config.request_uri_timeout(), config.request_uri_blocklist.clone())
    }

    /// Creates a fetcher with an explicit timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_timeout(timeout: Duration, blocklist: Vec<String>) -> RequestObjectResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| RequestObjectError::RequestUriUnavailable(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { client, blocklist })
    }

    /// Checks `uri` against the blocklist and the client's registered
    /// `request_uris`.
    ///
    /// Registered URIs are compared without their fragment.
    ///
    /// # Errors
    ///
    /// Returns [`RequestObjectError::RequestUriRejected`].
    pub fn check(&self, uri: &str, client: &ClientMetadata) -> RequestObjectResult<Url> {
        let parsed = Url::parse(uri).map_err(|_| RequestObjectError::RequestUriRejected("not a URL".to_string()))?;
        if !matches!(parsed.scheme(), "https" | "http") {
            return Err(RequestObjectError::RequestUriRejected(format!(
                "scheme {} is not allowed",
                parsed.scheme()
            )));
        }
        if self.blocklist.iter().any(|blocked| uri.contains(blocked.as_str())) {
            return Err(RequestObjectError::RequestUriRejected("URI is blocked".to_string()));
        }
        if !client.request_uris.is_empty() {
            let bare = without_fragment(&parsed);
            let registered = client
                .request_uris
                .iter()
                .filter_map(|r| Url::parse(r).ok())
                .any(|r| without_fragment(&r) == bare);
            if !registered {
                return Err(RequestObjectError::RequestUriRejected("URI is not registered".to_string()));
            }
        }
        Ok(parsed)
    }

    /// Fetches the request object at `uri` for `client`.
    ///
    /// When the URI carries a fragment, it must be the base64url SHA-256 of
    /// the body.
    ///
    /// # Errors
    ///
    /// Returns [`RequestObjectError::RequestUriRejected`] when the URI is not
    /// allowed or the body does not match its fragment, and
    /// [`RequestObjectError::RequestUriUnavailable`] when retrieval fails.
    #[instrument(skip_all, fields(client_id = %client.client_id))]
    pub async fn fetch(&self, uri: &str, client: &ClientMetadata) -> RequestObjectResult<String> {
        let parsed = self.check(uri, client)?;
        let fragment = parsed.fragment().map(str::to_string);

        let response = self
            .client
            .get(without_fragment(&parsed))
            .send()
            .await
            .map_err(|e| RequestObjectError::RequestUriUnavailable(format!("request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(RequestObjectError::RequestUriUnavailable(format!("answered {status}")));
        }
        let body = response
            .text()
            .await
            .map_err(|e| RequestObjectError::RequestUriUnavailable(format!("cannot read body: {e}")))?;

        if let Some(expected) = fragment
            && b64_encode(&sha256(body.as_bytes())) != expected
        {
            return Err(RequestObjectError::RequestUriRejected(
                "body does not match the URI fragment".to_string(),
            ));
        }
        debug!(bytes = body.len(), "fetched request object");
        Ok(body.trim().to_string())
    }
}

fn without_fragment(url: &Url) -> Url {
    let mut url = url.clone();
    url.set_fragment(None);
    url
}
