//! Remote JWKS retrieval.

use std::time::Duration;

use oidc_crypto::JsonWebKeySet;
use tracing::debug;

use crate::error::{KeyError, KeyResult};

/// HTTP client for JWKS documents.
#[derive(Debug, Clone)]
pub struct JwksClient {
    client: reqwest::Client,
}

impl JwksClient {
    /// Creates a client whose requests time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> KeyResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| KeyError::KeyStoreUnavailable(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Fetches and parses the JWKS document at `uri`.
    ///
    /// No retry is attempted.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::KeyStoreUnavailable`] if the endpoint is
    /// unreachable, times out, answers with a non-success status or returns a
    /// body that is not a JWK Set.
    pub async fn fetch(&self, uri: &str) -> KeyResult<JsonWebKeySet> {
        let response = self
            .client
            .get(uri)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| KeyError::KeyStoreUnavailable(format!("JWKS request to {uri} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(KeyError::KeyStoreUnavailable(format!(
                "JWKS endpoint {uri} answered {status}"
            )));
        }

        let jwks: JsonWebKeySet = response
            .json()
            .await
            .map_err(|e| KeyError::KeyStoreUnavailable(format!("invalid JWKS from {uri}: {e}")))?;
        debug!(uri, keys = jwks.len(), "fetched JWKS");
        Ok(jwks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn fetches_key_set() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "keys": [{"kty": "RSA", "kid": "k1", "alg": "RS256", "use": "sig", "n": "AQAB", "e": "AQAB"}]
            })))
            .mount(&server)
            .await;

        let client = JwksClient::new(Duration::from_secs(2)).unwrap();
        let jwks = client.fetch(&format!("{}/jwks", server.uri())).await.unwrap();
        assert_eq!(jwks.len(), 1);
        assert!(jwks.find_key("k1").is_some());
    }

    #[tokio::test]
    async fn error_status_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = JwksClient::new(Duration::from_secs(2)).unwrap();
        let result = client.fetch(&format!("{}/jwks", server.uri())).await;
        assert!(matches!(result, Err(KeyError::KeyStoreUnavailable(_))));
    }

    #[tokio::test]
    async fn slow_endpoint_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"keys": []}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client = JwksClient::new(Duration::from_millis(50)).unwrap();
        let result = client.fetch(&server.uri()).await;
        assert!(matches!(result, Err(KeyError::KeyStoreUnavailable(_))));
    }
}
