//! JWT-encoded `state` parameter.
//!
//! A client can carry request forgery protection and its own claims through
//! the authorization round trip by sending a signed or encrypted `state`.

use oidc_crypto::{SignatureAlgorithm, generate_token_id, random::random_base64url};
use oidc_keystore::KeyMaterialProvider;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{RequestObjectError, RequestObjectResult};
use crate::request_object::builder::{BuiltObject, KeyHints, Protection, protect_claims};
use crate::request_object::validator::decode;

/// Claims of an encoded `state`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateClaims {
    /// Request forgery protection value, bound to the user agent.
    pub rfp: String,
    /// Unique id of this state.
    pub jti: String,
    /// Key the state was protected with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    /// Where to send the user agent after the round trip.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_link_uri: Option<String>,
    /// Client-defined claims.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub additional_claims: Map<String, Value>,
}

impl StateClaims {
    /// Creates a state with a fresh random `rfp` and `jti`.
    #[must_use]
    pub fn generate() -> Self {
        Self::new(random_base64url(32))
    }

    /// Creates a state bound to `rfp`.
    #[must_use]
    pub fn new(rfp: impl Into<String>) -> Self {
        Self {
            rfp: rfp.into(),
            jti: generate_token_id(),
            kid: None,
            target_link_uri: None,
            additional_claims: Map::new(),
        }
    }

    /// Sets the target link URI.
    #[must_use]
    pub fn with_target_link_uri(mut self, uri: impl Into<String>) -> Self {
        self.target_link_uri = Some(uri.into());
        self
    }

    /// Adds a client-defined claim.
    #[must_use]
    pub fn with_claim(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.additional_claims.insert(name.into(), value.into());
        self
    }

    /// Protects the state. `kid` is filled in from the signing key used
    /// unless already set.
    ///
    /// # Errors
    ///
    /// Returns an error if no key is available or protection fails.
    pub async fn encode(
        &self,
        protection: Protection,
        keys: &dyn KeyMaterialProvider,
        hints: KeyHints<'_>,
    ) -> RequestObjectResult<BuiltObject> {
        let mut claims = self.clone();
        if claims.kid.is_none() {
            claims.kid = hints.signing.map(str::to_string);
        }
        let Value::Object(map) = serde_json::to_value(&claims)? else {
            return Err(RequestObjectError::Protection("state claims are not an object".to_string()));
        };
        protect_claims(&map, protection, keys, hints).await
    }

    /// Verifies or decrypts an encoded state.
    ///
    /// # Errors
    ///
    /// Returns an error if the token does not verify or lacks `rfp`/`jti`.
    pub async fn decode(
        token: &str,
        keys: &dyn KeyMaterialProvider,
        accepted: &[SignatureAlgorithm],
    ) -> RequestObjectResult<Self> {
        let jwt = decode(token, keys, accepted).await?;
        jwt.claims_as()
            .map_err(|e| RequestObjectError::InvalidClaims(format!("invalid state: {e}")))
    }

    /// Checks the `rfp` against the value bound to the user agent.
    #[must_use]
    pub fn matches_rfp(&self, expected: &str) -> bool {
        oidc_crypto::hash::constant_time_eq(self.rfp.as_bytes(), expected.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oidc_crypto::{BlockEncryptionAlgorithm, KeyEncryptionAlgorithm};
    use oidc_keystore::{DefaultKeyProvider, KeyAlgorithm, KeyStore};
    use parking_lot::RwLock;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn state() -> StateClaims {
        StateClaims::new("rfp-value")
            .with_target_link_uri("https://rp.example/landing")
            .with_claim("tenant", "acme")
            .with_claim("attempt", 2)
    }

    #[tokio::test]
    async fn state_round_trips_through_every_signature_family() {
        let mut store = KeyStore::in_memory("pw", "CN=Test", 1_000).unwrap();
        for alg in [SignatureAlgorithm::Rs384, SignatureAlgorithm::Ps256, SignatureAlgorithm::Es512] {
            store.generate_key(KeyAlgorithm::Signature(alg), None, 2048).unwrap();
        }
        let keys = DefaultKeyProvider::new()
            .with_shared_secret("state-secret")
            .with_keystore(Arc::new(RwLock::new(store)));

        for alg in [
            SignatureAlgorithm::Hs256,
            SignatureAlgorithm::Rs384,
            SignatureAlgorithm::Ps256,
            SignatureAlgorithm::Es512,
        ] {
            let built = state()
                .encode(Protection::Signed(alg), &keys, KeyHints::default())
                .await
                .unwrap();
            let decoded = StateClaims::decode(&built.token, &keys, &[alg]).await.unwrap();
            assert_eq!(decoded, state(), "{alg}");
            assert!(decoded.matches_rfp("rfp-value"));
        }
    }

    #[tokio::test]
    async fn encrypted_state() {
        let keys = DefaultKeyProvider::new().with_shared_secret("state-secret");
        let built = state()
            .encode(
                Protection::Encrypted {
                    alg: KeyEncryptionAlgorithm::A128Kw,
                    enc: BlockEncryptionAlgorithm::A128Gcm,
                },
                &keys,
                KeyHints::default(),
            )
            .await
            .unwrap();
        let decoded = StateClaims::decode(&built.token, &keys, &[]).await.unwrap();
        assert_eq!(decoded.additional_claims["tenant"], "acme");
        assert!(!decoded.matches_rfp("other"));
    }

    #[tokio::test]
    async fn state_without_rfp_is_invalid() {
        let keys = DefaultKeyProvider::new().with_shared_secret("state-secret");
        let claims = serde_json::json!({"jti": "x"});
        let built = protect_claims(
            claims.as_object().unwrap(),
            Protection::Signed(SignatureAlgorithm::Hs256),
            &keys,
            KeyHints::default(),
        )
        .await
        .unwrap();
        let result = StateClaims::decode(&built.token, &keys, &[SignatureAlgorithm::Hs256]).await;
        assert!(matches!(result, Err(RequestObjectError::InvalidClaims(_))));
    }
}
