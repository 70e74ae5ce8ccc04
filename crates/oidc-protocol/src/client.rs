//! Registered client metadata and lookup.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use oidc_core::config::KeyConfig;
use oidc_crypto::hash::constant_time_eq;
use oidc_crypto::{BlockEncryptionAlgorithm, JsonWebKeySet, KeyEncryptionAlgorithm, SignatureAlgorithm};
use oidc_keystore::{DefaultKeyProvider, KeyResult, KeyStore};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::OidcResult;

/// Metadata of a registered client relevant to request and response objects.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientMetadata {
    /// Client identifier.
    pub client_id: String,

    /// Client secret. Also the shared key for `HS*`, `A*KW` and `dir`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Registered redirect URIs.
    pub redirect_uris: Vec<String>,

    /// Registered `request_uri` values. Empty means any URI not blocked.
    pub request_uris: Vec<String>,

    /// Inline public keys.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwks: Option<JsonWebKeySet>,

    /// Location of the client's public keys.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwks_uri: Option<String>,

    /// Algorithm the client signs request objects with. `none` must be
    /// registered here for unsigned request objects to be accepted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_object_signing_alg: Option<SignatureAlgorithm>,

    /// ID Token signature algorithm.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token_signed_response_alg: Option<SignatureAlgorithm>,

    /// ID Token key management algorithm.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token_encrypted_response_alg: Option<KeyEncryptionAlgorithm>,

    /// ID Token content encryption algorithm.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token_encrypted_response_enc: Option<BlockEncryptionAlgorithm>,

    /// `UserInfo` signature algorithm. Unset means plain JSON.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub userinfo_signed_response_alg: Option<SignatureAlgorithm>,

    /// `UserInfo` key management algorithm.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub userinfo_encrypted_response_alg: Option<KeyEncryptionAlgorithm>,

    /// `UserInfo` content encryption algorithm.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub userinfo_encrypted_response_enc: Option<BlockEncryptionAlgorithm>,
}

impl fmt::Debug for ClientMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientMetadata")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .field("redirect_uris", &self.redirect_uris)
            .field("request_uris", &self.request_uris)
            .field("jwks_uri", &self.jwks_uri)
            .field("request_object_signing_alg", &self.request_object_signing_alg)
            .finish_non_exhaustive()
    }
}

impl ClientMetadata {
    /// Creates a confidential client.
    #[must_use]
    pub fn new(client_id: impl Into<String>, client_secret: Option<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret,
            ..Self::default()
        }
    }

    /// Adds a redirect URI.
    #[must_use]
    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uris.push(uri.into());
        self
    }

    /// Sets the inline JWK Set.
    #[must_use]
    pub fn with_jwks(mut self, jwks: JsonWebKeySet) -> Self {
        self.jwks = Some(jwks);
        self
    }

    /// Returns whether the client has a secret.
    #[must_use]
    pub const fn is_confidential(&self) -> bool {
        self.client_secret.is_some()
    }

    /// Checks presented credentials in constant time.
    ///
    /// A confidential client must present its secret. A public client must
    /// not present one.
    #[must_use]
    pub fn verify_secret(&self, presented: Option<&str>) -> bool {
        match (&self.client_secret, presented) {
            (Some(expected), Some(presented)) => constant_time_eq(expected.as_bytes(), presented.as_bytes()),
            (None, None) => true,
            _ => false,
        }
    }

    /// Returns whether `uri` is a registered redirect URI.
    #[must_use]
    pub fn has_redirect_uri(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|registered| registered == uri)
    }

    /// Returns whether the client registered `none` for request objects.
    #[must_use]
    pub fn registered_unsigned_requests(&self) -> bool {
        self.request_object_signing_alg == Some(SignatureAlgorithm::None)
    }

    /// Builds the key provider used for this client's objects.
    ///
    /// The client secret covers symmetric algorithms, the client's JWKS covers
    /// verification and encryption towards the client, and the server key
    /// store covers signing and decryption.
    ///
    /// # Errors
    ///
    /// Returns an error if the JWKS client cannot be built.
    pub fn key_provider(
        &self,
        server_keys: Option<Arc<RwLock<KeyStore>>>,
        config: &KeyConfig,
    ) -> KeyResult<DefaultKeyProvider> {
        let mut provider = DefaultKeyProvider::new().with_strategy(config.selection_strategy);
        if let Some(secret) = &self.client_secret {
            provider = provider.with_shared_secret(secret);
        }
        if let Some(keystore) = server_keys {
            provider = provider.with_keystore(keystore);
        }
        if let Some(jwks) = &self.jwks {
            provider = provider.with_jwks(jwks.clone());
        } else if let Some(uri) = &self.jwks_uri {
            provider = provider.with_jwks_uri(uri, config.jwks_timeout(), config.jwks_cache_ttl())?;
        }
        Ok(provider)
    }
}

/// Client lookup.
#[async_trait]
pub trait ClientRegistry: Send + Sync {
    /// Returns the client with `client_id`, if registered.
    async fn get_client(&self, client_id: &str) -> OidcResult<Option<ClientMetadata>>;
}

/// In-process client registry.
#[derive(Debug, Default)]
pub struct InMemoryClientRegistry {
    clients: RwLock<HashMap<String, ClientMetadata>>,
}

impl InMemoryClientRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces a client.
    pub fn register(&self, client: ClientMetadata) {
        self.clients.write().insert(client.client_id.clone(), client);
    }
}

#[async_trait]
impl ClientRegistry for InMemoryClientRegistry {
    async fn get_client(&self, client_id: &str) -> OidcResult<Option<ClientMetadata>> {
        Ok(self.clients.read().get(client_id).cloned())
    }
}
