//! Key material resolution.
//!
//! [`KeyMaterialProvider`] answers "which key do I use for this algorithm and
//! key id" for the four JOSE operations. [`DefaultKeyProvider`] combines up to
//! three sources:
//! - a shared secret for `HS*`, `A*KW` and `dir`
//! - a local [`KeyStore`] holding private keys
//! - a JWK Set, given inline or fetched from a JWKS URI and cached with a TTL
//!
//! The JWKS cache is the only shared mutable state. Concurrent refreshes may
//! race; the last completed fetch wins.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use oidc_core::config::{KeyConfig, KeySelectionStrategy};
use oidc_crypto::{
    EllipticCurve, JsonWebKey, JsonWebKeySet, KeyEncryptionAlgorithm, KeyFamily, KeyMaterial,
    KeyType, KeyUse, SignatureAlgorithm, SymmetricKey,
};
use parking_lot::RwLock;
use tracing::{debug, instrument, warn};

use crate::error::{KeyError, KeyResult};
use crate::jwks_client::JwksClient;
use crate::keystore::{KeyAlgorithm, KeyStore};

/// Minimum age of the cached JWKS before an unknown kid triggers a refetch.
const MIN_REFETCH_INTERVAL: Duration = Duration::from_secs(10);

/// A key resolved for one operation, with the id the recipient needs.
#[derive(Debug, Clone)]
pub struct ResolvedKey {
    /// Key id to put in (or that matched) the JOSE header.
    pub kid: Option<String>,
    /// Key material.
    pub material: KeyMaterial,
}

/// Resolves key material for JOSE operations.
#[async_trait]
pub trait KeyMaterialProvider: Send + Sync {
    /// Resolves the key used to sign with `alg`.
    ///
    /// Symmetric algorithms return the shared secret. Asymmetric algorithms
    /// look up `kid` in the key store, or select a key whose algorithm matches.
    async fn resolve_signing_key(
        &self,
        alg: SignatureAlgorithm,
        kid: Option<&str>,
    ) -> KeyResult<ResolvedKey>;

    /// Resolves the key used to verify a signature made with `alg`.
    async fn resolve_verification_key(
        &self,
        alg: SignatureAlgorithm,
        kid: Option<&str>,
    ) -> KeyResult<ResolvedKey>;

    /// Resolves the recipient key used to encrypt with `alg`.
    async fn resolve_encryption_key(
        &self,
        alg: KeyEncryptionAlgorithm,
        kid: Option<&str>,
    ) -> KeyResult<ResolvedKey>;

    /// Resolves the key used to decrypt a JWE whose `alg` is `alg`.
    async fn resolve_decryption_key(
        &self,
        alg: KeyEncryptionAlgorithm,
        kid: Option<&str>,
    ) -> KeyResult<ResolvedKey>;
}

struct CachedJwks {
    jwks: Arc<JsonWebKeySet>,
    fetched_at: Instant,
}

struct RemoteJwks {
    uri: String,
    client: JwksClient,
    cache: RwLock<Option<CachedJwks>>,
    ttl: Duration,
    min_refetch: Duration,
}

/// Describes what a lookup needs.
struct KeyQuery<'a> {
    alg: KeyAlgorithm,
    family: KeyFamily,
    curve: Option<EllipticCurve>,
    key_use: KeyUse,
    kid: Option<&'a str>,
    need_private: bool,
}

impl KeyQuery<'_> {
    fn jwk_matches(&self, jwk: &JsonWebKey) -> bool {
        let alg_ok = jwk.alg.as_deref().is_none_or(|alg| alg == self.alg.jwa_name());
        let use_ok = jwk.key_use.is_none_or(|key_use| key_use == self.key_use);
        let kty_ok = match self.family {
            KeyFamily::Rsa => jwk.kty == KeyType::Rsa,
            KeyFamily::Ec => jwk.kty == KeyType::Ec && jwk.crv == self.curve,
            KeyFamily::Symmetric => jwk.kty == KeyType::Oct,
            KeyFamily::None => false,
        };
        alg_ok && use_ok && kty_ok
    }
}

/// Key provider backed by a shared secret, a key store and a JWK Set.
pub struct DefaultKeyProvider {
    shared_secret: Option<SymmetricKey>,
    keystore: Option<Arc<RwLock<KeyStore>>>,
    static_jwks: Option<Arc<JsonWebKeySet>>,
    remote: Option<RemoteJwks>,
    strategy: KeySelectionStrategy,
}

impl std::fmt::Debug for DefaultKeyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultKeyProvider")
            .field("shared_secret", &self.shared_secret.as_ref().map(|_| "[REDACTED]"))
            .field("keystore", &self.keystore.is_some())
            .field("static_jwks", &self.static_jwks.as_ref().map(|jwks| jwks.len()))
            .field("jwks_uri", &self.remote.as_ref().map(|remote| remote.uri.as_str()))
            .field("strategy", &self.strategy)
            .finish()
    }
}

impl Default for DefaultKeyProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl DefaultKeyProvider {
    /// Creates a provider with no key sources.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            shared_secret: None,
            keystore: None,
            static_jwks: None,
            remote: None,
            strategy: KeySelectionStrategy::Newest,
        }
    }

    /// Creates a provider from configuration.
    ///
    /// Opens the key store when `keystore_path` and `keystore_password` are
    /// set, and prepares the JWKS client when `jwks_uri` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the key store cannot be opened.
    pub fn from_config(config: &KeyConfig) -> KeyResult<Self> {
        let mut provider = Self::new().with_strategy(config.selection_strategy);
        if let (Some(path), Some(password)) = (&config.keystore_path, &config.keystore_password) {
            let store = KeyStore::open(path, password)?;
            provider = provider.with_keystore(Arc::new(RwLock::new(store)));
        }
        if let Some(uri) = &config.jwks_uri {
            provider = provider.with_jwks_uri(uri, config.jwks_timeout(), config.jwks_cache_ttl())?;
        }
        Ok(provider)
    }

    /// Sets the shared secret (client secret, UTF-8 bytes).
    #[must_use]
    pub fn with_shared_secret(mut self, secret: &str) -> Self {
        self.shared_secret = Some(SymmetricKey::from_secret(secret));
        self
    }

    /// Sets the local key store.
    #[must_use]
    pub fn with_keystore(mut self, keystore: Arc<RwLock<KeyStore>>) -> Self {
        self.keystore = Some(keystore);
        self
    }

    /// Sets an inline JWK Set (for example a client's registered `jwks`).
    #[must_use]
    pub fn with_jwks(mut self, jwks: JsonWebKeySet) -> Self {
        self.static_jwks = Some(Arc::new(jwks));
        self
    }

    /// Sets a remote JWKS URI.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_jwks_uri(mut self, uri: &str, timeout: Duration, ttl: Duration) -> KeyResult<Self> {
        self.remote = Some(RemoteJwks {
            uri: uri.to_string(),
            client: JwksClient::new(timeout)?,
            cache: RwLock::new(None),
            ttl,
            min_refetch: MIN_REFETCH_INTERVAL,
        });
        Ok(self)
    }

    /// Sets how old the cached JWKS must be before an unknown kid forces a
    /// refetch. Has no effect without a JWKS URI.
    #[must_use]
    pub fn with_min_refetch_interval(mut self, interval: Duration) -> Self {
        if let Some(remote) = &mut self.remote {
            remote.min_refetch = interval;
        }
        self
    }

    /// Sets the key selection strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: KeySelectionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Returns the key store, if configured.
    #[must_use]
    pub fn keystore(&self) -> Option<&Arc<RwLock<KeyStore>>> {
        self.keystore.as_ref()
    }

    /// Drops the cached remote JWKS so the next lookup refetches it.
    pub fn invalidate_cache(&self) {
        if let Some(remote) = &self.remote {
            *remote.cache.write() = None;
        }
    }

    fn secret(&self, alg: &str, kid: Option<&str>) -> KeyResult<ResolvedKey> {
        let secret = self
            .shared_secret
            .clone()
            .ok_or_else(|| KeyError::not_found(alg, kid))?;
        Ok(ResolvedKey {
            kid: kid.map(str::to_string),
            material: KeyMaterial::Symmetric(secret),
        })
    }

    fn find_in_keystore(&self, query: &KeyQuery<'_>) -> Option<ResolvedKey> {
        let store = self.keystore.as_ref()?.read();
        let now = Utc::now();
        let entry = match query.kid {
            Some(kid) => store
                .get(kid)
                .filter(|entry| entry.alg == query.alg)
                .filter(|entry| !query.need_private || !entry.is_expired(now)),
            None if query.need_private => store.select(query.alg, now, self.strategy),
            None => sole(store.entries().iter().filter(|entry| entry.alg == query.alg)),
        }?;
        let material = if query.need_private {
            entry.material.clone()
        } else {
            entry.material.to_public()
        };
        Some(ResolvedKey {
            kid: Some(entry.kid.clone()),
            material,
        })
    }

    async fn find_in_jwks(&self, query: &KeyQuery<'_>) -> KeyResult<Option<ResolvedKey>> {
        if let Some(jwks) = &self.static_jwks
            && let Some(found) = pick_jwk(jwks, query)?
        {
            return Ok(Some(found));
        }
        let Some(remote) = &self.remote else {
            return Ok(None);
        };

        let (jwks, fresh) = remote.get(false).await?;
        if let Some(found) = pick_jwk(&jwks, query)? {
            return Ok(Some(found));
        }
        if query.kid.is_some() && !fresh && remote.age() >= remote.min_refetch {
            debug!(kid = ?query.kid, "kid not in cached JWKS, refetching");
            let (jwks, _) = remote.get(true).await?;
            return pick_jwk(&jwks, query);
        }
        Ok(None)
    }

    async fn jwks_then_keystore(&self, query: &KeyQuery<'_>) -> KeyResult<ResolvedKey> {
        match self.find_in_jwks(query).await {
            Ok(Some(found)) => Ok(found),
            Ok(None) => self
                .find_in_keystore(query)
                .ok_or_else(|| KeyError::not_found(query.alg, query.kid)),
            Err(e) => {
                warn!(error = %e, "JWKS lookup failed");
                self.find_in_keystore(query).ok_or(e)
            }
        }
    }

    async fn keystore_then_jwks(&self, query: &KeyQuery<'_>) -> KeyResult<ResolvedKey> {
        if let Some(found) = self.find_in_keystore(query) {
            return Ok(found);
        }
        self.find_in_jwks(query)
            .await?
            .ok_or_else(|| KeyError::not_found(query.alg, query.kid))
    }
}

impl RemoteJwks {
    fn age(&self) -> Duration {
        self.cache
            .read()
            .as_ref()
            .map_or(Duration::MAX, |cached| cached.fetched_at.elapsed())
    }

    /// Returns the cached set, fetching when stale or forced. The flag tells
    /// whether this call fetched it.
    async fn get(&self, force: bool) -> KeyResult<(Arc<JsonWebKeySet>, bool)> {
        if !force {
            let cached = self
                .cache
                .read()
                .as_ref()
                .filter(|cached| cached.fetched_at.elapsed() < self.ttl)
                .map(|cached| Arc::clone(&cached.jwks));
            if let Some(jwks) = cached {
                return Ok((jwks, false));
            }
        }

        let jwks = Arc::new(self.client.fetch(&self.uri).await?);
        *self.cache.write() = Some(CachedJwks {
            jwks: Arc::clone(&jwks),
            fetched_at: Instant::now(),
        });
        Ok((jwks, true))
    }
}

/// Returns the only item, or `None` when there are none or several.
fn sole<T>(mut items: impl Iterator<Item = T>) -> Option<T> {
    match (items.next(), items.next()) {
        (Some(only), None) => Some(only),
        _ => None,
    }
}

fn pick_jwk(jwks: &JsonWebKeySet, query: &KeyQuery<'_>) -> KeyResult<Option<ResolvedKey>> {
    let jwk = match query.kid {
        Some(kid) => jwks.find_key(kid).filter(|jwk| query.jwk_matches(jwk)),
        None => sole(jwks.keys.iter().filter(|jwk| query.jwk_matches(jwk))),
    };
    let Some(jwk) = jwk else {
        return Ok(None);
    };

    let material = jwk.to_key_material()?;
    if query.need_private && !material.has_private() {
        return Ok(None);
    }
    Ok(Some(ResolvedKey {
        kid: jwk.kid.clone(),
        material,
    }))
}

fn signature_query(alg: SignatureAlgorithm, kid: Option<&str>, need_private: bool) -> KeyQuery<'_> {
    KeyQuery {
        alg: KeyAlgorithm::Signature(alg),
        family: alg.key_family(),
        curve: alg.curve(),
        key_use: KeyUse::Sig,
        kid,
        need_private,
    }
}

fn encryption_query(alg: KeyEncryptionAlgorithm, kid: Option<&str>, need_private: bool) -> KeyQuery<'_> {
    KeyQuery {
        alg: KeyAlgorithm::Encryption(alg),
        family: alg.key_family(),
        curve: None,
        key_use: KeyUse::Enc,
        kid,
        need_private,
    }
}

#[async_trait]
impl KeyMaterialProvider for DefaultKeyProvider {
    #[instrument(skip_all, fields(alg = %alg, kid = ?kid))]
    async fn resolve_signing_key(
        &self,
        alg: SignatureAlgorithm,
        kid: Option<&str>,
    ) -> KeyResult<ResolvedKey> {
        match alg.key_family() {
            KeyFamily::None => Err(KeyError::UnsupportedAlgorithm(alg.to_string())),
            KeyFamily::Symmetric => self.secret(alg.jwa_name(), kid),
            KeyFamily::Rsa | KeyFamily::Ec => {
                self.keystore_then_jwks(&signature_query(alg, kid, true)).await
            }
        }
    }

    #[instrument(skip_all, fields(alg = %alg, kid = ?kid))]
    async fn resolve_verification_key(
        &self,
        alg: SignatureAlgorithm,
        kid: Option<&str>,
    ) -> KeyResult<ResolvedKey> {
        match alg.key_family() {
            KeyFamily::None => Err(KeyError::UnsupportedAlgorithm(alg.to_string())),
            KeyFamily::Symmetric => self.secret(alg.jwa_name(), kid),
            KeyFamily::Rsa | KeyFamily::Ec => {
                self.jwks_then_keystore(&signature_query(alg, kid, false)).await
            }
        }
    }

    #[instrument(skip_all, fields(alg = %alg, kid = ?kid))]
    async fn resolve_encryption_key(
        &self,
        alg: KeyEncryptionAlgorithm,
        kid: Option<&str>,
    ) -> KeyResult<ResolvedKey> {
        match alg.key_family() {
            KeyFamily::Symmetric => self.secret(alg.jwa_name(), kid),
            _ => self.jwks_then_keystore(&encryption_query(alg, kid, false)).await,
        }
    }

    #[instrument(skip_all, fields(alg = %alg, kid = ?kid))]
    async fn resolve_decryption_key(
        &self,
        alg: KeyEncryptionAlgorithm,
        kid: Option<&str>,
    ) -> KeyResult<ResolvedKey> {
        match alg.key_family() {
            KeyFamily::Symmetric => self.secret(alg.jwa_name(), kid),
            _ => self.keystore_then_jwks(&encryption_query(alg, kid, true)).await,
        }
    }
}
