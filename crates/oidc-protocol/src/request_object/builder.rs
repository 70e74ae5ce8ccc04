//! Request and response object construction.
//!
//! [`protect`] turns a claim set into a compact token by signing it,
//! encrypting it, or signing then encrypting it. [`RequestObjectBuilder`]
//! assembles the claim set of an authorization request object.

use chrono::{Duration, Utc};
use oidc_crypto::header::CONTENT_TYPE_JWT;
use oidc_crypto::{
    BlockEncryptionAlgorithm, JoseHeader, KeyEncryptionAlgorithm, SignatureAlgorithm,
    generate_token_id, jwe, jws,
};
use oidc_keystore::KeyMaterialProvider;
use serde_json::{Map, Value};
use tracing::debug;

use crate::claims::{ClaimConstraint, ClaimsRequest};
use crate::error::{RequestObjectError, RequestObjectResult};

/// Default request object lifetime.
const DEFAULT_LIFETIME_MINUTES: i64 = 5;

/// How a claim set is protected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protection {
    /// Compact JWS.
    Signed(SignatureAlgorithm),
    /// Compact JWE around the raw claims.
    Encrypted {
        /// Key management algorithm.
        alg: KeyEncryptionAlgorithm,
        /// Content encryption algorithm.
        enc: BlockEncryptionAlgorithm,
    },
    /// Compact JWE around a compact JWS (`cty: JWT`).
    SignedThenEncrypted {
        /// Signature algorithm of the inner JWS.
        signing: SignatureAlgorithm,
        /// Key management algorithm.
        alg: KeyEncryptionAlgorithm,
        /// Content encryption algorithm.
        enc: BlockEncryptionAlgorithm,
    },
}

impl Protection {
    /// Derives the protection from registered client algorithms.
    ///
    /// Encryption needs both `alg` and `enc`. Returns `None` when nothing is
    /// registered, meaning plain JSON.
    #[must_use]
    pub const fn from_registration(
        signing: Option<SignatureAlgorithm>,
        alg: Option<KeyEncryptionAlgorithm>,
        enc: Option<BlockEncryptionAlgorithm>,
    ) -> Option<Self> {
        match (signing, alg, enc) {
            (Some(signing), Some(alg), Some(enc)) => Some(Self::SignedThenEncrypted { signing, alg, enc }),
            (None, Some(alg), Some(enc)) => Some(Self::Encrypted { alg, enc }),
            (Some(signing), _, _) => Some(Self::Signed(signing)),
            _ => None,
        }
    }

    /// Returns the signature algorithm, if the object is signed.
    #[must_use]
    pub const fn signature_algorithm(&self) -> Option<SignatureAlgorithm> {
        match self {
            Self::Signed(alg) | Self::SignedThenEncrypted { signing: alg, .. } => Some(*alg),
            Self::Encrypted { .. } => None,
        }
    }
}

/// Key ids to ask the key provider for.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyHints<'a> {
    /// Preferred signing key.
    pub signing: Option<&'a str>,
    /// Preferred recipient key.
    pub encryption: Option<&'a str>,
}

/// A protected object and the keys it was protected with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltObject {
    /// Compact serialization.
    pub token: String,
    /// Signing key id, if the object is signed with an identified key.
    pub kid: Option<String>,
    /// Recipient key id, if the object is encrypted to an identified key.
    pub encryption_kid: Option<String>,
}

/// Signs and/or encrypts `payload`.
///
/// # Errors
///
/// Returns [`RequestObjectError::Key`] when no key is available and
/// [`RequestObjectError::Protection`] when signing or encryption fails.
pub async fn protect(
    payload: &[u8],
    protection: Protection,
    keys: &dyn KeyMaterialProvider,
    hints: KeyHints<'_>,
) -> RequestObjectResult<BuiltObject> {
    match protection {
        Protection::Signed(alg) => {
            let (token, kid) = sign(payload, alg, keys, hints.signing).await?;
            Ok(BuiltObject {
                token,
                kid,
                encryption_kid: None,
            })
        }
        Protection::Encrypted { alg, enc } => {
            let (token, encryption_kid) =
                encrypt(payload, JoseHeader::encrypted(alg, enc), keys, hints.encryption).await?;
            Ok(BuiltObject {
                token,
                kid: None,
                encryption_kid,
            })
        }
        Protection::SignedThenEncrypted { signing, alg, enc } => {
            let (inner, kid) = sign(payload, signing, keys, hints.signing).await?;
            let header = JoseHeader::encrypted(alg, enc).with_cty(CONTENT_TYPE_JWT);
            let (token, encryption_kid) = encrypt(inner.as_bytes(), header, keys, hints.encryption).await?;
            Ok(BuiltObject {
                token,
                kid,
                encryption_kid,
            })
        }
    }
}

/// Serializes `claims` and protects them.
///
/// # Errors
///
/// See [`protect`].
pub async fn protect_claims(
    claims: &Map<String, Value>,
    protection: Protection,
    keys: &dyn KeyMaterialProvider,
    hints: KeyHints<'_>,
) -> RequestObjectResult<BuiltObject> {
    let payload = serde_json::to_vec(claims)
        .map_err(|e| RequestObjectError::Protection(format!("cannot serialize claims: {e}")))?;
    protect(&payload, protection, keys, hints).await
}

async fn sign(
    payload: &[u8],
    alg: SignatureAlgorithm,
    keys: &dyn KeyMaterialProvider,
    kid: Option<&str>,
) -> RequestObjectResult<(String, Option<String>)> {
    if alg == SignatureAlgorithm::None {
        let token = jws::encode(&JoseHeader::signed(alg), payload, None)?;
        return Ok((token, None));
    }
    let key = keys.resolve_signing_key(alg, kid).await?;
    let header = JoseHeader::signed(alg).with_kid(key.kid.clone());
    let token = jws::encode(&header, payload, Some(&key.material))?;
    debug!(%alg, kid = ?key.kid, "signed object");
    Ok((token, key.kid))
}

async fn encrypt(
    payload: &[u8],
    header: JoseHeader,
    keys: &dyn KeyMaterialProvider,
    kid: Option<&str>,
) -> RequestObjectResult<(String, Option<String>)> {
    let (alg, _) = header.encryption_algorithms()?;
    let key = keys.resolve_encryption_key(alg, kid).await?;
    let header = header.with_kid(key.kid.clone());
    let token = jwe::encrypt_compact(&header, payload, &key.material)?;
    debug!(%alg, kid = ?key.kid, "encrypted object");
    Ok((token, key.kid))
}

/// Builds an authorization request object.
#[derive(Debug, Clone, Default)]
pub struct RequestObjectBuilder {
    response_types: Vec<String>,
    response_mode: Option<String>,
    client_id: String,
    scopes: Vec<String>,
    redirect_uri: Option<String>,
    state: Option<String>,
    nonce: Option<String>,
    display: Option<String>,
    prompts: Vec<String>,
    max_age: Option<i64>,
    ui_locales: Vec<String>,
    claims_locales: Vec<String>,
    id_token_hint: Option<String>,
    login_hint: Option<String>,
    acr_values: Vec<String>,
    claims: ClaimsRequest,
    audience: Option<String>,
    issuer: Option<String>,
    lifetime: Option<Duration>,
    not_before: bool,
    extra: Map<String, Value>,
}

impl RequestObjectBuilder {
    /// Starts a request object for `client_id`.
    #[must_use]
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            ..Self::default()
        }
    }

    /// Sets the response types.
    #[must_use]
    pub fn response_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.response_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the response mode.
    #[must_use]
    pub fn response_mode(mut self, mode: impl Into<String>) -> Self {
        self.response_mode = Some(mode.into());
        self
    }

    /// Sets the scopes.
    #[must_use]
    pub fn scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the redirect URI.
    #[must_use]
    pub fn redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(uri.into());
        self
    }

    /// Sets the state.
    #[must_use]
    pub fn state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    /// Sets the nonce.
    #[must_use]
    pub fn nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// Sets the display mode.
    #[must_use]
    pub fn display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }

    /// Adds a prompt value.
    #[must_use]
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompts.push(prompt.into());
        self
    }

    /// Sets the maximum authentication age. Also requests `auth_time` in the
    /// ID Token.
    #[must_use]
    pub const fn max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    /// Sets the UI locales.
    #[must_use]
    pub fn ui_locales<I, S>(mut self, locales: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ui_locales = locales.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the claims locales.
    #[must_use]
    pub fn claims_locales<I, S>(mut self, locales: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.claims_locales = locales.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the ID token hint.
    #[must_use]
    pub fn id_token_hint(mut self, hint: impl Into<String>) -> Self {
        self.id_token_hint = Some(hint.into());
        self
    }

    /// Sets the login hint.
    #[must_use]
    pub fn login_hint(mut self, hint: impl Into<String>) -> Self {
        self.login_hint = Some(hint.into());
        self
    }

    /// Sets the ACR values. They are also requested as voluntary `acr`
    /// values in the ID Token unless `acr` is requested explicitly.
    #[must_use]
    pub fn acr_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.acr_values = values.into_iter().map(Into::into).collect();
        self
    }

    /// Requests a claim in the ID Token.
    #[must_use]
    pub fn id_token_claim(mut self, name: impl Into<String>, constraint: ClaimConstraint) -> Self {
        self.claims.add_id_token_claim(name, constraint);
        self
    }

    /// Requests a claim from the `UserInfo` endpoint.
    #[must_use]
    pub fn userinfo_claim(mut self, name: impl Into<String>, constraint: ClaimConstraint) -> Self {
        self.claims.add_userinfo_claim(name, constraint);
        self
    }

    /// Replaces the whole claims request.
    #[must_use]
    pub fn claims(mut self, claims: ClaimsRequest) -> Self {
        self.claims = claims;
        self
    }

    /// Sets `aud`, normally the authorization server issuer.
    #[must_use]
    pub fn audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Sets `iss`. Defaults to the client id.
    #[must_use]
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Sets the lifetime used for `exp`.
    #[must_use]
    pub const fn lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = Some(lifetime);
        self
    }

    /// Adds `nbf` set to the issue time.
    #[must_use]
    pub const fn with_not_before(mut self) -> Self {
        self.not_before = true;
        self
    }

    /// Adds a non-standard member.
    #[must_use]
    pub fn extra(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }

    /// Returns the claim set of the request object.
    #[must_use]
    pub fn to_claims(&self) -> Map<String, Value> {
        let now = Utc::now();
        let lifetime = self
            .lifetime
            .unwrap_or_else(|| Duration::minutes(DEFAULT_LIFETIME_MINUTES));

        let mut claims = self.extra.clone();
        let mut set = |name: &str, value: Value| {
            claims.insert(name.to_string(), value);
        };

        set("iss", Value::from(self.issuer.clone().unwrap_or_else(|| self.client_id.clone())));
        if let Some(audience) = &self.audience {
            set("aud", Value::from(audience.clone()));
        }
        set("iat", Value::from(now.timestamp()));
        set("exp", Value::from((now + lifetime).timestamp()));
        if self.not_before {
            set("nbf", Value::from(now.timestamp()));
        }
        set("jti", Value::from(generate_token_id()));
        set("client_id", Value::from(self.client_id.clone()));
        if !self.response_types.is_empty() {
            set("response_type", Value::from(self.response_types.join(" ")));
        }
        if !self.scopes.is_empty() {
            set("scope", Value::from(self.scopes.join(" ")));
        }
        if !self.prompts.is_empty() {
            set("prompt", Value::from(self.prompts.clone()));
        }
        for (name, value) in [
            ("response_mode", &self.response_mode),
            ("redirect_uri", &self.redirect_uri),
            ("state", &self.state),
            ("nonce", &self.nonce),
            ("display", &self.display),
            ("id_token_hint", &self.id_token_hint),
            ("login_hint", &self.login_hint),
        ] {
            if let Some(value) = value {
                set(name, Value::from(value.clone()));
            }
        }
        for (name, values) in [
            ("ui_locales", &self.ui_locales),
            ("claims_locales", &self.claims_locales),
            ("acr_values", &self.acr_values),
        ] {
            if !values.is_empty() {
                set(name, Value::from(values.join(" ")));
            }
        }
        if let Some(max_age) = self.max_age {
            set("max_age", Value::from(max_age));
        }

        let claims_request = self.effective_claims();
        if !claims_request.is_empty() {
            set("claims", claims_request.to_json());
        }
        claims
    }

    /// Builds and protects the request object.
    ///
    /// # Errors
    ///
    /// See [`protect`].
    pub async fn build(
        &self,
        protection: Protection,
        keys: &dyn KeyMaterialProvider,
        hints: KeyHints<'_>,
    ) -> RequestObjectResult<BuiltObject> {
        protect_claims(&self.to_claims(), protection, keys, hints).await
    }

    fn effective_claims(&self) -> ClaimsRequest {
        let mut claims = self.claims.clone();
        if self.max_age.is_some() && !claims.id_token.contains_key("auth_time") {
            claims.add_id_token_claim("auth_time", ClaimConstraint::essential());
        }
        if !self.acr_values.is_empty() && !claims.id_token.contains_key("acr") {
            claims.add_id_token_claim("acr", ClaimConstraint::values(self.acr_values.clone()));
        }
        claims
    }
}
