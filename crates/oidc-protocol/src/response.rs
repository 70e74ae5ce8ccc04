//! ID Token and `UserInfo` response construction.

use chrono::{Duration, Utc};
use oidc_crypto::{HashAlgorithm, SignatureAlgorithm, left_half_hash};
use oidc_keystore::KeyMaterialProvider;
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::claims::{ClaimsRequest, IdTokenClaims, SubjectProfile, release_claims};
use crate::client::ClientMetadata;
use crate::error::{RequestObjectError, RequestObjectResult};
use crate::request_object::builder::{BuiltObject, KeyHints, Protection, protect_claims};

/// ID Token signature algorithm used when the client registered none.
pub const DEFAULT_ID_TOKEN_ALG: SignatureAlgorithm = SignatureAlgorithm::Rs256;

/// Returns how the client's ID Tokens are protected.
#[must_use]
pub fn id_token_protection(client: &ClientMetadata) -> Protection {
    Protection::from_registration(
        Some(client.id_token_signed_response_alg.unwrap_or(DEFAULT_ID_TOKEN_ALG)),
        client.id_token_encrypted_response_alg,
        client.id_token_encrypted_response_enc,
    )
    .unwrap_or(Protection::Signed(DEFAULT_ID_TOKEN_ALG))
}

/// Returns how the client's `UserInfo` responses are protected. `None` means
/// plain JSON.
#[must_use]
pub fn userinfo_protection(client: &ClientMetadata) -> Option<Protection> {
    Protection::from_registration(
        client.userinfo_signed_response_alg,
        client.userinfo_encrypted_response_alg,
        client.userinfo_encrypted_response_enc,
    )
}

/// Computes `at_hash` or `c_hash` for `token` under the ID Token's
/// signature algorithm. Unsigned tokens use SHA-256.
#[must_use]
pub fn token_hash(alg: Option<SignatureAlgorithm>, token: &str) -> String {
    let hash = alg
        .and_then(SignatureAlgorithm::hash_algorithm)
        .unwrap_or(HashAlgorithm::Sha256);
    left_half_hash(hash, token)
}

/// Inputs of an ID Token.
#[derive(Debug, Clone)]
pub struct IdTokenParams<'a> {
    /// Issuer identifier.
    pub issuer: &'a str,
    /// Subject the token describes.
    pub profile: &'a SubjectProfile,
    /// Granted scopes.
    pub scopes: &'a [String],
    /// Individually requested claims.
    pub requested: &'a ClaimsRequest,
    /// Nonce from the authorization request.
    pub nonce: Option<&'a str>,
    /// Time the subject authenticated.
    pub auth_time: Option<i64>,
    /// Authentication context class satisfied.
    pub acr: Option<&'a str>,
    /// Access token issued alongside, for `at_hash`.
    pub access_token: Option<&'a str>,
    /// Authorization code issued alongside, for `c_hash`.
    pub code: Option<&'a str>,
    /// Release scope claims in the ID Token. Set when no access token is
    /// issued, since the client cannot call `UserInfo` then.
    pub scope_claims_in_id_token: bool,
    /// Token lifetime.
    pub lifetime: Duration,
}

/// Builds the claim set of an ID Token for `client`.
#[must_use]
pub fn id_token_claims(params: &IdTokenParams<'_>, client: &ClientMetadata) -> IdTokenClaims {
    let alg = id_token_protection(client).signature_algorithm();
    let scopes: &[String] = if params.scope_claims_in_id_token {
        params.scopes
    } else {
        &[]
    };
    let released = release_claims(params.profile, &params.requested.id_token, scopes);

    let mut claims = IdTokenClaims::new(
        params.issuer,
        params.profile.subject.as_str(),
        client.client_id.as_str(),
        Utc::now() + params.lifetime,
    )
    .with_azp(client.client_id.as_str())
    .with_claims(released);
    if let Some(nonce) = params.nonce {
        claims = claims.with_nonce(nonce);
    }
    if let Some(auth_time) = params.auth_time {
        claims = claims.with_auth_time(auth_time);
    }
    if let Some(acr) = params.acr {
        claims = claims.with_acr(acr);
    }
    if let Some(access_token) = params.access_token {
        claims = claims.with_at_hash(token_hash(alg, access_token));
    }
    if let Some(code) = params.code {
        claims = claims.with_c_hash(token_hash(alg, code));
    }
    claims
}

/// Builds and protects an ID Token.
///
/// # Errors
///
/// Returns an error if no key is available or protection fails.
#[instrument(skip_all, fields(client_id = %client.client_id))]
pub async fn issue_id_token(
    params: &IdTokenParams<'_>,
    client: &ClientMetadata,
    keys: &dyn KeyMaterialProvider,
) -> RequestObjectResult<BuiltObject> {
    let claims = id_token_claims(params, client);
    let claims = match serde_json::to_value(&claims)? {
        Value::Object(map) => map,
        _ => return Err(RequestObjectError::Protection("ID Token claims are not an object".to_string())),
    };
    let built = protect_claims(&claims, id_token_protection(client), keys, KeyHints::default()).await?;
    debug!(kid = ?built.kid, "issued ID Token");
    Ok(built)
}

/// A `UserInfo` response body.
#[derive(Debug, Clone, PartialEq)]
pub enum UserInfoResponse {
    /// `application/json`.
    Json(Map<String, Value>),
    /// `application/jwt`, signed and/or encrypted.
    Jwt(BuiltObject),
}

impl UserInfoResponse {
    /// Returns the media type of the body.
    #[must_use]
    pub const fn content_type(&self) -> &'static str {
        match self {
            Self::Json(_) => "application/json",
            Self::Jwt(_) => "application/jwt",
        }
    }
}

/// Builds the `UserInfo` response for `client`.
///
/// Claims come from the granted scopes and the `userinfo` member of the
/// claims request. A protected response also carries `iss` and `aud`.
///
/// # Errors
///
/// Returns an error if the response must be protected and protection fails.
#[instrument(skip_all, fields(client_id = %client.client_id, subject = %profile.subject))]
pub async fn userinfo_response(
    issuer: &str,
    profile: &SubjectProfile,
    requested: &ClaimsRequest,
    scopes: &[String],
    client: &ClientMetadata,
    keys: &dyn KeyMaterialProvider,
) -> RequestObjectResult<UserInfoResponse> {
    let mut claims = release_claims(profile, &requested.userinfo, scopes);
    let Some(protection) = userinfo_protection(client) else {
        return Ok(UserInfoResponse::Json(claims));
    };
    claims.insert("iss".to_string(), Value::from(issuer));
    claims.insert("aud".to_string(), Value::from(client.client_id.clone()));
    let built = protect_claims(&claims, protection, keys, KeyHints::default()).await?;
    Ok(UserInfoResponse::Jwt(built))
}
