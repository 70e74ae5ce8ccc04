//! Request and response object validation.
//!
//! [`decode`] dispatches on the segment count of a compact token, resolves
//! the key named by its header and returns the verified claims.
//! [`RequestObjectValidator`] adds the authorization server's rules for
//! request objects on top.

use chrono::{Duration, Utc};
use oidc_core::config::RequestObjectConfig;
use oidc_core::event::{Event, EventType};
use oidc_crypto::{CompactJws, JoseHeader, SignatureAlgorithm, jwe, segment_count};
use oidc_keystore::KeyMaterialProvider;
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use crate::client::ClientMetadata;
use crate::error::{RequestObjectError, RequestObjectResult};
use crate::jwt::Jwt;

/// Verifies or decrypts a compact token and returns its claims.
///
/// Three segments are a JWS, five a JWE. Two segments are an unsecured JWS
/// and are honoured only when `none` is in `accepted`. A JWE with
/// `cty: JWT` must wrap a JWS, which is verified in turn.
///
/// # Errors
///
/// Returns [`RequestObjectError::MalformedToken`] for any other shape,
/// [`RequestObjectError::Key`] when no key can be resolved and the
/// signature or decryption error otherwise.
#[instrument(skip_all, fields(segments = segment_count(token)))]
pub async fn decode(
    token: &str,
    keys: &dyn KeyMaterialProvider,
    accepted: &[SignatureAlgorithm],
) -> RequestObjectResult<Jwt> {
    match segment_count(token) {
        3 => {
            let (header, claims) = verify_jws(token, keys, accepted).await?;
            Ok(Jwt::new(header, claims, token))
        }
        5 => decrypt_jwe(token, keys, accepted).await,
        2 if accepted.contains(&SignatureAlgorithm::None) => {
            let jws = CompactJws::parse_unsecured(token)?;
            jws.verify(None, accepted)?;
            let claims = claims_from(jws.payload())?;
            Ok(Jwt::new(jws.header().clone(), claims, token))
        }
        n => Err(RequestObjectError::MalformedToken(format!(
            "compact token must have 3 or 5 segments, found {n}"
        ))),
    }
}

async fn verify_jws(
    token: &str,
    keys: &dyn KeyMaterialProvider,
    accepted: &[SignatureAlgorithm],
) -> RequestObjectResult<(JoseHeader, Map<String, Value>)> {
    let jws = CompactJws::parse(token)?;
    let Some(alg) = jws.algorithm() else {
        return Err(RequestObjectError::SignatureInvalid);
    };
    if !accepted.contains(&alg) {
        return Err(RequestObjectError::UnsupportedAlgorithm(alg.to_string()));
    }
    if alg == SignatureAlgorithm::None {
        jws.verify(None, accepted)?;
    } else {
        let key = keys.resolve_verification_key(alg, jws.key_id()).await?;
        jws.verify(Some(&key.material), accepted)?;
    }
    let claims = claims_from(jws.payload())?;
    Ok((jws.header().clone(), claims))
}

async fn decrypt_jwe(
    token: &str,
    keys: &dyn KeyMaterialProvider,
    accepted: &[SignatureAlgorithm],
) -> RequestObjectResult<Jwt> {
    let header = oidc_crypto::CompactJwe::parse(token)?.header()?;
    let (alg, _) = header.encryption_algorithms()?;
    let key = keys.resolve_decryption_key(alg, header.kid.as_deref()).await?;
    let decrypted = jwe::decrypt(token, &key.material)?;

    if !decrypted.header.is_nested_jwt() {
        let claims = claims_from(&decrypted.payload)?;
        return Ok(Jwt::new(decrypted.header, claims, token));
    }

    let inner = std::str::from_utf8(&decrypted.payload)
        .map_err(|_| RequestObjectError::MalformedToken("nested JWT is not UTF-8".to_string()))?;
    if segment_count(inner) != 3 {
        return Err(RequestObjectError::MalformedToken(
            "nested JWT must be a compact JWS".to_string(),
        ));
    }
    let (inner_header, claims) = verify_jws(inner, keys, accepted).await?;
    let mut jwt = Jwt::new(decrypted.header, claims, token);
    jwt.inner_header = Some(inner_header);
    Ok(jwt)
}

fn claims_from(payload: &[u8]) -> RequestObjectResult<Map<String, Value>> {
    Ok(serde_json::from_slice(payload)?)
}

/// Rules applied to request objects sent by one client.
#[derive(Debug, Clone)]
pub struct ValidationPolicy {
    /// Signature algorithms accepted for this client.
    pub accepted: Vec<SignatureAlgorithm>,
    /// Reject anything that is not a JWE.
    pub require_encryption: bool,
    /// Enforce the FAPI lifetime rules.
    pub fapi: bool,
    /// Upper bound on `exp` in FAPI mode.
    pub max_exp: Duration,
    /// Upper bound on the age of `nbf` in FAPI mode.
    pub max_nbf_age: Duration,
}

impl ValidationPolicy {
    /// Combines server configuration with the client's registration.
    ///
    /// `none` stays accepted only when the server allows it and the client
    /// registered `none`. A client that registered another algorithm is held
    /// to that algorithm.
    #[must_use]
    pub fn for_client(config: &RequestObjectConfig, client: &ClientMetadata) -> Self {
        let mut accepted = config.accepted_signing_algs();
        match client.request_object_signing_alg {
            Some(registered) => accepted.retain(|alg| *alg == registered),
            None => accepted.retain(|alg| *alg != SignatureAlgorithm::None),
        }
        Self {
            accepted,
            require_encryption: config.require_encryption,
            fapi: config.fapi,
            max_exp: Duration::minutes(config.max_exp_minutes),
            max_nbf_age: Duration::minutes(config.max_nbf_age_minutes),
        }
    }

    /// Returns whether unsigned objects are accepted.
    #[must_use]
    pub fn accepts_unsigned(&self) -> bool {
        self.accepted.contains(&SignatureAlgorithm::None)
    }
}

/// Validates request objects on behalf of the authorization endpoint.
#[derive(Debug, Clone)]
pub struct RequestObjectValidator {
    client_id: String,
    policy: ValidationPolicy,
}

impl RequestObjectValidator {
    /// Creates a validator for `client`.
    #[must_use]
    pub fn new(config: &RequestObjectConfig, client: &ClientMetadata) -> Self {
        Self {
            client_id: client.client_id.clone(),
            policy: ValidationPolicy::for_client(config, client),
        }
    }

    /// Returns the effective policy.
    #[must_use]
    pub const fn policy(&self) -> &ValidationPolicy {
        &self.policy
    }

    /// Validates a request object and returns its claims.
    ///
    /// # Errors
    ///
    /// Returns the first rule the object breaks.
    #[instrument(skip_all, fields(client_id = %self.client_id))]
    pub async fn validate(&self, token: &str, keys: &dyn KeyMaterialProvider) -> RequestObjectResult<Jwt> {
        let result = self.check(token, keys).await;
        match &result {
            Ok(jwt) => {
                let mut event = Event::builder(EventType::RequestObjectAccepted)
                    .client(self.client_id.clone())
                    .detail("encrypted", jwt.is_encrypted().to_string());
                if let Some(kid) = jwt.key_id() {
                    event = event.key(kid);
                }
                event.emit();
                debug!("request object accepted");
            }
            Err(e) => {
                warn!(error = %e, "request object rejected");
                Event::builder(EventType::RequestObjectRejected)
                    .client(self.client_id.clone())
                    .failure(e.to_string())
                    .emit();
            }
        }
        result
    }

    async fn check(&self, token: &str, keys: &dyn KeyMaterialProvider) -> RequestObjectResult<Jwt> {
        if self.policy.require_encryption && segment_count(token) != 5 {
            return Err(RequestObjectError::EncryptionRequired);
        }
        let jwt = decode(token, keys, &self.policy.accepted).await?;
        self.check_lifetime(&jwt, Utc::now().timestamp())?;
        self.check_client(&jwt)?;
        Ok(jwt)
    }

    fn check_lifetime(&self, jwt: &Jwt, now: i64) -> RequestObjectResult<()> {
        let exp = numeric_date(jwt, "exp")?;
        if let Some(exp) = exp
            && now >= exp
        {
            return Err(RequestObjectError::Expired);
        }
        let nbf = numeric_date(jwt, "nbf")?;
        if let Some(nbf) = nbf
            && nbf > now
        {
            return Err(RequestObjectError::LifetimeRejected("not yet valid".to_string()));
        }
        if !self.policy.fapi {
            return Ok(());
        }

        let Some(exp) = exp else {
            return Err(RequestObjectError::LifetimeRejected("exp is required".to_string()));
        };
        if exp > now + self.policy.max_exp.num_seconds() {
            return Err(RequestObjectError::LifetimeRejected("exp is too far in the future".to_string()));
        }
        let Some(nbf) = nbf else {
            return Err(RequestObjectError::LifetimeRejected("nbf is required".to_string()));
        };
        if nbf <= 0 {
            return Err(RequestObjectError::LifetimeRejected("nbf must be positive".to_string()));
        }
        if nbf < now - self.policy.max_nbf_age.num_seconds() {
            return Err(RequestObjectError::LifetimeRejected("nbf is too old".to_string()));
        }
        Ok(())
    }

    fn check_client(&self, jwt: &Jwt) -> RequestObjectResult<()> {
        for name in ["client_id", "iss"] {
            match jwt.claims.get(name) {
                None => {}
                Some(Value::String(value)) if *value == self.client_id => {}
                Some(Value::String(_)) => return Err(RequestObjectError::ClientMismatch),
                Some(_) => {
                    return Err(RequestObjectError::InvalidClaims(format!("{name} must be a string")));
                }
            }
        }
        Ok(())
    }
}

fn numeric_date(jwt: &Jwt, name: &str) -> RequestObjectResult<Option<i64>> {
    match jwt.claims.get(name) {
        None => Ok(None),
        Some(value) => value
            .as_i64()
            .or_else(|| value.as_f64().map(|f| f as i64))
            .map(Some)
            .ok_or_else(|| RequestObjectError::InvalidClaims(format!("{name} must be a number"))),
    }
}
