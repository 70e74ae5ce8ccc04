//! JOSE header and compact serialization helpers.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};

use crate::algorithm::{BlockEncryptionAlgorithm, KeyEncryptionAlgorithm, SignatureAlgorithm};
use crate::error::{CryptoError, CryptoResult};

/// Header `typ` for JWTs.
pub const TYPE_JWT: &str = "JWT";

/// Header `cty` marking a nested JWT inside a JWE.
pub const CONTENT_TYPE_JWT: &str = "JWT";

/// Protected header of a JWS or JWE.
///
/// `alg` is kept as the raw string so a verifier can reject unknown or
/// inconsistent values itself instead of failing at parse time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoseHeader {
    /// Media type of the complete token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,

    /// Signature or key management algorithm.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,

    /// Content encryption algorithm (JWE only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enc: Option<String>,

    /// Key ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// Content type of the payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cty: Option<String>,
}

impl JoseHeader {
    /// Creates a JWS header.
    #[must_use]
    pub fn signed(alg: SignatureAlgorithm) -> Self {
        Self {
            typ: Some(TYPE_JWT.to_string()),
            alg: Some(alg.jwa_name().to_string()),
            ..Self::default()
        }
    }

    /// Creates a JWE header.
    #[must_use]
    pub fn encrypted(alg: KeyEncryptionAlgorithm, enc: BlockEncryptionAlgorithm) -> Self {
        Self {
            typ: Some(TYPE_JWT.to_string()),
            alg: Some(alg.jwa_name().to_string()),
            enc: Some(enc.jwa_name().to_string()),
            ..Self::default()
        }
    }

    /// Sets the key id.
    #[must_use]
    pub fn with_kid(mut self, kid: Option<String>) -> Self {
        self.kid = kid;
        self
    }

    /// Sets the content type.
    #[must_use]
    pub fn with_cty(mut self, cty: impl Into<String>) -> Self {
        self.cty = Some(cty.into());
        self
    }

    /// Returns whether this header belongs to a JWE.
    #[must_use]
    pub const fn is_encrypted(&self) -> bool {
        self.enc.is_some()
    }

    /// Returns the parsed signature algorithm.
    ///
    /// # Errors
    ///
    /// Returns an error if `alg` is absent or not a JWS algorithm.
    pub fn signature_algorithm(&self) -> CryptoResult<SignatureAlgorithm> {
        let alg = self
            .alg
            .as_deref()
            .ok_or_else(|| CryptoError::MalformedToken("header has no alg".to_string()))?;
        Ok(SignatureAlgorithm::from_jwa(alg)?)
    }

    /// Returns the parsed key management and content encryption algorithms.
    ///
    /// # Errors
    ///
    /// Returns an error if `alg` or `enc` is absent or unknown.
    pub fn encryption_algorithms(
        &self,
    ) -> CryptoResult<(KeyEncryptionAlgorithm, BlockEncryptionAlgorithm)> {
        let alg = self
            .alg
            .as_deref()
            .ok_or_else(|| CryptoError::MalformedToken("header has no alg".to_string()))?;
        let enc = self
            .enc
            .as_deref()
            .ok_or_else(|| CryptoError::MalformedToken("header has no enc".to_string()))?;
        Ok((
            KeyEncryptionAlgorithm::from_jwa(alg)?,
            BlockEncryptionAlgorithm::from_jwa(enc)?,
        ))
    }

    /// Returns whether the payload is itself a compact JWT.
    #[must_use]
    pub fn is_nested_jwt(&self) -> bool {
        self.cty
            .as_deref()
            .is_some_and(|cty| cty.eq_ignore_ascii_case(CONTENT_TYPE_JWT))
    }

    /// Serializes and base64url-encodes the header.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode(&self) -> CryptoResult<String> {
        let json = serde_json::to_vec(self)
            .map_err(|e| CryptoError::MalformedToken(format!("header serialization failed: {e}")))?;
        Ok(b64_encode(&json))
    }

    /// Decodes a base64url header segment.
    ///
    /// # Errors
    ///
    /// Returns an error if the segment is not base64url JSON.
    pub fn decode(segment: &str) -> CryptoResult<Self> {
        let bytes = b64_decode(segment, "header")?;
        serde_json::from_slice(&bytes)
            .map_err(|_| CryptoError::MalformedToken("header is not valid JSON".to_string()))
    }
}

/// Encodes bytes as unpadded base64url.
#[must_use]
pub fn b64_encode(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

/// Decodes an unpadded base64url segment.
///
/// # Errors
///
/// Returns a [`CryptoError::MalformedToken`] naming the segment.
pub fn b64_decode(segment: &str, name: &str) -> CryptoResult<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| CryptoError::MalformedToken(format!("{name} is not valid base64url")))
}

/// Returns the number of dot-separated segments in a compact token.
#[must_use]
pub fn segment_count(token: &str) -> usize {
    token.split('.').count()
}
