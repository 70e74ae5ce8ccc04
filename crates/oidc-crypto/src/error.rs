//! Error types for JOSE operations.
//!
//! Verification and decryption failures carry no detail. A caller learns that
//! a token was rejected, never which check rejected it.

use thiserror::Error;

use crate::algorithm::AlgorithmError;

/// Result type for cryptographic operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors raised by signing, verification, encryption and decryption.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Wrong segment count, invalid base64url or invalid JSON.
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// Signature verification failed.
    #[error("signature verification failed")]
    SignatureInvalid,

    /// Any JWE integrity or format failure.
    #[error("decryption failed")]
    DecryptionFailed,

    /// Algorithm not implemented, not enabled, or mismatched with the key.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Key material is invalid for the requested operation.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Signing failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// Encryption failed.
    #[error("encryption failed: {0}")]
    Encryption(String),
}

impl From<AlgorithmError> for CryptoError {
    fn from(err: AlgorithmError) -> Self {
        Self::UnsupportedAlgorithm(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_failure_is_generic() {
        assert_eq!(CryptoError::SignatureInvalid.to_string(), "signature verification failed");
    }

    #[test]
    fn decryption_failure_is_generic() {
        assert_eq!(CryptoError::DecryptionFailed.to_string(), "decryption failed");
    }
}
