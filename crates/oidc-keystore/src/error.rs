//! Key resolution errors.

use oidc_crypto::CryptoError;
use thiserror::Error;

/// Result type alias for key operations.
pub type KeyResult<T> = std::result::Result<T, KeyError>;

/// Error raised while loading, storing or resolving keys.
#[derive(Debug, Error)]
pub enum KeyError {
    /// No key matches the requested id and algorithm.
    #[error("no key found for alg {alg}{}", kid_suffix(.kid))]
    KeyNotFound {
        /// Requested key id.
        kid: Option<String>,
        /// Requested algorithm.
        alg: String,
    },

    /// The key store file or the JWKS endpoint could not be reached or read.
    #[error("key store unavailable: {0}")]
    KeyStoreUnavailable(String),

    /// The key store password is wrong or the file was tampered with.
    #[error("key store cannot be unlocked")]
    Locked,

    /// The algorithm cannot be served by this provider.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Key material is invalid.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Key store contents could not be (de)serialized.
    #[error("key store serialization error: {0}")]
    Serialization(String),
}

fn kid_suffix(kid: &Option<String>) -> String {
    kid.as_deref().map(|k| format!(" and kid {k}")).unwrap_or_default()
}

impl KeyError {
    /// Creates a [`KeyError::KeyNotFound`].
    pub fn not_found(alg: impl ToString, kid: Option<&str>) -> Self {
        Self::KeyNotFound {
            kid: kid.map(str::to_string),
            alg: alg.to_string(),
        }
    }

    /// Returns whether retrying later may help.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::KeyStoreUnavailable(_))
    }
}
