//! CLI error types.

use oidc_core::ConfigError;
use oidc_crypto::CryptoError;
use oidc_keystore::KeyError;
use oidc_protocol::RequestObjectError;
use thiserror::Error;

/// CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Key store error.
    #[error("key store error: {0}")]
    Key(#[from] KeyError),

    /// Token could not be decoded.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Signature verification failed.
    #[error("verification failed: {0}")]
    Verification(#[from] RequestObjectError),

    /// Resource not found.
    #[error("{resource_type} not found: {id}")]
    NotFound {
        /// Type of resource.
        resource_type: String,
        /// Resource identifier.
        id: String,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// CLI result type.
pub type CliResult<T> = Result<T, CliError>;
