//! Revocation and grant errors.

use thiserror::Error;
use uuid::Uuid;

/// Errors raised by grant storage and the revocation service.
#[derive(Debug, Error)]
pub enum RevocationError {
    /// The token has been revoked.
    #[error("token revoked")]
    TokenRevoked,

    /// The token is past its expiry.
    #[error("token expired")]
    TokenExpired,

    /// No grant holds the token.
    #[error("token not found")]
    TokenNotFound,

    /// The token exists but is not of the kind the operation needs.
    #[error("wrong token type: expected {expected}")]
    WrongTokenType {
        /// Kind the operation needs.
        expected: &'static str,
    },

    /// The token was issued to another client.
    #[error("token was issued to another client")]
    ClientMismatch,

    /// An authorization code was presented a second time.
    #[error("authorization code already used")]
    CodeReused,

    /// Concurrent updates kept winning the compare-and-swap on a grant.
    #[error("grant {0} is being modified concurrently")]
    Conflict(Uuid),

    /// Storage backend failure.
    #[error("grant storage error: {0}")]
    Storage(String),
}

impl RevocationError {
    /// Returns whether the error means the presented token is unusable.
    ///
    /// Callers map all of these to one generic authentication failure.
    #[must_use]
    pub const fn is_token_rejection(&self) -> bool {
        matches!(
            self,
            Self::TokenRevoked
                | Self::TokenExpired
                | Self::TokenNotFound
                | Self::WrongTokenType { .. }
                | Self::ClientMismatch
                | Self::CodeReused
        )
    }
}

/// Result type for revocation operations.
pub type RevocationResult<T> = Result<T, RevocationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_errors_are_rejections() {
        assert!(RevocationError::TokenRevoked.is_token_rejection());
        assert!(RevocationError::TokenExpired.is_token_rejection());
        assert!(RevocationError::TokenNotFound.is_token_rejection());
        assert!(!RevocationError::Storage("down".to_string()).is_token_rejection());
        assert!(!RevocationError::Conflict(Uuid::nil()).is_token_rejection());
    }
}
