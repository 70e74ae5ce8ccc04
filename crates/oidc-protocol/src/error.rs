//! OIDC protocol error types.
//!
//! Implements OAuth 2.0 and `OpenID` Connect error responses as defined in:
//! - RFC 6749 (OAuth 2.0)
//! - RFC 7009 (Token Revocation)
//! - `OpenID` Connect Core 1.0, section 6 (request objects)

use oidc_crypto::CryptoError;
use oidc_keystore::KeyError;
use oidc_revocation::RevocationError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Description used for every rejected grant, whatever the reason.
const INACTIVE_GRANT: &str = "grant is invalid, expired or revoked";

/// Description used for every rejected bearer token, whatever the reason.
const INACTIVE_TOKEN: &str = "access token is invalid, expired or revoked";

/// OIDC protocol errors.
#[derive(Debug, Error)]
pub enum OidcError {
    /// Invalid request parameters.
    #[error("invalid_request: {0}")]
    InvalidRequest(String),

    /// Client authentication failed.
    #[error("invalid_client: {0}")]
    InvalidClient(String),

    /// Invalid, expired or revoked authorization grant.
    #[error("invalid_grant: {0}")]
    InvalidGrant(String),

    /// Revoked, expired or unknown code or refresh token. Reported as
    /// `invalid_grant` with HTTP 401.
    #[error("invalid_grant: {0}")]
    InactiveGrant(String),

    /// Client is not authorized for this grant type.
    #[error("unauthorized_client: {0}")]
    UnauthorizedClient(String),

    /// Unsupported grant type.
    #[error("unsupported_grant_type: {0}")]
    UnsupportedGrantType(String),

    /// Invalid scope.
    #[error("invalid_scope: {0}")]
    InvalidScope(String),

    /// Unsupported response type.
    #[error("unsupported_response_type: {0}")]
    UnsupportedResponseType(String),

    /// The `request` parameter carries an invalid request object.
    #[error("invalid_request_object: {0}")]
    InvalidRequestObject(String),

    /// The `request_uri` is unusable.
    #[error("invalid_request_uri: {0}")]
    InvalidRequestUri(String),

    /// Both `request` and `request_uri` were sent.
    #[error("request_not_supported: {0}")]
    RequestNotSupported(String),

    /// Server error.
    #[error("server_error: {0}")]
    ServerError(String),

    /// Temporarily unavailable.
    #[error("temporarily_unavailable: {0}")]
    TemporarilyUnavailable(String),

    /// Access denied by resource owner.
    #[error("access_denied: {0}")]
    AccessDenied(String),

    /// The end-user is not authenticated.
    #[error("login_required: {0}")]
    LoginRequired(String),

    /// Invalid token presented to a resource endpoint.
    #[error("invalid_token: {0}")]
    InvalidToken(String),

    /// Insufficient scope.
    #[error("insufficient_scope: {0}")]
    InsufficientScope(String),

    /// Token signing or encryption error.
    #[error("token signing failed: {0}")]
    TokenSigning(String),
}

impl OidcError {
    /// Returns the OAuth 2.0 error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::InvalidClient(_) => "invalid_client",
            Self::InvalidGrant(_) | Self::InactiveGrant(_) => "invalid_grant",
            Self::UnauthorizedClient(_) => "unauthorized_client",
            Self::UnsupportedGrantType(_) => "unsupported_grant_type",
            Self::InvalidScope(_) => "invalid_scope",
            Self::UnsupportedResponseType(_) => "unsupported_response_type",
            Self::InvalidRequestObject(_) => "invalid_request_object",
            Self::InvalidRequestUri(_) => "invalid_request_uri",
            Self::RequestNotSupported(_) => "request_not_supported",
            Self::TemporarilyUnavailable(_) => "temporarily_unavailable",
            Self::AccessDenied(_) => "access_denied",
            Self::LoginRequired(_) => "login_required",
            Self::InvalidToken(_) => "invalid_token",
            Self::InsufficientScope(_) => "insufficient_scope",
            Self::ServerError(_) | Self::TokenSigning(_) => "server_error",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::InvalidRequest(_)
            | Self::InvalidScope(_)
            | Self::UnsupportedGrantType(_)
            | Self::UnsupportedResponseType(_)
            | Self::InvalidGrant(_)
            | Self::InvalidRequestObject(_)
            | Self::InvalidRequestUri(_)
            | Self::RequestNotSupported(_)
            | Self::LoginRequired(_) => 400,
            Self::InvalidClient(_) | Self::InactiveGrant(_) | Self::InvalidToken(_) => 401,
            Self::AccessDenied(_) | Self::UnauthorizedClient(_) | Self::InsufficientScope(_) => 403,
            Self::ServerError(_) | Self::TokenSigning(_) => 500,
            Self::TemporarilyUnavailable(_) => 503,
        }
    }

    /// Creates an error response for OAuth 2.0/OIDC.
    ///
    /// Server-side failures get a fixed description so internal detail does
    /// not reach the client.
    #[must_use]
    pub fn to_error_response(&self) -> ErrorResponse {
        let description = match self {
            Self::ServerError(_) | Self::TokenSigning(_) => "internal server error".to_string(),
            other => other.to_string(),
        };
        ErrorResponse {
            error: self.error_code().to_string(),
            error_description: Some(description),
            error_uri: None,
        }
    }

    /// Maps a token rejection at the token endpoint to `invalid_grant`
    /// (HTTP 401).
    ///
    /// Revoked, expired and unknown tokens produce the same description.
    #[must_use]
    pub fn from_grant_rejection(err: &RevocationError) -> Self {
        if err.is_token_rejection() {
            Self::InactiveGrant(INACTIVE_GRANT.to_string())
        } else {
            Self::ServerError(err.to_string())
        }
    }

    /// Maps a token rejection at a resource endpoint to `invalid_token`.
    ///
    /// Revoked, expired and unknown tokens produce the same description.
    #[must_use]
    pub fn from_bearer_rejection(err: &RevocationError) -> Self {
        if err.is_token_rejection() {
            Self::InvalidToken(INACTIVE_TOKEN.to_string())
        } else {
            Self::ServerError(err.to_string())
        }
    }
}

impl From<KeyError> for OidcError {
    fn from(err: KeyError) -> Self {
        if err.is_transient() {
            Self::TemporarilyUnavailable(err.to_string())
        } else {
            Self::ServerError(err.to_string())
        }
    }
}

impl From<CryptoError> for OidcError {
    fn from(err: CryptoError) -> Self {
        Self::TokenSigning(err.to_string())
    }
}

/// OAuth 2.0 error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code.
    pub error: String,

    /// Human-readable error description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,

    /// URI with more information about the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_uri: Option<String>,
}

/// Result type for OIDC operations.
pub type OidcResult<T> = Result<T, OidcError>;

/// Errors raised while building or validating request and response objects.
#[derive(Debug, Error)]
pub enum RequestObjectError {
    /// Wrong segment count, invalid base64url or invalid JSON.
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// Algorithm not implemented or not accepted (including unsolicited `none`).
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Signature verification failed.
    #[error("signature verification failed")]
    SignatureInvalid,

    /// Decryption failed.
    #[error("decryption failed")]
    DecryptionFailed,

    /// Key resolution failed.
    #[error(transparent)]
    Key(#[from] KeyError),

    /// Signing or encryption failed while building an object.
    #[error("cannot protect object: {0}")]
    Protection(String),

    /// A claim is missing or has the wrong type.
    #[error("invalid claims: {0}")]
    InvalidClaims(String),

    /// Policy requires an encrypted request object.
    #[error("request object must be encrypted")]
    EncryptionRequired,

    /// `client_id` or `iss` disagree with the authenticated request.
    #[error("request object was not issued by the requesting client")]
    ClientMismatch,

    /// `exp` has passed.
    #[error("request object has expired")]
    Expired,

    /// A time-based claim violates the active profile.
    #[error("request object lifetime rejected: {0}")]
    LifetimeRejected(String),

    /// The `request_uri` is not acceptable for this client.
    #[error("request_uri rejected: {0}")]
    RequestUriRejected(String),

    /// The `request_uri` could not be fetched.
    #[error("request_uri unavailable: {0}")]
    RequestUriUnavailable(String),
}

/// Result type for request and response object operations.
pub type RequestObjectResult<T> = Result<T, RequestObjectError>;

impl From<CryptoError> for RequestObjectError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::MalformedToken(msg) => Self::MalformedToken(msg),
            CryptoError::SignatureInvalid => Self::SignatureInvalid,
            CryptoError::DecryptionFailed => Self::DecryptionFailed,
            CryptoError::UnsupportedAlgorithm(msg) => Self::UnsupportedAlgorithm(msg),
            CryptoError::InvalidKey(msg) | CryptoError::Signing(msg) | CryptoError::Encryption(msg) => {
                Self::Protection(msg)
            }
        }
    }
}

impl From<serde_json::Error> for RequestObjectError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedToken(format!("invalid JSON payload: {err}"))
    }
}

impl From<RequestObjectError> for OidcError {
    fn from(err: RequestObjectError) -> Self {
        match err {
            RequestObjectError::Key(key) if key.is_transient() => {
                Self::TemporarilyUnavailable(key.to_string())
            }
            RequestObjectError::Protection(msg) => Self::TokenSigning(msg),
            RequestObjectError::RequestUriRejected(_) | RequestObjectError::RequestUriUnavailable(_) => {
                Self::InvalidRequestUri(err.to_string())
            }
            other => Self::InvalidRequestObject(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_rejections_share_one_description() {
        let revoked = OidcError::from_bearer_rejection(&RevocationError::TokenRevoked);
        let unknown = OidcError::from_bearer_rejection(&RevocationError::TokenNotFound);
        assert_eq!(revoked.to_string(), unknown.to_string());
        assert_eq!(revoked.http_status(), 401);

        let grant = OidcError::from_grant_rejection(&RevocationError::TokenExpired);
        assert_eq!(grant.error_code(), "invalid_grant");
        assert_eq!(grant.http_status(), 401);
    }

    #[test]
    fn server_errors_hide_detail() {
        let err = OidcError::ServerError("database password rejected".to_string());
        let response = err.to_error_response();
        assert_eq!(response.error, "server_error");
        assert_eq!(response.error_description.as_deref(), Some("internal server error"));
    }

    #[test]
    fn request_object_errors_map_to_protocol_codes() {
        let err: OidcError = RequestObjectError::SignatureInvalid.into();
        assert_eq!(err.error_code(), "invalid_request_object");

        let err: OidcError = RequestObjectError::RequestUriRejected("blocked".to_string()).into();
        assert_eq!(err.error_code(), "invalid_request_uri");

        let err: OidcError =
            RequestObjectError::Key(KeyError::KeyStoreUnavailable("timeout".to_string())).into();
        assert_eq!(err.http_status(), 503);
    }

    #[test]
    fn crypto_failures_keep_their_category() {
        assert!(matches!(
            RequestObjectError::from(CryptoError::DecryptionFailed),
            RequestObjectError::DecryptionFailed
        ));
        assert!(matches!(
            RequestObjectError::from(CryptoError::MalformedToken("x".to_string())),
            RequestObjectError::MalformedToken(_)
        ));
    }
}
