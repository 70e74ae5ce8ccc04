//! HTTP endpoints for Axum.
//!
//! - Authorization (`/authorize`)
//! - Token (`/token`)
//! - `UserInfo` (`/userinfo`)
//! - Revocation (`/revoke`)
//! - JWKS (`/jwks`)
//!
//! ## Router Setup
//!
//! ```rust,ignore
//! use oidc_protocol::endpoints::{AppState, oidc_router};
//!
//! let app = oidc_router().with_state(app_state);
//! ```

mod authorization;
pub mod client_auth;
mod jwks;
mod revocation;
mod router;
pub mod state;
mod token;
mod userinfo;

use axum::Json;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

use crate::error::OidcError;

pub use authorization::authorize;
pub use client_auth::{ClientAuthMethod, ClientCredentials, authenticate_client, extract_credentials};
pub use jwks::jwks;
pub use revocation::revoke;
pub use router::oidc_router;
pub use state::{
    AppState, AuthenticatedSession, AuthorizationContext, InMemoryUserDirectory, SessionAuthenticator,
    TrustedHeaderAuthenticator, UserDirectory,
};
pub use token::{TokenResponse, token};
pub use userinfo::{userinfo_get, userinfo_post};

/// Converts an error to a JSON error response.
///
/// `invalid_client` carries a `WWW-Authenticate: Basic` challenge.
fn error_response(err: &OidcError) -> Response {
    let status = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        tracing::error!(error = %err, "request failed");
    }
    let body = Json(err.to_error_response());
    if matches!(err, OidcError::InvalidClient(_)) {
        return (status, [(header::WWW_AUTHENTICATE, "Basic")], body).into_response();
    }
    (status, [(header::CACHE_CONTROL, "no-store")], body).into_response()
}
