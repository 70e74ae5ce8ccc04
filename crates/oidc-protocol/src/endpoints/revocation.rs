//! Token revocation endpoint handler.
//!
//! Implements POST `/revoke` as defined in RFC 7009.

use axum::Form;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use oidc_revocation::{RevocationOutcome, TokenTypeHint};
use tracing::debug;

use crate::error::{OidcError, OidcResult};
use crate::request::RevocationRequest;

use super::client_auth::authenticate_client;
use super::error_response;
use super::state::AppState;

/// POST `/revoke`
///
/// Revokes an access or refresh token and cascades per the grant's rules.
///
/// # Responses
///
/// - 200 OK with an empty body: revoked, already revoked, unknown, or issued
///   to another client
/// - 400 Bad Request: `token` is missing
/// - 401 Unauthorized: client authentication failed
pub async fn revoke(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(request): Form<RevocationRequest>,
) -> Response {
    match handle_revocation_request(&state, &headers, &request).await {
        Ok(outcome) => {
            debug!(?outcome, "revocation request handled");
            StatusCode::OK.into_response()
        }
        Err(ref err) => error_response(err),
    }
}

async fn handle_revocation_request(
    state: &AppState,
    headers: &HeaderMap,
    request: &RevocationRequest,
) -> OidcResult<RevocationOutcome> {
    let client = authenticate_client(
        state,
        headers,
        request.client_id.as_deref(),
        request.client_secret.as_deref(),
    )
    .await?;

    let token = request
        .token
        .as_deref()
        .filter(|token| !token.is_empty())
        .ok_or_else(|| OidcError::InvalidRequest("token is required".to_string()))?;
    let hint = request.token_type_hint.as_deref().and_then(TokenTypeHint::from_param);

    state
        .revocation
        .revoke(token, hint, &client.client_id)
        .await
        .map_err(|e| OidcError::ServerError(e.to_string()))
}
