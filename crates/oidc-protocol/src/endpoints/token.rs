//! Token endpoint handler.
//!
//! Implements POST `/token` for the `authorization_code` and
//! `refresh_token` grants.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use chrono::Duration;
use oidc_revocation::IssuedTokens;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::client::ClientMetadata;
use crate::error::{OidcError, OidcResult};
use crate::request::TokenRequest;
use crate::response::{IdTokenParams, issue_id_token};

use super::client_auth::authenticate_client;
use super::error_response;
use super::state::{AppState, AuthorizationContext};

/// Successful token response.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Access token.
    pub access_token: String,
    /// Always `Bearer`.
    pub token_type: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    /// Rotated refresh token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// ID Token, when `openid` was granted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    /// Granted scope.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("id_token", &self.id_token.is_some())
            .field("scope", &self.scope)
            .finish()
    }
}

/// POST `/token`
///
/// # Responses
///
/// - 200 OK: token response
/// - 400 Bad Request: `invalid_request`, `invalid_grant` (redirect URI
///   mismatch), `unsupported_grant_type`
/// - 401 Unauthorized: client authentication failed, or `invalid_grant` for a
///   revoked, expired or unknown code or refresh token
pub async fn token(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(request): Form<TokenRequest>,
) -> Response {
    match handle_token_request(&state, &headers, &request).await {
        Ok(response) => (
            StatusCode::OK,
            [(header::CACHE_CONTROL, "no-store"), (header::PRAGMA, "no-cache")],
            Json(response),
        )
            .into_response(),
        Err(ref err) => error_response(err),
    }
}

#[instrument(skip_all, fields(grant_type = %request.grant_type))]
async fn handle_token_request(
    state: &AppState,
    headers: &HeaderMap,
    request: &TokenRequest,
) -> OidcResult<TokenResponse> {
    let client = authenticate_client(
        state,
        headers,
        request.client_id.as_deref(),
        request.client_secret.as_deref(),
    )
    .await?;

    match request.grant_type.as_str() {
        "authorization_code" => authorization_code_grant(state, &client, request).await,
        "refresh_token" => refresh_token_grant(state, &client, request).await,
        "" => Err(OidcError::InvalidRequest("grant_type is required".to_string())),
        other => Err(OidcError::UnsupportedGrantType(other.to_string())),
    }
}

async fn authorization_code_grant(
    state: &AppState,
    client: &ClientMetadata,
    request: &TokenRequest,
) -> OidcResult<TokenResponse> {
    let code = required(request.code.as_deref(), "code")?;
    let tokens = state
        .revocation
        .exchange_code(code, &client.client_id)
        .await
        .map_err(|e| OidcError::from_grant_rejection(&e))?;
    let context = state.context(tokens.grant_id).unwrap_or_default();

    if let Some(redirect_uri) = request.redirect_uri.as_deref()
        && redirect_uri != context.redirect_uri
    {
        warn!(grant_id = %tokens.grant_id, "redirect_uri does not match the authorization request");
        state
            .revocation
            .revoke_grant(tokens.grant_id)
            .await
            .map_err(|e| OidcError::ServerError(e.to_string()))?;
        return Err(OidcError::InvalidGrant("redirect_uri mismatch".to_string()));
    }

    info!(grant_id = %tokens.grant_id, "authorization code exchanged");
    respond(state, client, tokens, &context, true).await
}

async fn refresh_token_grant(
    state: &AppState,
    client: &ClientMetadata,
    request: &TokenRequest,
) -> OidcResult<TokenResponse> {
    let refresh_token = required(request.refresh_token.as_deref(), "refresh_token")?;
    let tokens = state
        .revocation
        .refresh(refresh_token, &client.client_id)
        .await
        .map_err(|e| OidcError::from_grant_rejection(&e))?;
    let context = state.context(tokens.grant_id).unwrap_or_default();
    respond(state, client, tokens, &context, false).await
}

async fn respond(
    state: &AppState,
    client: &ClientMetadata,
    tokens: IssuedTokens,
    context: &AuthorizationContext,
    with_nonce: bool,
) -> OidcResult<TokenResponse> {
    let scopes: Vec<String> = tokens.scope.split_whitespace().map(str::to_string).collect();
    let id_token = if scopes.iter().any(|s| s == "openid") {
        let profile = state
            .users
            .find(&tokens.subject)
            .await?
            .ok_or_else(|| OidcError::InvalidGrant("subject no longer exists".to_string()))?;
        let keys = state.key_provider(client)?;
        let params = IdTokenParams {
            issuer: state.issuer(),
            profile: &profile,
            scopes: &scopes,
            requested: &context.claims,
            nonce: tokens.nonce.as_deref().filter(|_| with_nonce),
            auth_time: context.auth_time,
            acr: context.acr.as_deref(),
            access_token: Some(&tokens.access_token),
            code: None,
            scope_claims_in_id_token: false,
            lifetime: Duration::seconds(state.config.tokens.id_token_lifespan),
        };
        Some(issue_id_token(&params, client, keys.as_ref()).await?.token)
    } else {
        None
    };

    Ok(TokenResponse {
        access_token: tokens.access_token,
        token_type: "Bearer".to_string(),
        expires_in: tokens.expires_in,
        refresh_token: tokens.refresh_token,
        id_token,
        scope: Some(tokens.scope).filter(|s| !s.is_empty()),
    })
}

fn required<'a>(value: Option<&'a str>, name: &str) -> OidcResult<&'a str> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| OidcError::InvalidRequest(format!("{name} is required")))
}
