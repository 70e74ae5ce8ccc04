//! `UserInfo` endpoint handler.
//!
//! Implements GET and POST `/userinfo` as defined in `OpenID` Connect Core 1.0,
//! section 5.3.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use oidc_core::event::{Event, EventType};
use oidc_revocation::AccessTokenInfo;
use tracing::instrument;

use crate::error::{OidcError, OidcResult};
use crate::request::UserInfoRequest;
use crate::response::{UserInfoResponse, userinfo_response};

use super::error_response as json_error;
use super::state::AppState;

/// GET `/userinfo`
///
/// Requires `Authorization: Bearer <access_token>`.
pub async fn userinfo_get(State(state): State<AppState>, headers: HeaderMap) -> Response {
    respond(&state, extract_bearer_token(&headers, None)).await
}

/// POST `/userinfo`
///
/// Accepts the access token in the Authorization header or as the
/// `access_token` form parameter.
pub async fn userinfo_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(body): Form<UserInfoRequest>,
) -> Response {
    respond(&state, extract_bearer_token(&headers, body.access_token.as_deref())).await
}

async fn respond(state: &AppState, token: OidcResult<String>) -> Response {
    let result = match token {
        Ok(token) => handle_userinfo_request(state, &token).await,
        Err(err) => Err(err),
    };
    match result {
        Ok(UserInfoResponse::Json(claims)) => (StatusCode::OK, Json(claims)).into_response(),
        Ok(UserInfoResponse::Jwt(built)) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/jwt")],
            built.token,
        )
            .into_response(),
        Err(ref err) => {
            Event::builder(EventType::UserInfoRequestError)
                .failure(err.error_code())
                .emit();
            error_response(err)
        }
    }
}

#[instrument(skip_all)]
async fn handle_userinfo_request(state: &AppState, token: &str) -> OidcResult<UserInfoResponse> {
    let info: AccessTokenInfo = state
        .revocation
        .validate_access_token(token)
        .await
        .map_err(|e| OidcError::from_bearer_rejection(&e))?;
    if !info.has_scope("openid") {
        return Err(OidcError::InsufficientScope("openid scope is required".to_string()));
    }

    let client = state
        .clients
        .get_client(&info.client_id)
        .await?
        .ok_or_else(|| OidcError::InvalidToken("client no longer exists".to_string()))?;
    let profile = state
        .users
        .find(&info.subject)
        .await?
        .ok_or_else(|| OidcError::InvalidToken("subject no longer exists".to_string()))?;
    let context = state.context(info.grant_id).unwrap_or_default();
    let keys = state.key_provider(&client)?;

    let response = userinfo_response(
        state.issuer(),
        &profile,
        &context.claims,
        &info.scopes,
        &client,
        keys.as_ref(),
    )
    .await?;

    Event::builder(EventType::UserInfoRequest)
        .client(info.client_id.clone())
        .subject(info.subject.clone())
        .grant(info.grant_id)
        .detail("content_type", response.content_type())
        .emit();
    Ok(response)
}

/// Extracts the bearer token from the Authorization header, falling back to
/// the form body.
fn extract_bearer_token(headers: &HeaderMap, form_token: Option<&str>) -> OidcResult<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        let auth_str = auth_header
            .to_str()
            .map_err(|_| OidcError::InvalidRequest("invalid authorization header".to_string()))?;
        let token = auth_str
            .strip_prefix("Bearer ")
            .ok_or_else(|| OidcError::InvalidRequest("expected Bearer token".to_string()))?;
        if token.is_empty() {
            return Err(OidcError::InvalidRequest("empty token".to_string()));
        }
        return Ok(token.to_string());
    }
    form_token
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .ok_or_else(|| OidcError::InvalidToken("missing access token".to_string()))
}

/// Converts an error to a response, with a `WWW-Authenticate` challenge on
/// 401 and 403.
fn error_response(err: &OidcError) -> Response {
    let status = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if !matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        return json_error(err);
    }
    let challenge = format!(
        "Bearer error=\"{}\", error_description=\"{}\"",
        err.error_code(),
        err.to_string().replace('"', "'")
    );
    (
        status,
        [(header::WWW_AUTHENTICATE, challenge)],
        Json(err.to_error_response()),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_header_wins_over_body() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer from-header".parse().unwrap());
        let token = extract_bearer_token(&headers, Some("from-body")).unwrap();
        assert_eq!(token, "from-header");
    }

    #[test]
    fn body_token_is_accepted() {
        let token = extract_bearer_token(&HeaderMap::new(), Some("from-body")).unwrap();
        assert_eq!(token, "from-body");
    }

    #[test]
    fn missing_token_is_unauthorized() {
        let err = extract_bearer_token(&HeaderMap::new(), None).unwrap_err();
        assert_eq!(err.http_status(), 401);
    }

    #[test]
    fn basic_scheme_is_invalid_request() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Basic dGVzdDp0ZXN0".parse().unwrap());
        let err = extract_bearer_token(&headers, None).unwrap_err();
        assert!(matches!(err, OidcError::InvalidRequest(_)));
    }

    #[test]
    fn challenge_on_invalid_token() {
        let response = error_response(&OidcError::InvalidToken("access token is \"revoked\"".to_string()));
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let challenge = response.headers()[header::WWW_AUTHENTICATE].to_str().unwrap();
        assert!(challenge.starts_with("Bearer error=\"invalid_token\""));
        assert!(!challenge.contains("\"revoked\""));
    }
}
