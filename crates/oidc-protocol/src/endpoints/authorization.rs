//! Authorization endpoint handler.
//!
//! Implements GET `/authorize` for the code, implicit and hybrid flows,
//! including request objects passed by value (`request`) or by reference
//! (`request_uri`).

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use chrono::{Duration, Utc};
use tracing::{debug, info, instrument, warn};

use crate::authorization::{AuthorizationResponse, Delivery, ResponseMode, failure, html_escape, success};
use crate::client::ClientMetadata;
use crate::error::{OidcError, OidcResult};
use crate::request::AuthorizationRequest;
use crate::request_object::RequestObjectValidator;
use crate::response::{IdTokenParams, issue_id_token};

use super::state::{AppState, AuthorizationContext};

/// Which artifacts a `response_type` asks for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ResponseTypes {
    code: bool,
    id_token: bool,
    token: bool,
}

impl ResponseTypes {
    /// Parses a space-delimited `response_type`. Order does not matter;
    /// repeated or unknown values are rejected.
    fn parse(value: &str) -> OidcResult<Self> {
        let mut types = Self::default();
        for part in value.split_whitespace() {
            let slot = match part {
                "code" => &mut types.code,
                "id_token" => &mut types.id_token,
                "token" => &mut types.token,
                other => return Err(OidcError::UnsupportedResponseType(other.to_string())),
            };
            if *slot {
                return Err(OidcError::UnsupportedResponseType(format!("{part} is repeated")));
            }
            *slot = true;
        }
        if types == Self::default() {
            return Err(OidcError::InvalidRequest("response_type is required".to_string()));
        }
        Ok(types)
    }

    /// Returns whether only an ID Token is requested.
    fn id_token_only(self) -> bool {
        self.id_token && !self.code && !self.token
    }
}

/// Why the request failed, and whether the client can be told.
enum Rejection {
    /// The redirect URI is not trusted; show the error to the user agent.
    Page(OidcError),
    /// Report the error to the client.
    Redirect(Delivery),
}

/// GET `/authorize`
///
/// # Responses
///
/// - 303 See Other to the redirect URI, carrying the response or `error` and
///   `error_description`
/// - 200 OK with an auto-submitting form for `response_mode=form_post`
/// - 400 Bad Request with an HTML page when the client or redirect URI cannot
///   be trusted
pub async fn authorize(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(request): Query<AuthorizationRequest>,
) -> Response {
    match handle_authorization_request(&state, &headers, request).await {
        Ok(delivery) | Err(Rejection::Redirect(delivery)) => deliver(delivery),
        Err(Rejection::Page(err)) => error_page(&err),
    }
}

#[instrument(skip_all, fields(client_id = %request.client_id))]
async fn handle_authorization_request(
    state: &AppState,
    headers: &HeaderMap,
    mut request: AuthorizationRequest,
) -> Result<Delivery, Rejection> {
    if request.client_id.is_empty() {
        return Err(Rejection::Page(OidcError::InvalidRequest("client_id is required".to_string())));
    }
    let client = state.client(&request.client_id).await.map_err(Rejection::Page)?;
    let mut redirect_uri = resolve_redirect_uri(&client, request.redirect_uri.as_deref()).map_err(Rejection::Page)?;

    let redirect = |redirect_uri: &str, request: &AuthorizationRequest, err: OidcError| {
        warn!(error = %err, "authorization request rejected");
        Rejection::Redirect(failure(
            redirect_uri,
            &err,
            request.state.as_deref(),
            ResponseMode::fallback(request),
        ))
    };

    if let Err(err) = apply_request_object(state, &client, &mut request).await {
        return Err(redirect(&redirect_uri, &request, err));
    }
    if request.redirect_uri.is_some() {
        redirect_uri = resolve_redirect_uri(&client, request.redirect_uri.as_deref()).map_err(Rejection::Page)?;
    }

    match authorize_request(state, headers, &client, &request, &redirect_uri).await {
        Ok(delivery) => Ok(delivery),
        Err(err) => Err(redirect(&redirect_uri, &request, err)),
    }
}

/// Picks the redirect URI: the requested one if registered, otherwise the
/// client's only registered URI.
fn resolve_redirect_uri(client: &ClientMetadata, requested: Option<&str>) -> OidcResult<String> {
    match requested {
        Some(uri) if client.has_redirect_uri(uri) => Ok(uri.to_string()),
        Some(_) => Err(OidcError::InvalidRequest("redirect_uri is not registered".to_string())),
        None => match client.redirect_uris.as_slice() {
            [only] => Ok(only.clone()),
            _ => Err(OidcError::InvalidRequest("redirect_uri is required".to_string())),
        },
    }
}

/// Validates `request` or `request_uri` and merges the object into the
/// request.
async fn apply_request_object(
    state: &AppState,
    client: &ClientMetadata,
    request: &mut AuthorizationRequest,
) -> OidcResult<()> {
    let token = match (request.request.take(), request.request_uri.take()) {
        (None, None) => return Ok(()),
        (Some(_), Some(_)) => {
            return Err(OidcError::InvalidRequest(
                "request and request_uri cannot both be present".to_string(),
            ));
        }
        (Some(token), None) => token,
        (None, Some(uri)) => state.fetcher.fetch(&uri, client).await?,
    };

    let keys = state.key_provider(client)?;
    let validator = RequestObjectValidator::new(&state.config.request_object, client);
    let jwt = validator.validate(&token, keys.as_ref()).await?;
    request.merge_request_object(&jwt.claims)?;
    if request.client_id != client.client_id {
        return Err(OidcError::InvalidRequestObject("client_id does not match".to_string()));
    }
    debug!(encrypted = jwt.is_encrypted(), "request object applied");
    Ok(())
}

async fn authorize_request(
    state: &AppState,
    headers: &HeaderMap,
    client: &ClientMetadata,
    request: &AuthorizationRequest,
    redirect_uri: &str,
) -> OidcResult<Delivery> {
    let mode = ResponseMode::for_request(request)?;
    let types = ResponseTypes::parse(&request.response_type)?;
    let scopes: Vec<String> = request.scopes().into_iter().map(str::to_string).collect();
    if types.id_token {
        if !request.is_oidc_request() {
            return Err(OidcError::InvalidScope("id_token requires the openid scope".to_string()));
        }
        if request.nonce.as_deref().is_none_or(str::is_empty) {
            return Err(OidcError::InvalidRequest("nonce is required with id_token".to_string()));
        }
    }
    let claims = request.claims_request()?;

    let session = state
        .sessions
        .authenticate(headers)
        .await?
        .ok_or_else(|| OidcError::LoginRequired("end-user is not authenticated".to_string()))?;
    if let Some(max_age) = request.max_age
        && Utc::now().timestamp() - session.auth_time > max_age
    {
        return Err(OidcError::LoginRequired("authentication is older than max_age".to_string()));
    }
    let profile = state
        .users
        .find(&session.subject)
        .await?
        .ok_or_else(|| OidcError::AccessDenied("unknown end-user".to_string()))?;

    let context = AuthorizationContext {
        claims,
        redirect_uri: redirect_uri.to_string(),
        auth_time: Some(session.auth_time),
        acr: session.acr.clone(),
    };
    let mut response = AuthorizationResponse {
        state: request.state.clone(),
        ..AuthorizationResponse::default()
    };

    if types.code {
        let code = state
            .revocation
            .create_grant(&client.client_id, &profile.subject, scopes.clone(), request.nonce.clone())
            .await
            .map_err(|e| OidcError::ServerError(e.to_string()))?;
        state.remember(code.grant_id, context.clone());
        response.code = Some(code.code);
    }
    if types.token {
        let tokens = state
            .revocation
            .issue_implicit(&client.client_id, &profile.subject, scopes.clone(), request.nonce.clone())
            .await
            .map_err(|e| OidcError::ServerError(e.to_string()))?;
        state.remember(tokens.grant_id, context.clone());
        response.access_token = Some(tokens.access_token);
        response.token_type = Some("Bearer".to_string());
        response.expires_in = Some(tokens.expires_in);
        response.scope = Some(tokens.scope).filter(|s| !s.is_empty());
    }
    if types.id_token {
        let keys = state.key_provider(client)?;
        let params = IdTokenParams {
            issuer: state.issuer(),
            profile: &profile,
            scopes: &scopes,
            requested: &context.claims,
            nonce: request.nonce.as_deref(),
            auth_time: context.auth_time,
            acr: context.acr.as_deref(),
            access_token: response.access_token.as_deref(),
            code: response.code.as_deref(),
            scope_claims_in_id_token: types.id_token_only(),
            lifetime: Duration::seconds(state.config.tokens.id_token_lifespan),
        };
        response.id_token = Some(issue_id_token(&params, client, keys.as_ref()).await?.token);
    }

    info!(response_type = %request.response_type, subject = %profile.subject, "authorization granted");
    Ok(success(redirect_uri, &response, mode))
}

fn deliver(delivery: Delivery) -> Response {
    match delivery {
        Delivery::Redirect(location) => Redirect::to(&location).into_response(),
        Delivery::FormPost(page) => Html(page).into_response(),
    }
}

/// Renders an error page for requests that cannot be redirected.
fn error_page(error: &OidcError) -> Response {
    let description = error.to_error_response().error_description.unwrap_or_default();
    let html = format!(
        r"<!DOCTYPE html>
<html>
<head><title>Authorization Error</title></head>
<body>
<h1>Authorization Error</h1>
<p><strong>Error:</strong> {}</p>
<p><strong>Description:</strong> {}</p>
</body>
</html>",
        html_escape(error.error_code()),
        html_escape(&description)
    );
    (StatusCode::BAD_REQUEST, Html(html)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_type_combinations() {
        let hybrid = ResponseTypes::parse("id_token code token").unwrap();
        assert!(hybrid.code && hybrid.id_token && hybrid.token);
        assert!(!hybrid.id_token_only());
        assert!(ResponseTypes::parse("id_token").unwrap().id_token_only());

        assert!(matches!(
            ResponseTypes::parse("code code"),
            Err(OidcError::UnsupportedResponseType(_))
        ));
        assert!(matches!(
            ResponseTypes::parse("code device"),
            Err(OidcError::UnsupportedResponseType(_))
        ));
        assert!(matches!(ResponseTypes::parse(" "), Err(OidcError::InvalidRequest(_))));
    }

    #[test]
    fn redirect_uri_resolution() {
        let client = ClientMetadata::new("client", None).with_redirect_uri("https://rp.example/cb");
        assert_eq!(resolve_redirect_uri(&client, None).unwrap(), "https://rp.example/cb");
        assert!(resolve_redirect_uri(&client, Some("https://evil.example/cb")).is_err());

        let client = client.with_redirect_uri("https://rp.example/other");
        assert!(resolve_redirect_uri(&client, None).is_err());
        assert_eq!(
            resolve_redirect_uri(&client, Some("https://rp.example/other")).unwrap(),
            "https://rp.example/other"
        );
    }

    #[test]
    fn unredirectable_errors_render_a_page() {
        let response = error_page(&OidcError::InvalidRequest("<script>".to_string()));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
