//! OIDC request types.
//!
//! Request types for the authorization, token, revocation and `UserInfo`
//! endpoints, plus merging of request object parameters into an
//! authorization request.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::claims::ClaimsRequest;
use crate::error::{OidcError, OidcResult};

/// Authorization endpoint request.
///
/// `response_type` and `client_id` default to empty so a missing value can be
/// reported as an OAuth error instead of a framework rejection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    /// Response type, space-delimited.
    #[serde(default)]
    pub response_type: String,

    /// Client ID.
    #[serde(default)]
    pub client_id: String,

    /// Redirect URI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,

    /// Scope, space-delimited.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// State parameter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// Response mode (`query` or `fragment`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mode: Option<String>,

    /// Nonce.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// Display mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,

    /// Prompt values, space-delimited.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,

    /// Maximum authentication age in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_age: Option<i64>,

    /// UI locales, space-delimited.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ui_locales: Option<String>,

    /// Claims locales, space-delimited.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claims_locales: Option<String>,

    /// ID token hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token_hint: Option<String>,

    /// Login hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_hint: Option<String>,

    /// ACR values, space-delimited.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acr_values: Option<String>,

    /// Request object passed by value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<String>,

    /// Request object passed by reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_uri: Option<String>,

    /// Claims request (JSON).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claims: Option<String>,
}

impl AuthorizationRequest {
    /// Returns the scopes as a vector.
    #[must_use]
    pub fn scopes(&self) -> Vec<&str> {
        self.scope
            .as_ref()
            .map(|s| s.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// Checks if `openid` scope is requested.
    #[must_use]
    pub fn is_oidc_request(&self) -> bool {
        self.scopes().contains(&"openid")
    }

    /// Returns the individual response types.
    #[must_use]
    pub fn response_types(&self) -> Vec<&str> {
        self.response_type.split_whitespace().collect()
    }

    /// Returns whether `response_type` includes `value`.
    #[must_use]
    pub fn has_response_type(&self, value: &str) -> bool {
        self.response_types().contains(&value)
    }

    /// Returns whether the response goes in the fragment.
    ///
    /// Any response type other than plain `code` defaults to the fragment.
    #[must_use]
    pub fn uses_fragment(&self) -> bool {
        match self.response_mode.as_deref() {
            Some("fragment") => true,
            Some("query") => false,
            _ => self.response_types() != ["code"],
        }
    }

    /// Parses the `claims` parameter.
    ///
    /// # Errors
    ///
    /// Returns `invalid_request` if the parameter is not a claims request.
    pub fn claims_request(&self) -> OidcResult<ClaimsRequest> {
        match self.claims.as_deref() {
            None => Ok(ClaimsRequest::default()),
            Some(raw) => ClaimsRequest::from_param(raw)
                .map_err(|e| OidcError::InvalidRequest(format!("invalid claims parameter: {e}"))),
        }
    }

    /// Overrides parameters with those carried by a request object.
    ///
    /// `response_type`, `scope` and `prompt` may be strings or arrays of
    /// strings. `claims` may be an object or its JSON text. Members the
    /// request object does not carry keep their query value.
    ///
    /// # Errors
    ///
    /// Returns `invalid_request_object` for a member of the wrong type.
    pub fn merge_request_object(&mut self, object: &Map<String, Value>) -> OidcResult<()> {
        if let Some(value) = object.get("response_type") {
            self.response_type = space_delimited("response_type", value)?;
        }
        if let Some(value) = object.get("client_id") {
            self.client_id = string_member("client_id", value)?;
        }
        if let Some(value) = object.get("scope") {
            self.scope = Some(space_delimited("scope", value)?);
        }
        if let Some(value) = object.get("prompt") {
            self.prompt = Some(space_delimited("prompt", value)?);
        }
        if let Some(value) = object.get("max_age") {
            self.max_age = Some(integer_member("max_age", value)?);
        }
        if let Some(value) = object.get("claims") {
            self.claims = Some(match value {
                Value::String(text) => text.clone(),
                Value::Object(_) => value.to_string(),
                _ => return Err(wrong_type("claims")),
            });
        }

        for (name, slot) in [
            ("redirect_uri", &mut self.redirect_uri),
            ("state", &mut self.state),
            ("response_mode", &mut self.response_mode),
            ("nonce", &mut self.nonce),
            ("display", &mut self.display),
            ("ui_locales", &mut self.ui_locales),
            ("claims_locales", &mut self.claims_locales),
            ("id_token_hint", &mut self.id_token_hint),
            ("login_hint", &mut self.login_hint),
            ("acr_values", &mut self.acr_values),
        ] {
            if let Some(value) = object.get(name) {
                *slot = Some(string_member(name, value)?);
            }
        }
        Ok(())
    }
}

fn wrong_type(name: &str) -> OidcError {
    OidcError::InvalidRequestObject(format!("{name} has the wrong type"))
}

fn string_member(name: &str, value: &Value) -> OidcResult<String> {
    value.as_str().map(str::to_string).ok_or_else(|| wrong_type(name))
}

fn integer_member(name: &str, value: &Value) -> OidcResult<i64> {
    match value {
        Value::Number(n) => n.as_i64().ok_or_else(|| wrong_type(name)),
        Value::String(s) => s.parse().map_err(|_| wrong_type(name)),
        _ => Err(wrong_type(name)),
    }
}

fn space_delimited(name: &str, value: &Value) -> OidcResult<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().ok_or_else(|| wrong_type(name)))
            .collect::<OidcResult<Vec<_>>>()
            .map(|items| items.join(" ")),
        _ => Err(wrong_type(name)),
    }
}

/// Token endpoint request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenRequest {
    /// Grant type.
    #[serde(default)]
    pub grant_type: String,

    /// Authorization code (for `authorization_code` grant).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Redirect URI (for `authorization_code` grant).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,

    /// Client ID (if not using client authentication).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Client secret (for `client_secret_post`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Scope.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Refresh token (for `refresh_token` grant).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// Revocation endpoint request.
///
/// `token` is optional here so a missing token is answered with
/// `invalid_request` rather than a framework rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RevocationRequest {
    /// The token to revoke.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Token type hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type_hint: Option<String>,

    /// Client ID (for `client_secret_post`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Client secret (for `client_secret_post`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

/// `UserInfo` POST body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserInfoRequest {
    /// Access token sent in the body instead of the Authorization header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}
