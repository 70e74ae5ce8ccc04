//! Authorization response encoding.
//!
//! Turns authorization results and errors into redirect locations or
//! auto-submitting forms, depending on the response mode.

use std::collections::BTreeMap;

use url::Url;

use crate::error::{OidcError, OidcResult};
use crate::request::AuthorizationRequest;

/// How authorization response parameters reach the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    /// Query component of the redirect URI.
    Query,
    /// Fragment component of the redirect URI.
    Fragment,
    /// HTML form posted to the redirect URI.
    FormPost,
}

impl ResponseMode {
    /// Determines the response mode of `request`.
    ///
    /// Without an explicit `response_mode`, plain `code` uses the query and
    /// every other response type uses the fragment.
    ///
    /// # Errors
    ///
    /// Returns `invalid_request` for an unknown mode, and for `query` with a
    /// response type that returns tokens.
    pub fn for_request(request: &AuthorizationRequest) -> OidcResult<Self> {
        let issues_tokens = request
            .response_types()
            .iter()
            .any(|t| matches!(*t, "token" | "id_token"));
        match request.response_mode.as_deref() {
            None if issues_tokens => Ok(Self::Fragment),
            None => Ok(Self::Query),
            Some("query") if issues_tokens => Err(OidcError::InvalidRequest(
                "response_mode query cannot carry tokens".to_string(),
            )),
            Some("query") => Ok(Self::Query),
            Some("fragment") => Ok(Self::Fragment),
            Some("form_post") => Ok(Self::FormPost),
            Some(other) => Err(OidcError::InvalidRequest(format!("unsupported response_mode {other}"))),
        }
    }

    /// Fallback mode for errors raised before the mode is known.
    #[must_use]
    pub fn fallback(request: &AuthorizationRequest) -> Self {
        Self::for_request(request).unwrap_or(if request.uses_fragment() {
            Self::Fragment
        } else {
            Self::Query
        })
    }
}

/// Successful authorization response parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationResponse {
    /// Authorization code.
    pub code: Option<String>,
    /// Access token (implicit and hybrid flows).
    pub access_token: Option<String>,
    /// Token type, with the access token.
    pub token_type: Option<String>,
    /// ID Token.
    pub id_token: Option<String>,
    /// Access token lifetime in seconds.
    pub expires_in: Option<i64>,
    /// Granted scope.
    pub scope: Option<String>,
    /// Echoed state.
    pub state: Option<String>,
}

impl AuthorizationResponse {
    /// Returns the response as ordered parameters.
    #[must_use]
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(code) = &self.code {
            params.push(("code", code.clone()));
        }
        if let Some(token) = &self.access_token {
            params.push(("access_token", token.clone()));
        }
        if let Some(token_type) = &self.token_type {
            params.push(("token_type", token_type.clone()));
        }
        if let Some(id_token) = &self.id_token {
            params.push(("id_token", id_token.clone()));
        }
        if let Some(expires_in) = self.expires_in {
            params.push(("expires_in", expires_in.to_string()));
        }
        if let Some(scope) = &self.scope {
            params.push(("scope", scope.clone()));
        }
        if let Some(state) = &self.state {
            params.push(("state", state.clone()));
        }
        params
    }
}

/// Encoded authorization response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Send the user agent to this location.
    Redirect(String),
    /// Serve this page, which posts the parameters to the client.
    FormPost(String),
}

/// Encodes `params` for `redirect_uri` in `mode`.
#[must_use]
pub fn deliver(redirect_uri: &str, params: &[(&str, String)], mode: ResponseMode) -> Delivery {
    match mode {
        ResponseMode::Query => {
            let separator = if redirect_uri.contains('?') { '&' } else { '?' };
            Delivery::Redirect(format!("{redirect_uri}{separator}{}", encode_params(params)))
        }
        ResponseMode::Fragment => Delivery::Redirect(format!("{redirect_uri}#{}", encode_params(params))),
        ResponseMode::FormPost => Delivery::FormPost(form_post_page(redirect_uri, params)),
    }
}

/// Encodes a successful response.
#[must_use]
pub fn success(redirect_uri: &str, response: &AuthorizationResponse, mode: ResponseMode) -> Delivery {
    deliver(redirect_uri, &response.params(), mode)
}

/// Encodes an error response. `state` is echoed when present.
#[must_use]
pub fn failure(redirect_uri: &str, error: &OidcError, state: Option<&str>, mode: ResponseMode) -> Delivery {
    let response = error.to_error_response();
    let mut params = vec![("error", response.error)];
    if let Some(description) = response.error_description {
        params.push(("error_description", description));
    }
    if let Some(state) = state {
        params.push(("state", state.to_string()));
    }
    deliver(redirect_uri, &params, mode)
}

/// Decodes the parameters carried by a redirect location, from the fragment
/// when present and the query otherwise.
///
/// # Errors
///
/// Returns `invalid_request` if `location` is not an absolute URL.
pub fn redirect_params(location: &str) -> OidcResult<BTreeMap<String, String>> {
    let url = Url::parse(location).map_err(|e| OidcError::InvalidRequest(format!("invalid location: {e}")))?;
    let encoded = url.fragment().or_else(|| url.query()).unwrap_or_default();
    Ok(url::form_urlencoded::parse(encoded.as_bytes()).into_owned().collect())
}

fn encode_params(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn form_post_page(redirect_uri: &str, params: &[(&str, String)]) -> String {
    let fields = params
        .iter()
        .map(|(k, v)| {
            format!(
                r#"<input type="hidden" name="{}" value="{}" />"#,
                html_escape(k),
                html_escape(v)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Submit This Form</title></head>
<body onload="document.forms[0].submit()">
<form method="post" action="{}">
{fields}
<noscript><button type="submit">Continue</button></noscript>
</form>
</body>
</html>"#,
        html_escape(redirect_uri)
    )
}

/// Escapes text for HTML attribute and element content.
#[must_use]
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}
