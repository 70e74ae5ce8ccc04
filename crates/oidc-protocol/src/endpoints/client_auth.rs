//! Client authentication for the token and revocation endpoints.
//!
//! Supports `client_secret_basic`, `client_secret_post` and `none` for public
//! clients.

use axum::http::{HeaderMap, header::AUTHORIZATION};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::debug;

use crate::client::ClientMetadata;
use crate::error::{OidcError, OidcResult};

use super::state::AppState;

/// How the client presented its credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientAuthMethod {
    /// HTTP Basic authentication.
    ClientSecretBasic,
    /// Credentials in the request body.
    ClientSecretPost,
    /// Public client, `client_id` only.
    None,
}

/// Credentials presented by a client.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    /// Client identifier.
    pub client_id: String,
    /// Client secret, if presented.
    pub client_secret: Option<String>,
    /// Presentation method.
    pub method: ClientAuthMethod,
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .field("method", &self.method)
            .finish()
    }
}

/// Extracts client credentials from the Authorization header or the form.
///
/// The header takes precedence. Basic credentials are form-urlencoded before
/// base64 encoding, so both halves are percent-decoded.
///
/// # Errors
///
/// Returns `invalid_client` for a malformed header and `invalid_request`
/// when no `client_id` is present at all.
pub fn extract_credentials(
    auth_header: Option<&str>,
    form_client_id: Option<&str>,
    form_client_secret: Option<&str>,
) -> OidcResult<ClientCredentials> {
    if let Some(auth_str) = auth_header
        && let Some(basic_auth) = auth_str.strip_prefix("Basic ")
    {
        let decoded = STANDARD
            .decode(basic_auth.trim())
            .map_err(|_| OidcError::InvalidClient("invalid basic auth encoding".to_string()))?;
        let credentials = String::from_utf8(decoded)
            .map_err(|_| OidcError::InvalidClient("invalid basic auth encoding".to_string()))?;
        let (client_id, client_secret) = credentials
            .split_once(':')
            .ok_or_else(|| OidcError::InvalidClient("invalid basic auth format".to_string()))?;

        let client_id = urlencoding::decode(client_id)
            .map_err(|_| OidcError::InvalidClient("invalid client_id encoding".to_string()))?
            .into_owned();
        let client_secret = urlencoding::decode(client_secret)
            .map_err(|_| OidcError::InvalidClient("invalid client_secret encoding".to_string()))?
            .into_owned();

        return Ok(ClientCredentials {
            client_id,
            client_secret: Some(client_secret),
            method: ClientAuthMethod::ClientSecretBasic,
        });
    }

    let client_id = form_client_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| OidcError::InvalidRequest("client_id is required".to_string()))?
        .to_string();
    let method = if form_client_secret.is_some() {
        ClientAuthMethod::ClientSecretPost
    } else {
        ClientAuthMethod::None
    };
    Ok(ClientCredentials {
        client_id,
        client_secret: form_client_secret.map(str::to_string),
        method,
    })
}

/// Authenticates the client behind a request.
///
/// Unknown clients and wrong secrets produce the same error.
///
/// # Errors
///
/// Returns `invalid_client` when authentication fails.
pub async fn authenticate_client(
    state: &AppState,
    headers: &HeaderMap,
    form_client_id: Option<&str>,
    form_client_secret: Option<&str>,
) -> OidcResult<ClientMetadata> {
    let auth_header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    let credentials = extract_credentials(auth_header, form_client_id, form_client_secret)?;

    let client = state
        .clients
        .get_client(&credentials.client_id)
        .await?
        .filter(|client| client.verify_secret(credentials.client_secret.as_deref()))
        .ok_or_else(|| {
            debug!(client_id = %credentials.client_id, method = ?credentials.method, "client authentication failed");
            OidcError::InvalidClient("client authentication failed".to_string())
        })?;
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::InMemoryClientRegistry;
    use crate::endpoints::state::InMemoryUserDirectory;
    use crate::endpoints::state::tests::app_state;

    #[test]
    fn basic_credentials_take_precedence() {
        let header = format!("Basic {}", STANDARD.encode("my%3Aclient:s%26cret"));
        let credentials = extract_credentials(Some(&header), Some("form-client"), None).unwrap();
        assert_eq!(credentials.client_id, "my:client");
        assert_eq!(credentials.client_secret.as_deref(), Some("s&cret"));
        assert_eq!(credentials.method, ClientAuthMethod::ClientSecretBasic);
    }

    #[test]
    fn form_credentials() {
        let credentials = extract_credentials(None, Some("client"), Some("secret")).unwrap();
        assert_eq!(credentials.method, ClientAuthMethod::ClientSecretPost);

        let public = extract_credentials(None, Some("client"), None).unwrap();
        assert_eq!(public.method, ClientAuthMethod::None);

        let missing = extract_credentials(None, None, None);
        assert!(matches!(missing, Err(OidcError::InvalidRequest(_))));
    }

    #[test]
    fn malformed_basic_header() {
        let result = extract_credentials(Some("Basic !!!"), None, None);
        assert!(matches!(result, Err(OidcError::InvalidClient(_))));
        let header = format!("Basic {}", STANDARD.encode("no-colon"));
        let result = extract_credentials(Some(&header), None, None);
        assert!(matches!(result, Err(OidcError::InvalidClient(_))));
    }

    #[tokio::test]
    async fn wrong_secret_and_unknown_client_look_alike() {
        let clients = InMemoryClientRegistry::new();
        clients.register(ClientMetadata::new("client", Some("secret".to_string())));
        let state = app_state(clients, InMemoryUserDirectory::new());

        let ok = authenticate_client(&state, &HeaderMap::new(), Some("client"), Some("secret")).await;
        assert_eq!(ok.unwrap().client_id, "client");

        let wrong = authenticate_client(&state, &HeaderMap::new(), Some("client"), Some("nope"))
            .await
            .unwrap_err();
        let unknown = authenticate_client(&state, &HeaderMap::new(), Some("ghost"), Some("secret"))
            .await
            .unwrap_err();
        assert_eq!(wrong.to_string(), unknown.to_string());
        assert_eq!(wrong.http_status(), 401);
    }
}
