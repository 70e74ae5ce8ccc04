//! Test harness that runs the endpoints on a loopback port.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use oidc_core::Config;
use oidc_crypto::{JsonWebKeySet, KeyEncryptionAlgorithm, SignatureAlgorithm, b64_decode};
use oidc_keystore::{DefaultKeyProvider, KeyAlgorithm, KeyStore};
use oidc_protocol::authorization::redirect_params;
use oidc_protocol::endpoints::InMemoryUserDirectory;
use oidc_protocol::endpoints::state::SUBJECT_HEADER;
use oidc_protocol::{
    AddressClaim, AppState, ClientMetadata, InMemoryClientRegistry, SubjectProfile, oidc_router,
};
use oidc_revocation::InMemoryGrantStore;
use parking_lot::RwLock;
use reqwest::{Client, Response, StatusCode, header};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Registered client id.
pub const CLIENT_ID: &str = "conformance-rp";

/// Registered client secret, also the key for HS* and A*KW.
pub const CLIENT_SECRET: &str = "conformance-secret-with-enough-entropy";

/// The client's only redirect URI.
pub const REDIRECT_URI: &str = "https://rp.example.org/callback";

/// Subject the user agent is logged in as.
pub const SUBJECT: &str = "alice";

/// Asymmetric algorithms the relying party holds signing keys for.
pub const RP_SIGNING_ALGS: [SignatureAlgorithm; 4] = [
    SignatureAlgorithm::Rs256,
    SignatureAlgorithm::Ps384,
    SignatureAlgorithm::Es256,
    SignatureAlgorithm::Es512,
];

/// A running server plus the relying party's keys.
pub struct TestServer {
    /// Base URL of the running server.
    pub base_url: String,
    /// HTTP client that does not follow redirects.
    pub http: Client,
    /// Shared state of the running server.
    pub state: AppState,
    /// Relying party key store holding one key per [`RP_SIGNING_ALGS`] entry.
    pub rp_keys: Arc<RwLock<KeyStore>>,
    _shutdown: oneshot::Sender<()>,
}

impl TestServer {
    /// Starts a server on a random loopback port.
    ///
    /// # Errors
    ///
    /// Returns an error if keys cannot be generated or the port bound.
    pub async fn start() -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let base_url = format!("http://{}", listener.local_addr()?);

        let mut config = Config::for_testing();
        config.tokens.issuer.clone_from(&base_url);
        let iterations = config.keys.kdf_iterations;

        let mut server_keys = KeyStore::in_memory("op-password", "CN=Conformance OP", iterations)?;
        server_keys.generate_key(KeyAlgorithm::Signature(SignatureAlgorithm::Rs256), None, 2048)?;
        server_keys.generate_key(KeyAlgorithm::Encryption(KeyEncryptionAlgorithm::RsaOaep), None, 2048)?;

        let mut rp_keys = KeyStore::in_memory("rp-password", "CN=Conformance RP", iterations)?;
        for alg in RP_SIGNING_ALGS {
            rp_keys.generate_key(KeyAlgorithm::Signature(alg), None, 2048)?;
        }

        let clients = InMemoryClientRegistry::new();
        clients.register(
            ClientMetadata::new(CLIENT_ID, Some(CLIENT_SECRET.to_string()))
                .with_redirect_uri(REDIRECT_URI)
                .with_jwks(rp_keys.public_jwks()),
        );
        let users = InMemoryUserDirectory::new();
        users.add(subject_profile());

        let state = AppState::new(
            config,
            Arc::new(clients),
            Arc::new(users),
            Arc::new(RwLock::new(server_keys)),
            Arc::new(InMemoryGrantStore::new()),
        )?;

        let app = oidc_router().with_state(state.clone());
        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = server.await {
                tracing::error!(error = %e, "test server failed");
            }
        });

        let http = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            base_url,
            http,
            state,
            rp_keys: Arc::new(RwLock::new(rp_keys)),
            _shutdown: shutdown,
        })
    }

    /// Returns the absolute URL of `path`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Returns the server's published keys.
    #[must_use]
    pub fn server_jwks(&self) -> JsonWebKeySet {
        self.state.server_keys.read().public_jwks()
    }

    /// Key provider as the relying party sees it: its own key store, the
    /// shared secret and the server's public keys.
    #[must_use]
    pub fn rp_key_provider(&self) -> DefaultKeyProvider {
        DefaultKeyProvider::new()
            .with_shared_secret(CLIENT_SECRET)
            .with_keystore(Arc::clone(&self.rp_keys))
            .with_jwks(self.server_jwks())
    }

    /// Sends an authorization request for the logged-in subject and returns
    /// the parameters of the redirect.
    ///
    /// # Errors
    ///
    /// Returns an error unless the server answers with a redirect.
    pub async fn authorize(&self, query: &[(&str, &str)]) -> anyhow::Result<BTreeMap<String, String>> {
        let response = self
            .http
            .get(self.url("/authorize"))
            .header(SUBJECT_HEADER, SUBJECT)
            .query(query)
            .send()
            .await?;
        let status = response.status();
        if status != StatusCode::SEE_OTHER {
            anyhow::bail!("expected a redirect, got {status}: {}", response.text().await?);
        }
        let location = response
            .headers()
            .get(header::LOCATION)
            .ok_or_else(|| anyhow::anyhow!("redirect without Location"))?
            .to_str()?
            .to_string();
        anyhow::ensure!(location.starts_with(REDIRECT_URI), "redirected to {location}");
        Ok(redirect_params(&location)?)
    }

    /// Posts a form to the token endpoint with `client_secret_basic`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn token(&self, form: &[(&str, &str)]) -> anyhow::Result<(StatusCode, Value)> {
        let response = self
            .http
            .post(self.url("/token"))
            .basic_auth(CLIENT_ID, Some(CLIENT_SECRET))
            .form(form)
            .send()
            .await?;
        Ok((response.status(), response.json().await.unwrap_or(Value::Null)))
    }

    /// Runs the authorization code flow and returns the token response.
    ///
    /// # Errors
    ///
    /// Returns an error if any step does not succeed.
    pub async fn code_flow(&self, query: &[(&str, &str)]) -> anyhow::Result<Value> {
        let mut params = vec![("client_id", CLIENT_ID), ("response_type", "code")];
        params.extend_from_slice(query);
        if !params.iter().any(|(name, _)| *name == "scope") {
            params.push(("scope", "openid"));
        }
        let redirect = self.authorize(&params).await?;
        let code = redirect
            .get("code")
            .ok_or_else(|| anyhow::anyhow!("no code in redirect: {redirect:?}"))?;

        let (status, body) = self
            .token(&[
                ("grant_type", "authorization_code"),
                ("code", code.as_str()),
                ("redirect_uri", REDIRECT_URI),
            ])
            .await?;
        anyhow::ensure!(status == StatusCode::OK, "token endpoint answered {status}: {body}");
        Ok(body)
    }

    /// Posts to the revocation endpoint with `client_secret_post`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn revoke(&self, token: &str, hint: Option<&str>) -> anyhow::Result<StatusCode> {
        let mut form = vec![("token", token), ("client_id", CLIENT_ID), ("client_secret", CLIENT_SECRET)];
        if let Some(hint) = hint {
            form.push(("token_type_hint", hint));
        }
        let response = self.http.post(self.url("/revoke")).form(&form).send().await?;
        Ok(response.status())
    }

    /// Calls the `UserInfo` endpoint with a bearer token.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn userinfo(&self, access_token: &str) -> anyhow::Result<Response> {
        Ok(self.http.get(self.url("/userinfo")).bearer_auth(access_token).send().await?)
    }
}

/// The profile of [`SUBJECT`].
#[must_use]
pub fn subject_profile() -> SubjectProfile {
    SubjectProfile::new(SUBJECT)
        .with_attribute("name", "Alice Example")
        .with_attribute("email", "alice@example.org")
        .with_attribute("email_verified", true)
        .with_address(AddressClaim {
            street_address: Some("1 Main Street".to_string()),
            locality: Some("Springfield".to_string()),
            country: Some("US".to_string()),
            ..AddressClaim::default()
        })
}

/// Reads the payload of a compact JWS without verifying it.
///
/// # Errors
///
/// Returns an error if the token is not a JWS with a JSON payload.
pub fn unverified_claims(token: &str) -> anyhow::Result<Value> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("not a compact JWS"))?;
    Ok(serde_json::from_slice(&b64_decode(payload, "payload")?)?)
}

/// Returns a string member of a JSON object.
///
/// # Errors
///
/// Returns an error if the member is missing or not a string.
pub fn str_member<'a>(value: &'a Value, name: &str) -> anyhow::Result<&'a str> {
    value
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("{name} missing from {value}"))
}
