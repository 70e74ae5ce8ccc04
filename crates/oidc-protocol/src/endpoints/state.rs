//! Shared state for the protocol endpoints.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderName};
use chrono::Utc;
use oidc_core::Config;
use oidc_keystore::{DefaultKeyProvider, KeyStore};
use oidc_revocation::{GrantRemovalHook, GrantStore, RevocationService};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::claims::{ClaimsRequest, SubjectProfile};
use crate::client::{ClientMetadata, ClientRegistry};
use crate::error::{OidcError, OidcResult};
use crate::request_object::RequestUriFetcher;

/// Header carrying the authenticated subject for [`TrustedHeaderAuthenticator`].
pub const SUBJECT_HEADER: &str = "x-authenticated-subject";

/// Header carrying the satisfied ACR for [`TrustedHeaderAuthenticator`].
pub const ACR_HEADER: &str = "x-authenticated-acr";

/// Source of end-user attributes.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Returns the profile of `subject`, if known.
    async fn find(&self, subject: &str) -> OidcResult<Option<SubjectProfile>>;
}

/// In-process user directory.
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    profiles: RwLock<HashMap<String, SubjectProfile>>,
}

impl InMemoryUserDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a profile.
    pub fn add(&self, profile: SubjectProfile) {
        self.profiles.write().insert(profile.subject.clone(), profile);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find(&self, subject: &str) -> OidcResult<Option<SubjectProfile>> {
        Ok(self.profiles.read().get(subject).cloned())
    }
}

/// An authenticated end-user session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedSession {
    /// Subject identifier.
    pub subject: String,
    /// Time of authentication, seconds since the epoch.
    pub auth_time: i64,
    /// Authentication context class satisfied.
    pub acr: Option<String>,
}

/// Establishes who is behind an authorization request.
///
/// Login pages and session cookies live outside this crate; an implementation
/// adapts whatever front end authenticates the user.
#[async_trait]
pub trait SessionAuthenticator: Send + Sync {
    /// Returns the session behind `headers`, or `None` when nobody is
    /// logged in.
    async fn authenticate(&self, headers: &HeaderMap) -> OidcResult<Option<AuthenticatedSession>>;
}

/// Trusts a subject header set by an authenticating reverse proxy.
#[derive(Debug, Clone)]
pub struct TrustedHeaderAuthenticator {
    subject: HeaderName,
    acr: HeaderName,
}

impl Default for TrustedHeaderAuthenticator {
    fn default() -> Self {
        Self {
            subject: HeaderName::from_static(SUBJECT_HEADER),
            acr: HeaderName::from_static(ACR_HEADER),
        }
    }
}

#[async_trait]
impl SessionAuthenticator for TrustedHeaderAuthenticator {
    async fn authenticate(&self, headers: &HeaderMap) -> OidcResult<Option<AuthenticatedSession>> {
        let Some(value) = headers.get(&self.subject) else {
            return Ok(None);
        };
        let subject = value
            .to_str()
            .map_err(|_| OidcError::InvalidRequest("invalid subject header".to_string()))?
            .trim();
        if subject.is_empty() {
            return Ok(None);
        }
        let acr = headers
            .get(&self.acr)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Ok(Some(AuthenticatedSession {
            subject: subject.to_string(),
            auth_time: Utc::now().timestamp(),
            acr,
        }))
    }
}

/// What the authorization endpoint decided, kept for the token and
/// `UserInfo` endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationContext {
    /// Individually requested claims.
    pub claims: ClaimsRequest,
    /// Redirect URI the code was sent to.
    pub redirect_uri: String,
    /// Time the subject authenticated.
    pub auth_time: Option<i64>,
    /// Authentication context class satisfied.
    pub acr: Option<String>,
}

/// Shared state for the protocol endpoints.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<Config>,
    /// Registered clients.
    pub clients: Arc<dyn ClientRegistry>,
    /// End-user attributes.
    pub users: Arc<dyn UserDirectory>,
    /// End-user authentication.
    pub sessions: Arc<dyn SessionAuthenticator>,
    /// Server signing and decryption keys.
    pub server_keys: Arc<RwLock<KeyStore>>,
    /// Grant and token lifecycle.
    pub revocation: Arc<RevocationService>,
    /// Retrieval of request objects passed by reference.
    pub fetcher: RequestUriFetcher,
    key_providers: Arc<RwLock<HashMap<String, Arc<DefaultKeyProvider>>>>,
    contexts: Arc<RwLock<HashMap<Uuid, AuthorizationContext>>>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("issuer", &self.config.tokens.issuer)
            .field("revocation", &self.revocation)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Creates the endpoint state.
    ///
    /// # Errors
    ///
    /// Returns an error if the `request_uri` HTTP client cannot be built.
    pub fn new(
        config: Config,
        clients: Arc<dyn ClientRegistry>,
        users: Arc<dyn UserDirectory>,
        server_keys: Arc<RwLock<KeyStore>>,
        grants: Arc<dyn GrantStore>,
    ) -> OidcResult<Self> {
        let fetcher = RequestUriFetcher::new(&config.request_object)?;
        let contexts: Arc<RwLock<HashMap<Uuid, AuthorizationContext>>> = Arc::default();
        let evict = Arc::clone(&contexts);
        let on_removed: GrantRemovalHook = Arc::new(move |grant_id: Uuid| {
            evict.write().remove(&grant_id);
        });
        let revocation =
            Arc::new(RevocationService::new(grants, config.tokens.clone()).with_removal_hook(on_removed));
        Ok(Self {
            config: Arc::new(config),
            clients,
            users,
            sessions: Arc::new(TrustedHeaderAuthenticator::default()),
            server_keys,
            revocation,
            fetcher,
            key_providers: Arc::new(RwLock::new(HashMap::new())),
            contexts,
        })
    }

    /// Replaces the session authenticator.
    #[must_use]
    pub fn with_sessions(mut self, sessions: Arc<dyn SessionAuthenticator>) -> Self {
        self.sessions = sessions;
        self
    }

    /// Returns the issuer identifier.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.config.tokens.issuer
    }

    /// Looks up a registered client.
    ///
    /// # Errors
    ///
    /// Returns `invalid_client` for an unknown client.
    pub async fn client(&self, client_id: &str) -> OidcResult<ClientMetadata> {
        self.clients
            .get_client(client_id)
            .await?
            .ok_or_else(|| OidcError::InvalidClient(format!("unknown client {client_id}")))
    }

    /// Returns the key provider for `client`, building it on first use.
    ///
    /// Concurrent first uses may each build a provider; the last one stored
    /// wins.
    ///
    /// # Errors
    ///
    /// Returns an error if the client's JWKS client cannot be built.
    pub fn key_provider(&self, client: &ClientMetadata) -> OidcResult<Arc<DefaultKeyProvider>> {
        if let Some(provider) = self.key_providers.read().get(&client.client_id) {
            return Ok(Arc::clone(provider));
        }
        let provider = Arc::new(client.key_provider(Some(Arc::clone(&self.server_keys)), &self.config.keys)?);
        self.key_providers
            .write()
            .insert(client.client_id.clone(), Arc::clone(&provider));
        Ok(provider)
    }

    /// Drops the cached key provider of `client_id`, after its registration
    /// changed.
    pub fn invalidate_client(&self, client_id: &str) {
        self.key_providers.write().remove(client_id);
    }

    /// Records the authorization context of a grant. The entry is dropped
    /// when the revocation service removes the grant.
    pub fn remember(&self, grant_id: Uuid, context: AuthorizationContext) {
        self.contexts.write().insert(grant_id, context);
    }

    /// Returns the authorization context of a grant.
    #[must_use]
    pub fn context(&self, grant_id: Uuid) -> Option<AuthorizationContext> {
        self.contexts.read().get(&grant_id).cloned()
    }
}
