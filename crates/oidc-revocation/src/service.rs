//! Token issuance, validation and the revocation cascade.
//!
//! Every state change on a grant is a read-modify-write retried under
//! [`GrantStore::compare_and_swap`], so a token observed as revoked before an
//! operation starts can never be consumed by it.
//!
//! Each committed change also prunes records that can no longer matter (see
//! [`Grant::prune`]). A grant left without live tokens is removed from the
//! store.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use oidc_core::config::TokenConfig;
use oidc_core::event::{Event, EventType};
use oidc_crypto::generate_opaque_token;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::{RevocationError, RevocationResult};
use crate::grant::{Grant, TokenKind, TokenRecord, hash_token};
use crate::store::GrantStore;

/// Maximum compare-and-swap attempts per operation.
const MAX_CAS_ATTEMPTS: usize = 8;

/// Token type hint sent to the revocation endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenTypeHint {
    /// `access_token`
    AccessToken,
    /// `refresh_token`
    RefreshToken,
}

impl TokenTypeHint {
    /// Parses a hint. Unknown values yield `None` and are ignored by the
    /// lookup.
    #[must_use]
    pub fn from_param(value: &str) -> Option<Self> {
        match value {
            "access_token" => Some(Self::AccessToken),
            "refresh_token" => Some(Self::RefreshToken),
            _ => None,
        }
    }

    /// Returns the parameter value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AccessToken => "access_token",
            Self::RefreshToken => "refresh_token",
        }
    }
}

/// Authorization code issued for a new grant.
#[derive(Clone)]
pub struct AuthorizationCode {
    /// Grant the code belongs to.
    pub grant_id: Uuid,
    /// Opaque code value.
    pub code: String,
}

impl fmt::Debug for AuthorizationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationCode")
            .field("grant_id", &self.grant_id)
            .field("code", &"[REDACTED]")
            .finish()
    }
}

/// Tokens returned by a code exchange or a refresh.
#[derive(Clone)]
pub struct IssuedTokens {
    /// Grant the tokens belong to.
    pub grant_id: Uuid,
    /// Subject of the grant.
    pub subject: String,
    /// Opaque access token.
    pub access_token: String,
    /// Opaque refresh token.
    pub refresh_token: Option<String>,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    /// Space-delimited granted scopes.
    pub scope: String,
    /// Nonce from the authorization request.
    pub nonce: Option<String>,
}

impl fmt::Debug for IssuedTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedTokens")
            .field("grant_id", &self.grant_id)
            .field("subject", &self.subject)
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Grant details behind a valid access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessTokenInfo {
    /// Grant id.
    pub grant_id: Uuid,
    /// Client the token was issued to.
    pub client_id: String,
    /// Subject.
    pub subject: String,
    /// Granted scopes.
    pub scopes: Vec<String>,
    /// Token expiry.
    pub expires_at: DateTime<Utc>,
}

impl AccessTokenInfo {
    /// Returns whether `scope` was granted.
    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|granted| granted == scope)
    }
}

/// What a revocation request did. Every variant maps to a success response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevocationOutcome {
    /// Tokens changed state.
    Revoked {
        /// Grant the token belongs to.
        grant_id: Uuid,
        /// Number of tokens revoked by the cascade.
        count: usize,
    },
    /// The token was already revoked.
    AlreadyRevoked,
    /// No grant holds the token.
    Unknown,
    /// The token belongs to another client and was left untouched.
    NotOwned,
}

/// Result of applying a change to a loaded grant.
enum Step<T> {
    /// Persist the grant, then succeed.
    Commit(T),
    /// Leave the grant untouched and succeed.
    Keep(T),
    /// Leave the grant untouched and fail.
    Reject(RevocationError),
    /// Persist the grant, then fail.
    CommitAndReject(RevocationError),
}

/// Called with the id of every grant removed from the store.
pub type GrantRemovalHook = Arc<dyn Fn(Uuid) + Send + Sync>;

/// Issues, validates and revokes grant tokens.
pub struct RevocationService {
    store: Arc<dyn GrantStore>,
    config: TokenConfig,
    on_removed: Option<GrantRemovalHook>,
}

impl fmt::Debug for RevocationService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RevocationService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RevocationService {
    /// Creates a service over `store` with token lifetimes from `config`.
    #[must_use]
    pub fn new(store: Arc<dyn GrantStore>, config: TokenConfig) -> Self {
        Self {
            store,
            config,
            on_removed: None,
        }
    }

    /// Runs `hook` after each spent grant is removed, so state kept beside
    /// the grant can be dropped with it.
    #[must_use]
    pub fn with_removal_hook(mut self, hook: GrantRemovalHook) -> Self {
        self.on_removed = Some(hook);
        self
    }

    /// Returns the grant store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn GrantStore> {
        &self.store
    }

    /// Returns the token configuration.
    #[must_use]
    pub const fn config(&self) -> &TokenConfig {
        &self.config
    }

    /// Creates a grant and its single-use authorization code.
    ///
    /// # Errors
    ///
    /// Returns an error if the grant cannot be stored.
    #[instrument(skip_all, fields(client_id = %client_id))]
    pub async fn create_grant(
        &self,
        client_id: &str,
        subject: &str,
        scopes: Vec<String>,
        nonce: Option<String>,
    ) -> RevocationResult<AuthorizationCode> {
        let code = generate_opaque_token();
        let mut grant = Grant::new(client_id, subject, scopes);
        grant.nonce = nonce;
        grant.tokens.push(TokenRecord::issue(
            &code,
            TokenKind::AuthorizationCode,
            Duration::seconds(self.config.auth_code_lifespan),
            Utc::now(),
        ));
        let grant_id = grant.id;
        self.store.insert(grant).await?;
        debug!(%grant_id, "created grant");
        Ok(AuthorizationCode { grant_id, code })
    }

    /// Creates a grant holding a single access token and no refresh token,
    /// for tokens returned directly from the authorization endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the grant cannot be stored.
    #[instrument(skip_all, fields(client_id = %client_id))]
    pub async fn issue_implicit(
        &self,
        client_id: &str,
        subject: &str,
        scopes: Vec<String>,
        nonce: Option<String>,
    ) -> RevocationResult<IssuedTokens> {
        let access_token = generate_opaque_token();
        let mut grant = Grant::new(client_id, subject, scopes);
        grant.nonce = nonce;
        grant.add_token_pair(
            TokenRecord::issue(
                &access_token,
                TokenKind::AccessToken,
                Duration::seconds(self.config.access_token_lifespan),
                Utc::now(),
            ),
            None,
        );
        let tokens = IssuedTokens {
            grant_id: grant.id,
            subject: grant.subject.clone(),
            access_token,
            refresh_token: None,
            expires_in: self.config.access_token_lifespan,
            scope: grant.scope(),
            nonce: grant.nonce.clone(),
        };
        self.store.insert(grant).await?;
        debug!(grant_id = %tokens.grant_id, "issued implicit access token");
        Ok(tokens)
    }

    /// Exchanges an authorization code for an access and refresh token pair.
    ///
    /// A code is consumed by its first exchange. Presenting it again revokes
    /// every token of the grant.
    ///
    /// # Errors
    ///
    /// Returns [`RevocationError::TokenNotFound`], [`RevocationError::TokenExpired`],
    /// [`RevocationError::ClientMismatch`] or [`RevocationError::CodeReused`].
    #[instrument(skip_all, fields(client_id = %client_id))]
    pub async fn exchange_code(&self, code: &str, client_id: &str) -> RevocationResult<IssuedTokens> {
        let hash = hash_token(code);
        let grant_id = self.grant_for(&hash).await?;
        let result = self
            .update(grant_id, |grant| {
                let now = Utc::now();
                if grant.client_id != client_id {
                    return Step::Reject(RevocationError::ClientMismatch);
                }
                let Some(record) = grant.token_mut(&hash) else {
                    return Step::Reject(RevocationError::TokenNotFound);
                };
                if record.kind != TokenKind::AuthorizationCode {
                    return Step::Reject(RevocationError::WrongTokenType {
                        expected: TokenKind::AuthorizationCode.as_str(),
                    });
                }
                if record.is_revoked() {
                    grant.revoke_all();
                    return Step::CommitAndReject(RevocationError::CodeReused);
                }
                if record.is_expired(now) {
                    return Step::Reject(RevocationError::TokenExpired);
                }
                record.revoke();
                Step::Commit(self.issue_pair(grant, now))
            })
            .await;

        match &result {
            Ok(tokens) => Event::builder(EventType::CodeToToken)
                .client(client_id)
                .subject(&tokens.subject)
                .grant(grant_id)
                .emit(),
            Err(e) => Event::builder(EventType::CodeToTokenError)
                .failure(e.to_string())
                .client(client_id)
                .grant(grant_id)
                .emit(),
        }
        result
    }

    /// Uses a refresh token to obtain a new access token.
    ///
    /// The presented refresh token is rotated: it is revoked and a new one is
    /// returned. Previously issued access tokens stay valid.
    ///
    /// # Errors
    ///
    /// Returns [`RevocationError::TokenRevoked`] if the refresh token or its
    /// grant was revoked, [`RevocationError::TokenExpired`],
    /// [`RevocationError::TokenNotFound`] or [`RevocationError::ClientMismatch`].
    #[instrument(skip_all, fields(client_id = %client_id))]
    pub async fn refresh(&self, refresh_token: &str, client_id: &str) -> RevocationResult<IssuedTokens> {
        let hash = hash_token(refresh_token);
        let grant_id = match self.grant_for(&hash).await {
            Ok(id) => id,
            Err(e) => {
                Event::builder(EventType::RefreshTokenError)
                    .failure(e.to_string())
                    .client(client_id)
                    .emit();
                return Err(e);
            }
        };
        let result = self
            .update(grant_id, |grant| {
                let now = Utc::now();
                if grant.client_id != client_id {
                    return Step::Reject(RevocationError::ClientMismatch);
                }
                let blocked = grant.refresh_blocked;
                let Some(record) = grant.token_mut(&hash) else {
                    return Step::Reject(RevocationError::TokenNotFound);
                };
                if record.kind != TokenKind::RefreshToken {
                    return Step::Reject(RevocationError::WrongTokenType {
                        expected: TokenKind::RefreshToken.as_str(),
                    });
                }
                if blocked || record.is_revoked() {
                    return Step::Reject(RevocationError::TokenRevoked);
                }
                if record.is_expired(now) {
                    return Step::Reject(RevocationError::TokenExpired);
                }
                record.revoke();
                Step::Commit(self.issue_pair(grant, now))
            })
            .await;

        match &result {
            Ok(tokens) => Event::builder(EventType::RefreshToken)
                .client(client_id)
                .subject(&tokens.subject)
                .grant(grant_id)
                .emit(),
            Err(e) => Event::builder(EventType::RefreshTokenError)
                .failure(e.to_string())
                .client(client_id)
                .grant(grant_id)
                .emit(),
        }
        result
    }

    /// Revokes a token and applies the cascade.
    ///
    /// Unknown, already revoked and foreign tokens are not errors, so the
    /// caller can answer every well-formed request with success.
    ///
    /// # Errors
    ///
    /// Returns an error only for storage failures.
    #[instrument(skip_all, fields(client_id = %client_id, hint = ?hint))]
    pub async fn revoke(
        &self,
        token: &str,
        hint: Option<TokenTypeHint>,
        client_id: &str,
    ) -> RevocationResult<RevocationOutcome> {
        let hash = hash_token(token);
        let Some(grant_id) = self.store.find_by_token_hash(&hash).await? else {
            debug!("revocation of unknown token");
            return Ok(RevocationOutcome::Unknown);
        };

        let outcome = self
            .update(grant_id, |grant| {
                if grant.client_id != client_id {
                    return Step::Keep(RevocationOutcome::NotOwned);
                }
                match grant.revoke_token(&hash) {
                    0 => Step::Keep(RevocationOutcome::AlreadyRevoked),
                    count => Step::Commit(RevocationOutcome::Revoked { grant_id, count }),
                }
            })
            .await?;

        match outcome {
            RevocationOutcome::Revoked { count, .. } => {
                info!(%grant_id, count, "revoked tokens");
                let mut event = Event::builder(EventType::RevokeToken)
                    .client(client_id)
                    .grant(grant_id)
                    .detail("revoked", count.to_string());
                if let Some(hint) = hint {
                    event = event.detail("token_type_hint", hint.as_str());
                }
                event.emit();
            }
            RevocationOutcome::NotOwned => {
                warn!(%grant_id, "client tried to revoke a token issued to another client");
            }
            RevocationOutcome::AlreadyRevoked | RevocationOutcome::Unknown => {}
        }
        Ok(outcome)
    }

    /// Revokes every token of a grant.
    ///
    /// # Errors
    ///
    /// Returns [`RevocationError::TokenNotFound`] if the grant does not exist.
    #[instrument(skip(self))]
    pub async fn revoke_grant(&self, grant_id: Uuid) -> RevocationResult<usize> {
        let count = self
            .update(grant_id, |grant| Step::Commit(grant.revoke_all()))
            .await?;
        Event::builder(EventType::RevokeGrant)
            .grant(grant_id)
            .detail("revoked", count.to_string())
            .emit();
        Ok(count)
    }

    /// Checks an access token presented to a resource endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`RevocationError::TokenRevoked`], [`RevocationError::TokenExpired`]
    /// or [`RevocationError::TokenNotFound`]; callers must not reveal which.
    pub async fn validate_access_token(&self, token: &str) -> RevocationResult<AccessTokenInfo> {
        let hash = hash_token(token);
        let grant_id = self.grant_for(&hash).await?;
        let grant = self
            .store
            .load(grant_id)
            .await?
            .ok_or(RevocationError::TokenNotFound)?;
        let record = grant
            .token(&hash)
            .filter(|record| record.kind == TokenKind::AccessToken)
            .ok_or(RevocationError::TokenNotFound)?;
        if record.is_revoked() {
            return Err(RevocationError::TokenRevoked);
        }
        if record.is_expired(Utc::now()) {
            return Err(RevocationError::TokenExpired);
        }
        Ok(AccessTokenInfo {
            grant_id,
            client_id: grant.client_id.clone(),
            subject: grant.subject.clone(),
            scopes: grant.scopes.clone(),
            expires_at: record.expires_at,
        })
    }

    async fn grant_for(&self, hash: &str) -> RevocationResult<Uuid> {
        self.store
            .find_by_token_hash(hash)
            .await?
            .ok_or(RevocationError::TokenNotFound)
    }

    fn issue_pair(&self, grant: &mut Grant, now: DateTime<Utc>) -> IssuedTokens {
        let access_token = generate_opaque_token();
        let refresh_token = generate_opaque_token();
        grant.add_token_pair(
            TokenRecord::issue(
                &access_token,
                TokenKind::AccessToken,
                Duration::seconds(self.config.access_token_lifespan),
                now,
            ),
            Some(TokenRecord::issue(
                &refresh_token,
                TokenKind::RefreshToken,
                Duration::seconds(self.config.refresh_token_lifespan),
                now,
            )),
        );
        IssuedTokens {
            grant_id: grant.id,
            subject: grant.subject.clone(),
            access_token,
            refresh_token: Some(refresh_token),
            expires_in: self.config.access_token_lifespan,
            scope: grant.scope(),
            nonce: grant.nonce.clone(),
        }
    }

    /// Loads the grant, applies `change` and writes it back under
    /// compare-and-swap, retrying on conflicts.
    ///
    /// A grant found or left without live tokens is removed afterwards.
    /// Nothing can race the removal: new tokens are only issued against a
    /// live code or refresh token.
    async fn update<T, F>(&self, grant_id: Uuid, mut change: F) -> RevocationResult<T>
    where
        F: FnMut(&mut Grant) -> Step<T> + Send,
        T: Send,
    {
        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let mut grant = self
                .store
                .load(grant_id)
                .await?
                .ok_or(RevocationError::TokenNotFound)?;
            let (outcome, commit) = match change(&mut grant) {
                Step::Keep(value) => (Ok(value), false),
                Step::Reject(e) => (Err(e), false),
                Step::Commit(value) => (Ok(value), true),
                Step::CommitAndReject(e) => (Err(e), true),
            };
            let now = Utc::now();
            if commit {
                let pruned = grant.prune(now);
                let spent = !grant.has_live_tokens(now);
                if !self.store.compare_and_swap(grant).await? {
                    debug!(%grant_id, attempt, "grant changed concurrently, retrying");
                    continue;
                }
                if pruned > 0 {
                    debug!(%grant_id, pruned, "pruned grant records");
                }
                if spent {
                    self.remove_grant(grant_id).await?;
                }
            } else if !grant.has_live_tokens(now) {
                self.remove_grant(grant_id).await?;
            }
            return outcome;
        }
        Err(RevocationError::Conflict(grant_id))
    }

    async fn remove_grant(&self, grant_id: Uuid) -> RevocationResult<()> {
        self.store.remove(grant_id).await?;
        if let Some(hook) = &self.on_removed {
            hook(grant_id);
        }
        debug!(%grant_id, "removed spent grant");
        Ok(())
    }
}
