//! Authorization grant model.
//!
//! A grant owns every token issued from one authorization event. Tokens are
//! opaque to the grant: only their SHA-256 hash is stored.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use oidc_crypto::{b64_encode, sha256};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Hashes an opaque token for storage and lookup.
#[must_use]
pub fn hash_token(token: &str) -> String {
    b64_encode(&sha256(token.as_bytes()))
}

/// Kind of token held by a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Authorization code, single use.
    AuthorizationCode,
    /// Access token.
    AccessToken,
    /// Refresh token.
    RefreshToken,
}

impl TokenKind {
    /// Returns the OAuth name of the token kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::AccessToken => "access_token",
            Self::RefreshToken => "refresh_token",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token state. There is no way back from `Revoked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenState {
    /// Usable until expiry.
    Active,
    /// Revoked, or consumed for authorization codes.
    Revoked,
}

/// A token issued under a grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// SHA-256 hash of the token, base64url encoded.
    pub hash: String,
    /// Token kind.
    pub kind: TokenKind,
    /// Current state.
    pub state: TokenState,
    /// Issue time.
    pub issued_at: DateTime<Utc>,
    /// Expiry time.
    pub expires_at: DateTime<Utc>,
    /// Hash of the token issued together with this one
    /// (the refresh token for an access token and vice versa).
    pub paired_hash: Option<String>,
}

impl TokenRecord {
    /// Creates an active record for `token` valid for `lifetime`.
    #[must_use]
    pub fn issue(token: &str, kind: TokenKind, lifetime: Duration, now: DateTime<Utc>) -> Self {
        Self {
            hash: hash_token(token),
            kind,
            state: TokenState::Active,
            issued_at: now,
            expires_at: now + lifetime,
            paired_hash: None,
        }
    }

    /// Returns whether the token has expired.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Returns whether the token is revoked.
    #[must_use]
    pub fn is_revoked(&self) -> bool {
        self.state == TokenState::Revoked
    }

    /// Moves the token to `Revoked`. Returns `false` if it already was.
    pub fn revoke(&mut self) -> bool {
        let changed = self.state == TokenState::Active;
        self.state = TokenState::Revoked;
        changed
    }
}

/// Authorization grant with its versioned token set.
///
/// The version is bumped by the store on every successful compare-and-swap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    /// Grant id.
    pub id: Uuid,
    /// Client the grant was issued to.
    pub client_id: String,
    /// Subject (end-user) identifier.
    pub subject: String,
    /// Granted scopes.
    pub scopes: Vec<String>,
    /// Nonce from the authorization request.
    pub nonce: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Record version for compare-and-swap.
    pub version: u64,
    /// Set once a refresh token was revoked; no further refresh is allowed.
    pub refresh_blocked: bool,
    /// Tokens issued under this grant.
    pub tokens: Vec<TokenRecord>,
}

impl Grant {
    /// Creates an empty grant.
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        subject: impl Into<String>,
        scopes: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            client_id: client_id.into(),
            subject: subject.into(),
            scopes: scopes.into_iter().map(Into::into).collect(),
            nonce: None,
            created_at: Utc::now(),
            version: 0,
            refresh_blocked: false,
            tokens: Vec::new(),
        }
    }

    /// Sets the nonce.
    #[must_use]
    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// Returns the space-delimited scope string.
    #[must_use]
    pub fn scope(&self) -> String {
        self.scopes.join(" ")
    }

    /// Finds a token record by hash.
    #[must_use]
    pub fn token(&self, hash: &str) -> Option<&TokenRecord> {
        self.tokens.iter().find(|record| record.hash == hash)
    }

    /// Finds a token record by hash for update.
    pub fn token_mut(&mut self, hash: &str) -> Option<&mut TokenRecord> {
        self.tokens.iter_mut().find(|record| record.hash == hash)
    }

    /// Adds an access token and, optionally, its paired refresh token.
    pub fn add_token_pair(&mut self, mut access: TokenRecord, refresh: Option<TokenRecord>) {
        if let Some(mut refresh) = refresh {
            access.paired_hash = Some(refresh.hash.clone());
            refresh.paired_hash = Some(access.hash.clone());
            self.tokens.push(access);
            self.tokens.push(refresh);
        } else {
            self.tokens.push(access);
        }
    }

    /// Applies the revocation cascade for the token with `hash`.
    ///
    /// - refresh token: every access and refresh token of the grant is
    ///   revoked and the grant can no longer be refreshed
    /// - access token: that token and its paired refresh token only
    /// - authorization code or unknown hash: nothing
    ///
    /// Returns the number of tokens that changed state. Revoking twice is a
    /// no-op returning zero.
    pub fn revoke_token(&mut self, hash: &str) -> usize {
        let Some((kind, paired)) = self
            .token(hash)
            .map(|record| (record.kind, record.paired_hash.clone()))
        else {
            return 0;
        };
        match kind {
            TokenKind::RefreshToken => {
                self.refresh_blocked = true;
                self.tokens
                    .iter_mut()
                    .filter(|record| record.kind != TokenKind::AuthorizationCode)
                    .map(TokenRecord::revoke)
                    .filter(|changed| *changed)
                    .count()
            }
            TokenKind::AccessToken => {
                let mut changed = usize::from(self.token_mut(hash).is_some_and(TokenRecord::revoke));
                if let Some(paired) = paired
                    && let Some(refresh) = self.token_mut(&paired)
                    && refresh.revoke()
                {
                    changed += 1;
                }
                changed
            }
            TokenKind::AuthorizationCode => 0,
        }
    }

    /// Revokes every token of the grant and blocks refresh.
    pub fn revoke_all(&mut self) -> usize {
        self.refresh_blocked = true;
        self.tokens
            .iter_mut()
            .map(TokenRecord::revoke)
            .filter(|changed| *changed)
            .count()
    }

    /// Returns whether any token of the grant, of any kind, is still usable.
    ///
    /// A grant without live tokens can never issue another one.
    #[must_use]
    pub fn has_live_tokens(&self, now: DateTime<Utc>) -> bool {
        self.tokens
            .iter()
            .any(|record| !record.is_revoked() && !record.is_expired(now))
    }

    /// Drops records that no longer need to be looked up:
    ///
    /// - every expired record, whatever its state
    /// - revoked refresh tokens except the most recently issued one
    ///
    /// The latest retired refresh token stays so that revoking it after a
    /// racing rotation still reaches the rotated token. Revoked codes and
    /// access tokens stay until they expire.
    ///
    /// Returns the number of records dropped.
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let latest_retired = self
            .tokens
            .iter()
            .rev()
            .find(|record| record.kind == TokenKind::RefreshToken && record.is_revoked())
            .map(|record| record.hash.clone());
        let before = self.tokens.len();
        self.tokens.retain(|record| {
            !record.is_expired(now)
                && (record.kind != TokenKind::RefreshToken
                    || !record.is_revoked()
                    || latest_retired.as_deref() == Some(record.hash.as_str()))
        });
        before - self.tokens.len()
    }

    /// Returns the number of active, unexpired tokens of `kind`.
    #[must_use]
    pub fn active_count(&self, kind: TokenKind, now: DateTime<Utc>) -> usize {
        self.tokens
            .iter()
            .filter(|record| record.kind == kind && !record.is_revoked() && !record.is_expired(now))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn grant_with_two_pairs() -> (Grant, [String; 4]) {
        let now = Utc::now();
        let mut grant = Grant::new("client", "alice", ["openid"]);
        let hour = Duration::hours(1);
        grant.add_token_pair(
            TokenRecord::issue("at1", TokenKind::AccessToken, hour, now),
            Some(TokenRecord::issue("rt1", TokenKind::RefreshToken, hour, now)),
        );
        grant.add_token_pair(
            TokenRecord::issue("at2", TokenKind::AccessToken, hour, now),
            Some(TokenRecord::issue("rt2", TokenKind::RefreshToken, hour, now)),
        );
        let hashes = ["at1", "rt1", "at2", "rt2"].map(hash_token);
        (grant, hashes)
    }

    #[test]
    fn hash_is_stable_and_not_the_token() {
        assert_eq!(hash_token("abc"), hash_token("abc"));
        assert_ne!(hash_token("abc"), "abc");
        assert_eq!(hash_token("abc").len(), 43);
    }

    #[test]
    fn refresh_revocation_cascades_to_all_tokens() {
        let (mut grant, [at1, rt1, at2, rt2]) = grant_with_two_pairs();
        assert_eq!(grant.revoke_token(&rt1), 4);
        assert!(grant.refresh_blocked);
        for hash in [at1, rt1, at2, rt2] {
            assert!(grant.token(&hash).unwrap().is_revoked());
        }
    }

    #[test]
    fn access_revocation_revokes_only_its_pair() {
        let (mut grant, [at1, rt1, at2, rt2]) = grant_with_two_pairs();
        assert_eq!(grant.revoke_token(&at1), 2);
        assert!(grant.token(&at1).unwrap().is_revoked());
        assert!(grant.token(&rt1).unwrap().is_revoked());
        assert!(!grant.token(&at2).unwrap().is_revoked());
        assert!(!grant.token(&rt2).unwrap().is_revoked());
        assert!(!grant.refresh_blocked);
    }

    #[test]
    fn revoking_twice_changes_nothing() {
        let (mut grant, [at1, ..]) = grant_with_two_pairs();
        grant.revoke_token(&at1);
        assert_eq!(grant.revoke_token(&at1), 0);
        assert_eq!(grant.revoke_token("unknown"), 0);
    }

    #[test]
    fn pairing_links_both_directions() {
        let (grant, [at1, rt1, ..]) = grant_with_two_pairs();
        assert_eq!(grant.token(&at1).unwrap().paired_hash.as_deref(), Some(rt1.as_str()));
        assert_eq!(grant.token(&rt1).unwrap().paired_hash.as_deref(), Some(at1.as_str()));
    }

    #[test]
    fn active_count_ignores_revoked_and_expired() {
        let now = Utc::now();
        let (mut grant, [at1, ..]) = grant_with_two_pairs();
        grant.tokens.push(TokenRecord::issue(
            "old",
            TokenKind::AccessToken,
            Duration::seconds(-1),
            now,
        ));
        grant.revoke_token(&at1);
        assert_eq!(grant.active_count(TokenKind::AccessToken, now), 1);
    }

    #[test]
    fn prune_keeps_only_the_latest_retired_refresh_token() {
        let now = Utc::now();
        let (mut grant, [at1, rt1, at2, rt2]) = grant_with_two_pairs();
        grant.tokens.push(TokenRecord::issue(
            "stale",
            TokenKind::AccessToken,
            Duration::seconds(-1),
            now,
        ));
        grant.token_mut(&rt1).unwrap().revoke();
        grant.token_mut(&rt2).unwrap().revoke();

        assert_eq!(grant.prune(now), 2);
        assert!(grant.token(&rt1).is_none());
        assert!(grant.token(&hash_token("stale")).is_none());
        assert!(grant.token(&rt2).unwrap().is_revoked());
        assert!(grant.token(&at1).is_some());
        assert!(grant.token(&at2).is_some());
        assert_eq!(grant.prune(now), 0);
    }

    #[test]
    fn revoked_code_is_kept_for_reuse_detection() {
        let now = Utc::now();
        let mut grant = Grant::new("client", "alice", ["openid"]);
        let mut code = TokenRecord::issue("code", TokenKind::AuthorizationCode, Duration::minutes(1), now);
        code.revoke();
        grant.tokens.push(code);

        assert_eq!(grant.prune(now), 0);
        assert!(grant.token(&hash_token("code")).is_some());
        assert!(!grant.has_live_tokens(now));
    }

    #[test]
    fn live_tokens_follow_state_and_expiry() {
        let now = Utc::now();
        let (mut grant, [_, rt1, ..]) = grant_with_two_pairs();
        assert!(grant.has_live_tokens(now));
        assert!(!grant.has_live_tokens(now + Duration::hours(2)));
        grant.revoke_token(&rt1);
        assert!(!grant.has_live_tokens(now));
    }
}
