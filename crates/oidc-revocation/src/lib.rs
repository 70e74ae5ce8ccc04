//! # oidc-revocation
//!
//! Authorization grants and the token revocation cascade.
//!
//! A [`Grant`] owns the authorization code, access tokens and refresh tokens
//! issued from one authorization event. [`RevocationService`] issues and
//! validates those tokens and applies the cascade when one is revoked:
//!
//! - revoking a refresh token revokes every access and refresh token of the
//!   grant and blocks further refresh
//! - revoking an access token revokes it and its paired refresh token only
//! - revoking an unknown or already revoked token succeeds silently
//!
//! Grant updates go through [`GrantStore::compare_and_swap`] on a versioned
//! record, which makes revoke and refresh atomic per grant. Records that can
//! no longer matter are pruned on each update, and a grant without live
//! tokens is removed.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod grant;
pub mod service;
pub mod store;

pub use error::{RevocationError, RevocationResult};
pub use grant::{Grant, TokenKind, TokenRecord, TokenState, hash_token};
pub use service::{
    AccessTokenInfo, AuthorizationCode, GrantRemovalHook, IssuedTokens, RevocationOutcome,
    RevocationService, TokenTypeHint,
};
pub use store::{GrantStore, InMemoryGrantStore};
