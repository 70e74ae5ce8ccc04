//! # oidc-keystore
//!
//! Key material for signing, verifying, encrypting and decrypting OpenID
//! Connect objects.
//!
//! ## Sources
//!
//! - [`KeyStore`] - password-protected file of private keys with expiry
//! - [`JwksClient`] - remote JWK Set retrieval
//! - shared client secret for symmetric algorithms
//!
//! [`DefaultKeyProvider`] combines them behind the [`KeyMaterialProvider`]
//! trait.
//!
//! ## Example
//!
//! ```ignore
//! use oidc_keystore::{DefaultKeyProvider, KeyMaterialProvider};
//! use oidc_crypto::SignatureAlgorithm;
//!
//! async fn signing_key(provider: &DefaultKeyProvider) -> oidc_keystore::KeyResult<()> {
//!     let key = provider.resolve_signing_key(SignatureAlgorithm::Rs256, None).await?;
//!     println!("signing with {:?}", key.kid);
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod jwks_client;
pub mod keystore;
pub mod provider;

pub use error::{KeyError, KeyResult};
pub use jwks_client::JwksClient;
pub use keystore::{KeyAlgorithm, KeyEntry, KeyStore};
pub use provider::{DefaultKeyProvider, KeyMaterialProvider, ResolvedKey};
