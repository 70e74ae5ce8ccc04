//! Cryptographically secure random generation.
//!
//! Content encryption keys and IVs come from the aws-lc-rs system generator.
//! Opaque token values and identifiers use the thread-local `rand` generator.

use aws_lc_rs::rand::{SecureRandom, SystemRandom};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng;
use rand::distr::{Alphanumeric, SampleString};

use crate::error::{CryptoError, CryptoResult};

/// Fills a fresh buffer with `len` bytes from the system generator.
///
/// # Errors
///
/// Returns an error if the system generator fails.
pub fn random_key_bytes(len: usize) -> CryptoResult<Vec<u8>> {
    let mut bytes = vec![0u8; len];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| CryptoError::Encryption("system random generator failed".to_string()))?;
    Ok(bytes)
}

/// Generates a random alphanumeric string.
#[must_use]
pub fn random_alphanumeric(len: usize) -> String {
    let mut rng = rand::rng();
    Alphanumeric.sample_string(&mut rng, len)
}

/// Generates a URL-safe base64-encoded random string from `byte_len` bytes.
#[must_use]
pub fn random_base64url(byte_len: usize) -> String {
    let mut rng = rand::rng();
    let mut bytes = vec![0u8; byte_len];
    rng.fill(&mut bytes[..]);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Generates a token identifier suitable for the `jti` claim.
#[must_use]
pub fn generate_token_id() -> String {
    random_alphanumeric(24)
}

/// Generates an opaque access token, refresh token or authorization code.
///
/// 32 random bytes, base64url encoded.
#[must_use]
pub fn generate_opaque_token() -> String {
    random_base64url(32)
}

/// Generates a random client secret.
#[must_use]
pub fn generate_client_secret(len: usize) -> String {
    random_alphanumeric(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn random_key_bytes_produces_requested_length() {
        assert_eq!(random_key_bytes(16).unwrap().len(), 16);
        assert_eq!(random_key_bytes(64).unwrap().len(), 64);
    }

    #[test]
    fn random_key_bytes_differ() {
        assert_ne!(random_key_bytes(32).unwrap(), random_key_bytes(32).unwrap());
    }

    #[test]
    fn token_id_format() {
        let id = generate_token_id();
        assert_eq!(id.len(), 24);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn opaque_tokens_are_unique_and_url_safe() {
        let tokens: HashSet<String> = (0..1000).map(|_| generate_opaque_token()).collect();
        assert_eq!(tokens.len(), 1000);
        assert!(
            tokens
                .iter()
                .all(|t| t.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        );
    }
}
