//! Digests and MACs.

use aws_lc_rs::{constant_time, digest, hmac};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use crate::algorithm::HashAlgorithm;

fn digest_algorithm(algorithm: HashAlgorithm) -> &'static digest::Algorithm {
    match algorithm {
        HashAlgorithm::Sha256 => &digest::SHA256,
        HashAlgorithm::Sha384 => &digest::SHA384,
        HashAlgorithm::Sha512 => &digest::SHA512,
    }
}

fn hmac_algorithm(algorithm: HashAlgorithm) -> hmac::Algorithm {
    match algorithm {
        HashAlgorithm::Sha256 => hmac::HMAC_SHA256,
        HashAlgorithm::Sha384 => hmac::HMAC_SHA384,
        HashAlgorithm::Sha512 => hmac::HMAC_SHA512,
    }
}

/// Computes a hash of the input data.
#[must_use]
pub fn hash(algorithm: HashAlgorithm, data: &[u8]) -> Vec<u8> {
    digest::digest(digest_algorithm(algorithm), data).as_ref().to_vec()
}

/// Computes a SHA-256 hash of the input data.
#[must_use]
pub fn sha256(data: &[u8]) -> Vec<u8> {
    hash(HashAlgorithm::Sha256, data)
}

/// Computes a SHA-384 hash of the input data.
#[must_use]
pub fn sha384(data: &[u8]) -> Vec<u8> {
    hash(HashAlgorithm::Sha384, data)
}

/// Computes a SHA-512 hash of the input data.
#[must_use]
pub fn sha512(data: &[u8]) -> Vec<u8> {
    hash(HashAlgorithm::Sha512, data)
}

/// Computes an HMAC tag.
#[must_use]
pub fn hmac_sign(algorithm: HashAlgorithm, key: &[u8], data: &[u8]) -> Vec<u8> {
    let key = hmac::Key::new(hmac_algorithm(algorithm), key);
    hmac::sign(&key, data).as_ref().to_vec()
}

/// Verifies a full-width HMAC tag in constant time.
#[must_use]
pub fn hmac_verify(algorithm: HashAlgorithm, key: &[u8], data: &[u8], tag: &[u8]) -> bool {
    let key = hmac::Key::new(hmac_algorithm(algorithm), key);
    hmac::verify(&key, data, tag).is_ok()
}

/// Compares two byte strings in constant time.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    constant_time::verify_slices_are_equal(a, b).is_ok()
}

/// Computes the left-half hash used by `at_hash`, `c_hash` and `s_hash`.
///
/// The value is hashed with the hash function of the ID Token's `alg`, the
/// left-most half of the digest is kept and base64url encoded.
#[must_use]
pub fn left_half_hash(algorithm: HashAlgorithm, value: &str) -> String {
    let digest = hash(algorithm, value.as_bytes());
    URL_SAFE_NO_PAD.encode(&digest[..digest.len() / 2])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn digests_have_expected_lengths() {
        assert_eq!(sha256(b"test").len(), 32);
        assert_eq!(sha384(b"test").len(), 48);
        assert_eq!(sha512(b"test").len(), 64);
    }

    #[test]
    fn hmac_round_trip() {
        let tag = hmac_sign(HashAlgorithm::Sha384, b"secret", b"payload");
        assert_eq!(tag.len(), 48);
        assert!(hmac_verify(HashAlgorithm::Sha384, b"secret", b"payload", &tag));
        assert!(!hmac_verify(HashAlgorithm::Sha384, b"other", b"payload", &tag));
    }

    #[test]
    fn at_hash_matches_oidc_core_example() {
        // Example values from OpenID Connect Core 1.0, Appendix A
        let at_hash = left_half_hash(HashAlgorithm::Sha256, "jHkWEdUXMU1BwAsC4vtUsZwnNvTIxEl0z9K3vx5KF0Y");
        assert_eq!(at_hash, "77QmUPtjPfzWtF2AnpK9RQ");
    }

    #[test]
    fn constant_time_eq_detects_differences() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
    }
}
