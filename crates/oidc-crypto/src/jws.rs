//! JSON Web Signature (compact serialization).
//!
//! One dispatch function per operation switches on [`SignatureAlgorithm`]:
//! - `HS*` uses HMAC over the shared secret
//! - `RS*` uses RSASSA-PKCS1-v1_5
//! - `PS*` uses RSASSA-PSS with a salt as long as the digest
//! - `ES*` uses ECDSA with fixed-width `r || s` signatures
//!
//! `none` produces an empty signature and verifies only when the caller lists
//! it among the accepted algorithms.

use aws_lc_rs::{
    rand::SystemRandom,
    signature::{
        ECDSA_P256_SHA256_FIXED, ECDSA_P384_SHA384_FIXED, ECDSA_P521_SHA512_FIXED,
        EcdsaVerificationAlgorithm, UnparsedPublicKey,
    },
};
use rsa::{
    RsaPrivateKey, RsaPublicKey, pkcs1v15, pss,
    rand_core::OsRng,
    sha2::{Sha256, Sha384, Sha512},
    signature::{RandomizedSigner, SignatureEncoding, Signer, Verifier},
};
use tracing::debug;

use crate::algorithm::{EllipticCurve, HashAlgorithm, KeyFamily, SignatureAlgorithm};
use crate::error::{CryptoError, CryptoResult};
use crate::hash;
use crate::header::{JoseHeader, b64_decode, b64_encode};
use crate::keys::{EcKey, KeyMaterial};

/// Signs a JWS signing input.
///
/// `key` may be `None` only for `alg=none`.
///
/// # Errors
///
/// Returns [`CryptoError::UnsupportedAlgorithm`] if the key does not belong to
/// the family the algorithm needs, or [`CryptoError::Signing`] on failure.
pub fn sign(
    signing_input: &[u8],
    alg: SignatureAlgorithm,
    key: Option<&KeyMaterial>,
) -> CryptoResult<Vec<u8>> {
    if alg == SignatureAlgorithm::None {
        return Ok(Vec::new());
    }
    let key = key.ok_or_else(|| CryptoError::InvalidKey(format!("{alg} requires a key")))?;
    check_family(alg, key)?;

    match (key, alg.hash_algorithm()) {
        (KeyMaterial::Symmetric(secret), Some(hash_alg)) => {
            if secret.is_empty() {
                return Err(CryptoError::InvalidKey("shared secret is empty".to_string()));
            }
            Ok(hash::hmac_sign(hash_alg, secret.as_bytes(), signing_input))
        }
        (KeyMaterial::Rsa(rsa), Some(hash_alg)) => {
            let private = rsa.private_key()?;
            if alg.is_pss() {
                pss_sign(private, hash_alg, signing_input)
            } else {
                pkcs1_sign(private, hash_alg, signing_input)
            }
        }
        (KeyMaterial::Ec(ec), Some(_)) => ecdsa_sign(ec, alg, signing_input),
        (_, None) => Err(CryptoError::UnsupportedAlgorithm(alg.to_string())),
    }
}

/// Verifies a signature over a JWS signing input.
///
/// # Errors
///
/// Returns [`CryptoError::SignatureInvalid`] on any mismatch and
/// [`CryptoError::UnsupportedAlgorithm`] on a key family mismatch.
pub fn verify(
    signing_input: &[u8],
    signature: &[u8],
    alg: SignatureAlgorithm,
    key: Option<&KeyMaterial>,
) -> CryptoResult<()> {
    if alg == SignatureAlgorithm::None {
        return if signature.is_empty() {
            Ok(())
        } else {
            Err(CryptoError::SignatureInvalid)
        };
    }
    let key = key.ok_or_else(|| CryptoError::InvalidKey(format!("{alg} requires a key")))?;
    check_family(alg, key)?;

    let valid = match (key, alg.hash_algorithm()) {
        (KeyMaterial::Symmetric(secret), Some(hash_alg)) => {
            let expected = hash::hmac_sign(hash_alg, secret.as_bytes(), signing_input);
            hash::constant_time_eq(&expected, signature)
        }
        (KeyMaterial::Rsa(rsa), Some(hash_alg)) => {
            if alg.is_pss() {
                pss_verify(rsa.public_key(), hash_alg, signing_input, signature)
            } else {
                pkcs1_verify(rsa.public_key(), hash_alg, signing_input, signature)
            }
        }
        (KeyMaterial::Ec(ec), Some(_)) => ecdsa_verify(ec, signing_input, signature),
        (_, None) => false,
    };

    if valid {
        Ok(())
    } else {
        Err(CryptoError::SignatureInvalid)
    }
}

/// Builds a compact JWS from a header and payload.
///
/// # Errors
///
/// Returns an error if the header has no usable `alg` or signing fails.
pub fn encode(header: &JoseHeader, payload: &[u8], key: Option<&KeyMaterial>) -> CryptoResult<String> {
    let alg = header.signature_algorithm()?;
    let signing_input = format!("{}.{}", header.encode()?, b64_encode(payload));
    let signature = sign(signing_input.as_bytes(), alg, key)?;
    Ok(format!("{signing_input}.{}", b64_encode(&signature)))
}

/// A parsed, not yet verified, compact JWS.
#[derive(Debug, Clone)]
pub struct CompactJws {
    header: JoseHeader,
    signing_input: String,
    payload: Vec<u8>,
    signature: Vec<u8>,
}

impl CompactJws {
    /// Parses a three-segment compact JWS.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::MalformedToken`] for a wrong segment count or an
    /// undecodable segment.
    pub fn parse(token: &str) -> CryptoResult<Self> {
        let segments: Vec<&str> = token.split('.').collect();
        if segments.len() != 3 {
            return Err(CryptoError::MalformedToken(format!(
                "JWS must have 3 segments, found {}",
                segments.len()
            )));
        }
        Self::from_segments(segments[0], segments[1], segments[2])
    }

    /// Parses an unsecured `header.payload` token (no signature segment).
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::MalformedToken`] unless the token has exactly two
    /// segments.
    pub fn parse_unsecured(token: &str) -> CryptoResult<Self> {
        let segments: Vec<&str> = token.split('.').collect();
        if segments.len() != 2 {
            return Err(CryptoError::MalformedToken(format!(
                "unsecured JWS must have 2 segments, found {}",
                segments.len()
            )));
        }
        Self::from_segments(segments[0], segments[1], "")
    }

    fn from_segments(header_b64: &str, payload_b64: &str, signature_b64: &str) -> CryptoResult<Self> {
        let header = JoseHeader::decode(header_b64)?;
        if header.is_encrypted() {
            return Err(CryptoError::MalformedToken("JWS header carries enc".to_string()));
        }
        Ok(Self {
            header,
            signing_input: format!("{header_b64}.{payload_b64}"),
            payload: b64_decode(payload_b64, "payload")?,
            signature: b64_decode(signature_b64, "signature")?,
        })
    }

    /// Returns the protected header.
    #[must_use]
    pub const fn header(&self) -> &JoseHeader {
        &self.header
    }

    /// Returns the payload bytes. They are untrusted until [`Self::verify`] succeeds.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Returns the `kid` header, if any.
    #[must_use]
    pub fn key_id(&self) -> Option<&str> {
        self.header.kid.as_deref()
    }

    /// Returns the header algorithm if present and recognized.
    #[must_use]
    pub fn algorithm(&self) -> Option<SignatureAlgorithm> {
        self.header.signature_algorithm().ok()
    }

    /// Verifies the signature with `key`, accepting only algorithms in `accepted`.
    ///
    /// `none` must appear in `accepted` to be honoured.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::SignatureInvalid`] when `alg` is absent or
    /// unrecognized or the signature does not match, and
    /// [`CryptoError::UnsupportedAlgorithm`] when `alg` is not accepted.
    pub fn verify(
        &self,
        key: Option<&KeyMaterial>,
        accepted: &[SignatureAlgorithm],
    ) -> CryptoResult<()> {
        let Some(alg) = self.algorithm() else {
            debug!(alg = ?self.header.alg, "JWS header alg missing or unknown");
            return Err(CryptoError::SignatureInvalid);
        };
        if !accepted.contains(&alg) {
            return Err(CryptoError::UnsupportedAlgorithm(alg.to_string()));
        }
        if alg != SignatureAlgorithm::None && self.signature.is_empty() {
            return Err(CryptoError::SignatureInvalid);
        }
        verify(self.signing_input.as_bytes(), &self.signature, alg, key)
    }

    /// Returns whether the signature verifies. Any failure yields `false`.
    #[must_use]
    pub fn validate(&self, key: Option<&KeyMaterial>, accepted: &[SignatureAlgorithm]) -> bool {
        self.verify(key, accepted).is_ok()
    }
}

fn check_family(alg: SignatureAlgorithm, key: &KeyMaterial) -> CryptoResult<()> {
    let expected = alg.key_family();
    if expected != key.family() {
        return Err(CryptoError::UnsupportedAlgorithm(format!(
            "{alg} cannot be used with {} key material",
            family_name(key.family())
        )));
    }
    if let (Some(curve), KeyMaterial::Ec(ec)) = (alg.curve(), key)
        && curve != ec.curve()
    {
        return Err(CryptoError::UnsupportedAlgorithm(format!(
            "{alg} requires {} but key is on {}",
            curve.name(),
            ec.curve().name()
        )));
    }
    Ok(())
}

const fn family_name(family: KeyFamily) -> &'static str {
    match family {
        KeyFamily::None => "no",
        KeyFamily::Symmetric => "symmetric",
        KeyFamily::Rsa => "RSA",
        KeyFamily::Ec => "EC",
    }
}

fn pkcs1_sign(key: &RsaPrivateKey, hash_alg: HashAlgorithm, msg: &[u8]) -> CryptoResult<Vec<u8>> {
    let signature = match hash_alg {
        HashAlgorithm::Sha256 => pkcs1v15::SigningKey::<Sha256>::new(key.clone())
            .try_sign(msg)
            .map(|s| s.to_vec()),
        HashAlgorithm::Sha384 => pkcs1v15::SigningKey::<Sha384>::new(key.clone())
            .try_sign(msg)
            .map(|s| s.to_vec()),
        HashAlgorithm::Sha512 => pkcs1v15::SigningKey::<Sha512>::new(key.clone())
            .try_sign(msg)
            .map(|s| s.to_vec()),
    };
    signature.map_err(|e| CryptoError::Signing(e.to_string()))
}

fn pss_sign(key: &RsaPrivateKey, hash_alg: HashAlgorithm, msg: &[u8]) -> CryptoResult<Vec<u8>> {
    let mut rng = OsRng;
    let signature = match hash_alg {
        HashAlgorithm::Sha256 => pss::BlindedSigningKey::<Sha256>::new(key.clone())
            .try_sign_with_rng(&mut rng, msg)
            .map(|s| s.to_vec()),
        HashAlgorithm::Sha384 => pss::BlindedSigningKey::<Sha384>::new(key.clone())
            .try_sign_with_rng(&mut rng, msg)
            .map(|s| s.to_vec()),
        HashAlgorithm::Sha512 => pss::BlindedSigningKey::<Sha512>::new(key.clone())
            .try_sign_with_rng(&mut rng, msg)
            .map(|s| s.to_vec()),
    };
    signature.map_err(|e| CryptoError::Signing(e.to_string()))
}

fn pkcs1_verify(key: &RsaPublicKey, hash_alg: HashAlgorithm, msg: &[u8], sig: &[u8]) -> bool {
    let Ok(signature) = pkcs1v15::Signature::try_from(sig) else {
        return false;
    };
    match hash_alg {
        HashAlgorithm::Sha256 => pkcs1v15::VerifyingKey::<Sha256>::new(key.clone())
            .verify(msg, &signature)
            .is_ok(),
        HashAlgorithm::Sha384 => pkcs1v15::VerifyingKey::<Sha384>::new(key.clone())
            .verify(msg, &signature)
            .is_ok(),
        HashAlgorithm::Sha512 => pkcs1v15::VerifyingKey::<Sha512>::new(key.clone())
            .verify(msg, &signature)
            .is_ok(),
    }
}

fn pss_verify(key: &RsaPublicKey, hash_alg: HashAlgorithm, msg: &[u8], sig: &[u8]) -> bool {
    let Ok(signature) = pss::Signature::try_from(sig) else {
        return false;
    };
    match hash_alg {
        HashAlgorithm::Sha256 => pss::VerifyingKey::<Sha256>::new(key.clone())
            .verify(msg, &signature)
            .is_ok(),
        HashAlgorithm::Sha384 => pss::VerifyingKey::<Sha384>::new(key.clone())
            .verify(msg, &signature)
            .is_ok(),
        HashAlgorithm::Sha512 => pss::VerifyingKey::<Sha512>::new(key.clone())
            .verify(msg, &signature)
            .is_ok(),
    }
}

fn ecdsa_verification_algorithm(curve: EllipticCurve) -> &'static EcdsaVerificationAlgorithm {
    match curve {
        EllipticCurve::P256 => &ECDSA_P256_SHA256_FIXED,
        EllipticCurve::P384 => &ECDSA_P384_SHA384_FIXED,
        EllipticCurve::P521 => &ECDSA_P521_SHA512_FIXED,
    }
}

fn ecdsa_sign(key: &EcKey, alg: SignatureAlgorithm, msg: &[u8]) -> CryptoResult<Vec<u8>> {
    let key_pair = key.key_pair()?;
    let signature = key_pair
        .sign(&SystemRandom::new(), msg)
        .map_err(|_| CryptoError::Signing(format!("{alg} signing failed")))?;
    Ok(signature.as_ref().to_vec())
}

fn ecdsa_verify(key: &EcKey, msg: &[u8], sig: &[u8]) -> bool {
    if sig.len() != 2 * key.curve().coordinate_len() {
        return false;
    }
    UnparsedPublicKey::new(ecdsa_verification_algorithm(key.curve()), key.public_point())
        .verify(msg, sig)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::RsaKey;

    const HMAC_ALGS: [SignatureAlgorithm; 3] = [
        SignatureAlgorithm::Hs256,
        SignatureAlgorithm::Hs384,
        SignatureAlgorithm::Hs512,
    ];

    fn no_none() -> Vec<SignatureAlgorithm> {
        SignatureAlgorithm::ALL
            .into_iter()
            .filter(|alg| *alg != SignatureAlgorithm::None)
            .collect()
    }

    fn token(alg: SignatureAlgorithm, key: Option<&KeyMaterial>) -> String {
        let header = JoseHeader::signed(alg);
        encode(&header, br#"{"iss":"client","nonce":"n-0S6_WzA2Mj"}"#, key).unwrap()
    }

    #[test]
    fn hmac_round_trip_for_every_width() {
        let key = KeyMaterial::from_secret("client-secret");
        for alg in HMAC_ALGS {
            let jws = CompactJws::parse(&token(alg, Some(&key))).unwrap();
            assert!(jws.validate(Some(&key), &no_none()), "{alg}");
            assert!(!jws.validate(Some(&KeyMaterial::from_secret("other")), &no_none()), "{alg}");
        }
    }

    #[test]
    fn hmac_tampered_payload_fails() {
        let key = KeyMaterial::from_secret("client-secret");
        let compact = token(SignatureAlgorithm::Hs256, Some(&key));
        let mut parts: Vec<String> = compact.split('.').map(str::to_string).collect();
        parts[1] = b64_encode(br#"{"iss":"attacker"}"#);
        let jws = CompactJws::parse(&parts.join(".")).unwrap();
        assert!(matches!(
            jws.verify(Some(&key), &no_none()),
            Err(CryptoError::SignatureInvalid)
        ));
    }

    #[test]
    fn rsa_round_trip_pkcs1_and_pss() {
        let key = KeyMaterial::Rsa(RsaKey::generate(2048).unwrap());
        let other = KeyMaterial::Rsa(RsaKey::generate(2048).unwrap());
        for alg in [
            SignatureAlgorithm::Rs256,
            SignatureAlgorithm::Rs384,
            SignatureAlgorithm::Rs512,
            SignatureAlgorithm::Ps256,
            SignatureAlgorithm::Ps384,
            SignatureAlgorithm::Ps512,
        ] {
            let jws = CompactJws::parse(&token(alg, Some(&key))).unwrap();
            assert!(jws.validate(Some(&key.to_public()), &no_none()), "{alg}");
            assert!(!jws.validate(Some(&other.to_public()), &no_none()), "{alg}");
        }
    }

    #[test]
    fn ecdsa_signatures_are_fixed_width() {
        for (alg, curve) in [
            (SignatureAlgorithm::Es256, EllipticCurve::P256),
            (SignatureAlgorithm::Es384, EllipticCurve::P384),
            (SignatureAlgorithm::Es512, EllipticCurve::P521),
        ] {
            let key = KeyMaterial::Ec(EcKey::generate(curve).unwrap());
            let signature = sign(b"input", alg, Some(&key)).unwrap();
            assert_eq!(signature.len(), 2 * curve.coordinate_len(), "{alg}");
            assert!(verify(b"input", &signature, alg, Some(&key.to_public())).is_ok());

            let other = KeyMaterial::Ec(EcKey::generate(curve).unwrap());
            assert!(verify(b"input", &signature, alg, Some(&other)).is_err());
        }
    }

    #[test]
    fn curve_mismatch_is_unsupported() {
        let key = KeyMaterial::Ec(EcKey::generate(EllipticCurve::P384).unwrap());
        assert!(matches!(
            sign(b"input", SignatureAlgorithm::Es256, Some(&key)),
            Err(CryptoError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn family_mismatch_is_unsupported() {
        let key = KeyMaterial::Rsa(RsaKey::generate(2048).unwrap());
        assert!(matches!(
            sign(b"input", SignatureAlgorithm::Es256, Some(&key)),
            Err(CryptoError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn none_requires_opt_in() {
        let jws = CompactJws::parse(&token(SignatureAlgorithm::None, None)).unwrap();
        assert!(matches!(
            jws.verify(None, &no_none()),
            Err(CryptoError::UnsupportedAlgorithm(_))
        ));
        assert!(jws.validate(None, &[SignatureAlgorithm::None]));
    }

    #[test]
    fn none_with_signature_is_rejected() {
        let key = KeyMaterial::from_secret("secret");
        let compact = token(SignatureAlgorithm::Hs256, Some(&key));
        let parts: Vec<&str> = compact.split('.').collect();
        let forged = format!(
            "{}.{}.{}",
            JoseHeader::signed(SignatureAlgorithm::None).encode().unwrap(),
            parts[1],
            parts[2]
        );
        let jws = CompactJws::parse(&forged).unwrap();
        assert!(!jws.validate(None, &[SignatureAlgorithm::None]));
    }

    #[test]
    fn missing_or_unknown_alg_fails_validation() {
        let payload = b64_encode(b"{}");
        for header in [r#"{"typ":"JWT"}"#, r#"{"alg":"HS999"}"#] {
            let compact = format!("{}.{payload}.{}", b64_encode(header.as_bytes()), b64_encode(b"sig"));
            let jws = CompactJws::parse(&compact).unwrap();
            assert!(matches!(
                jws.verify(Some(&KeyMaterial::from_secret("s")), &SignatureAlgorithm::ALL),
                Err(CryptoError::SignatureInvalid)
            ));
        }
    }

    #[test]
    fn signed_alg_without_signature_segment_fails() {
        let key = KeyMaterial::from_secret("secret");
        let compact = token(SignatureAlgorithm::Hs256, Some(&key));
        let stripped = compact.rsplit_once('.').unwrap().0.to_string() + ".";
        let jws = CompactJws::parse(&stripped).unwrap();
        assert!(!jws.validate(Some(&key), &no_none()));
    }

    #[test]
    fn wrong_segment_count_is_malformed() {
        assert!(matches!(
            CompactJws::parse("INVALID_OPENID_REQUEST_OBJECT"),
            Err(CryptoError::MalformedToken(_))
        ));
        assert!(matches!(CompactJws::parse("a.b.c.d"), Err(CryptoError::MalformedToken(_))));
    }

    #[test]
    fn unsecured_two_segment_form_parses() {
        let header = JoseHeader::signed(SignatureAlgorithm::None).encode().unwrap();
        let compact = format!("{header}.{}", b64_encode(b"{}"));
        let jws = CompactJws::parse_unsecured(&compact).unwrap();
        assert_eq!(jws.algorithm(), Some(SignatureAlgorithm::None));
        assert!(jws.validate(None, &[SignatureAlgorithm::None]));
    }
}
