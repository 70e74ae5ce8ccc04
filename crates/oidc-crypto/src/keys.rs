//! Key material for signing, verification, encryption and decryption.
//!
//! A key is one of three shapes:
//! - a symmetric secret (client secret or shared key, UTF-8 bytes)
//! - an RSA public key with an optional private half
//! - an EC public point with an optional private half
//!
//! RSA operations use the RustCrypto `rsa` crate. EC operations use aws-lc-rs.

use std::fmt;

use aws_lc_rs::{
    rand::SystemRandom,
    signature::{
        EcdsaKeyPair, EcdsaSigningAlgorithm, KeyPair, ECDSA_P256_SHA256_FIXED_SIGNING,
        ECDSA_P384_SHA384_FIXED_SIGNING, ECDSA_P521_SHA512_FIXED_SIGNING,
    },
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rsa::{
    BigUint, RsaPrivateKey, RsaPublicKey,
    pkcs8::{DecodePrivateKey, EncodePrivateKey},
    rand_core::OsRng,
    traits::PublicKeyParts,
};

use crate::algorithm::{EllipticCurve, HashAlgorithm, KeyFamily};
use crate::error::{CryptoError, CryptoResult};
use crate::hash;

/// Minimum RSA modulus size accepted for new and imported keys.
pub const MIN_RSA_BITS: usize = 2048;

/// Key material resolved for one JOSE operation.
#[derive(Clone)]
pub enum KeyMaterial {
    /// Shared secret.
    Symmetric(SymmetricKey),
    /// RSA key.
    Rsa(RsaKey),
    /// Elliptic curve key.
    Ec(EcKey),
}

impl KeyMaterial {
    /// Creates symmetric key material from a client secret.
    #[must_use]
    pub fn from_secret(secret: &str) -> Self {
        Self::Symmetric(SymmetricKey::from_secret(secret))
    }

    /// Returns the key family.
    #[must_use]
    pub const fn family(&self) -> KeyFamily {
        match self {
            Self::Symmetric(_) => KeyFamily::Symmetric,
            Self::Rsa(_) => KeyFamily::Rsa,
            Self::Ec(_) => KeyFamily::Ec,
        }
    }

    /// Returns whether the private half (or the secret) is available.
    #[must_use]
    pub const fn has_private(&self) -> bool {
        match self {
            Self::Symmetric(_) => true,
            Self::Rsa(key) => key.private.is_some(),
            Self::Ec(key) => key.private.is_some(),
        }
    }

    /// Returns a copy with any private half removed.
    ///
    /// Symmetric keys have no public form and are returned unchanged.
    #[must_use]
    pub fn to_public(&self) -> Self {
        match self {
            Self::Symmetric(key) => Self::Symmetric(key.clone()),
            Self::Rsa(key) => Self::Rsa(key.to_public()),
            Self::Ec(key) => Self::Ec(key.to_public()),
        }
    }

    /// Derives a key id from the public part of the key.
    ///
    /// Symmetric keys hash the secret itself, so the id never reveals it.
    #[must_use]
    pub fn derive_key_id(&self) -> String {
        match self {
            Self::Symmetric(key) => generate_key_id(key.as_bytes()),
            Self::Rsa(key) => {
                let mut material = key.modulus();
                material.extend_from_slice(&key.exponent());
                generate_key_id(&material)
            }
            Self::Ec(key) => generate_key_id(key.public_point()),
        }
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Symmetric(key) => f.debug_tuple("Symmetric").field(key).finish(),
            Self::Rsa(key) => f
                .debug_struct("Rsa")
                .field("bits", &key.bits())
                .field("private", &key.private.is_some())
                .finish(),
            Self::Ec(key) => f
                .debug_struct("Ec")
                .field("curve", &key.curve)
                .field("private", &key.private.is_some())
                .finish(),
        }
    }
}

/// Shared secret bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct SymmetricKey(Vec<u8>);

impl SymmetricKey {
    /// Wraps raw key bytes.
    #[must_use]
    pub const fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Uses the UTF-8 bytes of a client secret as the key.
    #[must_use]
    pub fn from_secret(secret: &str) -> Self {
        Self(secret.as_bytes().to_vec())
    }

    /// Returns the raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the key length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether the key is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Derives a key of exactly `len` bytes.
    ///
    /// A secret already of that length is used verbatim. Otherwise the secret
    /// is hashed with SHA-256 (SHA-512 above 32 bytes) and truncated.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty secret or a length above 64 bytes.
    pub fn derive(&self, len: usize) -> CryptoResult<Vec<u8>> {
        if self.0.is_empty() {
            return Err(CryptoError::InvalidKey("shared secret is empty".to_string()));
        }
        if self.0.len() == len {
            return Ok(self.0.clone());
        }
        let digest = match len {
            0..=32 => hash::hash(HashAlgorithm::Sha256, &self.0),
            33..=64 => hash::hash(HashAlgorithm::Sha512, &self.0),
            _ => {
                return Err(CryptoError::InvalidKey(format!(
                    "cannot derive a {len}-byte key from a shared secret"
                )));
            }
        };
        Ok(digest[..len].to_vec())
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SymmetricKey({} bytes)", self.0.len())
    }
}

/// RSA public key with an optional private half.
#[derive(Clone)]
pub struct RsaKey {
    public: RsaPublicKey,
    private: Option<RsaPrivateKey>,
}

impl RsaKey {
    /// Generates a new RSA key pair.
    ///
    /// # Errors
    ///
    /// Returns an error if `bits` is below [`MIN_RSA_BITS`] or generation fails.
    pub fn generate(bits: usize) -> CryptoResult<Self> {
        if bits < MIN_RSA_BITS {
            return Err(CryptoError::InvalidKey(format!(
                "RSA key size {bits} is below the minimum of {MIN_RSA_BITS} bits"
            )));
        }
        let private = RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|e| CryptoError::InvalidKey(format!("RSA key generation failed: {e}")))?;
        Ok(Self::from_private(private))
    }

    /// Wraps an RSA private key.
    #[must_use]
    pub fn from_private(private: RsaPrivateKey) -> Self {
        Self {
            public: private.to_public_key(),
            private: Some(private),
        }
    }

    /// Loads an RSA private key from PKCS#8 DER.
    ///
    /// # Errors
    ///
    /// Returns an error if the DER is not a valid RSA PKCS#8 key.
    pub fn from_pkcs8_der(der: &[u8]) -> CryptoResult<Self> {
        let private = RsaPrivateKey::from_pkcs8_der(der)
            .map_err(|e| CryptoError::InvalidKey(format!("invalid RSA PKCS#8 key: {e}")))?;
        Ok(Self::from_private(private))
    }

    /// Builds an RSA public key from its big-endian modulus and exponent.
    ///
    /// # Errors
    ///
    /// Returns an error if the components do not form a valid key.
    pub fn from_components(modulus: &[u8], exponent: &[u8]) -> CryptoResult<Self> {
        let public = RsaPublicKey::new(
            BigUint::from_bytes_be(modulus),
            BigUint::from_bytes_be(exponent),
        )
        .map_err(|e| CryptoError::InvalidKey(format!("invalid RSA public key: {e}")))?;
        Ok(Self {
            public,
            private: None,
        })
    }

    /// Serializes the private key as PKCS#8 DER.
    ///
    /// # Errors
    ///
    /// Returns an error if this is a public-only key or encoding fails.
    pub fn to_pkcs8_der(&self) -> CryptoResult<Vec<u8>> {
        let document = self
            .private_key()?
            .to_pkcs8_der()
            .map_err(|e| CryptoError::InvalidKey(format!("PKCS#8 encoding failed: {e}")))?;
        Ok(document.as_bytes().to_vec())
    }

    /// Returns the public key.
    #[must_use]
    pub const fn public_key(&self) -> &RsaPublicKey {
        &self.public
    }

    /// Returns the private key.
    ///
    /// # Errors
    ///
    /// Returns an error if only the public half is known.
    pub fn private_key(&self) -> CryptoResult<&RsaPrivateKey> {
        self.private
            .as_ref()
            .ok_or_else(|| CryptoError::InvalidKey("RSA private key required".to_string()))
    }

    /// Returns a public-only copy.
    #[must_use]
    pub fn to_public(&self) -> Self {
        Self {
            public: self.public.clone(),
            private: None,
        }
    }

    /// Returns the big-endian modulus.
    #[must_use]
    pub fn modulus(&self) -> Vec<u8> {
        self.public.n().to_bytes_be()
    }

    /// Returns the big-endian public exponent.
    #[must_use]
    pub fn exponent(&self) -> Vec<u8> {
        self.public.e().to_bytes_be()
    }

    /// Returns the modulus size in bits.
    #[must_use]
    pub fn bits(&self) -> usize {
        self.public.size() * 8
    }
}

/// Private half of an EC key.
#[derive(Clone)]
enum EcPrivate {
    Pkcs8(Vec<u8>),
    Scalar(Vec<u8>),
}

/// Elliptic curve public point with an optional private half.
#[derive(Clone)]
pub struct EcKey {
    curve: EllipticCurve,
    public_point: Vec<u8>,
    private: Option<EcPrivate>,
}

pub(crate) fn ecdsa_signing_algorithm(curve: EllipticCurve) -> &'static EcdsaSigningAlgorithm {
    match curve {
        EllipticCurve::P256 => &ECDSA_P256_SHA256_FIXED_SIGNING,
        EllipticCurve::P384 => &ECDSA_P384_SHA384_FIXED_SIGNING,
        EllipticCurve::P521 => &ECDSA_P521_SHA512_FIXED_SIGNING,
    }
}

impl EcKey {
    /// Generates a new key pair on the given curve.
    ///
    /// # Errors
    ///
    /// Returns an error if key generation fails.
    pub fn generate(curve: EllipticCurve) -> CryptoResult<Self> {
        let rng = SystemRandom::new();
        let document = EcdsaKeyPair::generate_pkcs8(ecdsa_signing_algorithm(curve), &rng)
            .map_err(|_| CryptoError::InvalidKey("EC key generation failed".to_string()))?;
        Self::from_pkcs8_der(curve, document.as_ref())
    }

    /// Loads an EC private key from PKCS#8 DER.
    ///
    /// # Errors
    ///
    /// Returns an error if the DER is not a valid key on `curve`.
    pub fn from_pkcs8_der(curve: EllipticCurve, der: &[u8]) -> CryptoResult<Self> {
        let key_pair = EcdsaKeyPair::from_pkcs8(ecdsa_signing_algorithm(curve), der)
            .map_err(|e| CryptoError::InvalidKey(format!("invalid EC PKCS#8 key: {e}")))?;
        Ok(Self {
            curve,
            public_point: key_pair.public_key().as_ref().to_vec(),
            private: Some(EcPrivate::Pkcs8(der.to_vec())),
        })
    }

    /// Builds a public key from its affine coordinates.
    ///
    /// # Errors
    ///
    /// Returns an error if a coordinate has the wrong length for the curve.
    pub fn from_coordinates(curve: EllipticCurve, x: &[u8], y: &[u8]) -> CryptoResult<Self> {
        let len = curve.coordinate_len();
        if x.len() != len || y.len() != len {
            return Err(CryptoError::InvalidKey(format!(
                "{} coordinates must be {len} bytes",
                curve.name()
            )));
        }
        let mut public_point = Vec::with_capacity(1 + 2 * len);
        public_point.push(0x04);
        public_point.extend_from_slice(x);
        public_point.extend_from_slice(y);
        Ok(Self {
            curve,
            public_point,
            private: None,
        })
    }

    /// Builds a key pair from the private scalar `d` and the public coordinates.
    ///
    /// # Errors
    ///
    /// Returns an error if the scalar does not match the public point.
    pub fn from_private_scalar(
        curve: EllipticCurve,
        d: &[u8],
        x: &[u8],
        y: &[u8],
    ) -> CryptoResult<Self> {
        let mut key = Self::from_coordinates(curve, x, y)?;
        EcdsaKeyPair::from_private_key_and_public_key(
            ecdsa_signing_algorithm(curve),
            d,
            &key.public_point,
        )
        .map_err(|e| CryptoError::InvalidKey(format!("invalid EC private key: {e}")))?;
        key.private = Some(EcPrivate::Scalar(d.to_vec()));
        Ok(key)
    }

    /// Returns the curve.
    #[must_use]
    pub const fn curve(&self) -> EllipticCurve {
        self.curve
    }

    /// Returns the uncompressed public point (`0x04 || x || y`).
    #[must_use]
    pub fn public_point(&self) -> &[u8] {
        &self.public_point
    }

    /// Returns the x coordinate.
    #[must_use]
    pub fn x(&self) -> &[u8] {
        let len = self.curve.coordinate_len();
        &self.public_point[1..=len]
    }

    /// Returns the y coordinate.
    #[must_use]
    pub fn y(&self) -> &[u8] {
        let len = self.curve.coordinate_len();
        &self.public_point[1 + len..]
    }

    /// Returns the PKCS#8 DER form when the key was generated or loaded from PKCS#8.
    #[must_use]
    pub fn pkcs8_der(&self) -> Option<&[u8]> {
        match &self.private {
            Some(EcPrivate::Pkcs8(der)) => Some(der),
            _ => None,
        }
    }

    /// Builds the aws-lc-rs signing key pair.
    ///
    /// # Errors
    ///
    /// Returns an error if only the public half is known.
    pub(crate) fn key_pair(&self) -> CryptoResult<EcdsaKeyPair> {
        let alg = ecdsa_signing_algorithm(self.curve);
        match &self.private {
            Some(EcPrivate::Pkcs8(der)) => EcdsaKeyPair::from_pkcs8(alg, der)
                .map_err(|e| CryptoError::InvalidKey(format!("invalid EC PKCS#8 key: {e}"))),
            Some(EcPrivate::Scalar(d)) => {
                EcdsaKeyPair::from_private_key_and_public_key(alg, d, &self.public_point)
                    .map_err(|e| CryptoError::InvalidKey(format!("invalid EC private key: {e}")))
            }
            None => Err(CryptoError::InvalidKey("EC private key required".to_string())),
        }
    }

    /// Returns a public-only copy.
    #[must_use]
    pub fn to_public(&self) -> Self {
        Self {
            curve: self.curve,
            public_point: self.public_point.clone(),
            private: None,
        }
    }
}

/// Generates a key ID from public key bytes.
fn generate_key_id(public_key: &[u8]) -> String {
    let hash = hash::sha256(public_key);
    URL_SAFE_NO_PAD.encode(&hash[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn secret_of_exact_length_is_used_verbatim() {
        let key = SymmetricKey::from_secret("0123456789abcdef");
        assert_eq!(key.derive(16).unwrap(), b"0123456789abcdef".to_vec());
    }

    #[test]
    fn secret_of_other_length_is_hashed() {
        let key = SymmetricKey::from_secret("a client secret");
        let derived = key.derive(16).unwrap();
        assert_eq!(derived.len(), 16);
        assert_eq!(derived, hash::sha256(b"a client secret")[..16].to_vec());
        assert_eq!(key.derive(64).unwrap().len(), 64);
    }

    #[test]
    fn empty_secret_cannot_be_derived() {
        assert!(SymmetricKey::from_secret("").derive(32).is_err());
    }

    #[test]
    fn small_rsa_keys_are_rejected() {
        assert!(matches!(RsaKey::generate(1024), Err(CryptoError::InvalidKey(_))));
    }

    #[test]
    fn rsa_key_survives_pkcs8_round_trip() {
        let key = RsaKey::generate(2048).unwrap();
        let der = key.to_pkcs8_der().unwrap();
        let loaded = RsaKey::from_pkcs8_der(&der).unwrap();
        assert_eq!(loaded.modulus(), key.modulus());
        assert_eq!(loaded.bits(), 2048);
    }

    #[test]
    fn rsa_public_key_from_components() {
        let key = RsaKey::generate(2048).unwrap();
        let public = RsaKey::from_components(&key.modulus(), &key.exponent()).unwrap();
        assert!(public.private_key().is_err());
        assert_eq!(public.exponent(), vec![0x01, 0x00, 0x01]);
    }

    #[test]
    fn ec_coordinates_match_curve() {
        for curve in [EllipticCurve::P256, EllipticCurve::P384, EllipticCurve::P521] {
            let key = EcKey::generate(curve).unwrap();
            assert_eq!(key.x().len(), curve.coordinate_len());
            assert_eq!(key.y().len(), curve.coordinate_len());
            let public = EcKey::from_coordinates(curve, key.x(), key.y()).unwrap();
            assert_eq!(public.public_point(), key.public_point());
        }
    }

    #[test]
    fn ec_coordinates_with_wrong_length_are_rejected() {
        let result = EcKey::from_coordinates(EllipticCurve::P384, &[0u8; 32], &[0u8; 32]);
        assert!(result.is_err());
    }

    #[test]
    fn key_id_is_stable_for_public_copy() {
        let key = KeyMaterial::Ec(EcKey::generate(EllipticCurve::P256).unwrap());
        assert_eq!(key.derive_key_id(), key.to_public().derive_key_id());
        assert!(!key.to_public().has_private());
    }

    #[test]
    fn debug_output_hides_secrets() {
        let key = KeyMaterial::from_secret("super-secret-value");
        let debug = format!("{key:?}");
        assert!(!debug.contains("super-secret-value"));
    }
}
