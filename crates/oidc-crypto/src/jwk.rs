//! JSON Web Key (Set) types.
//!
//! Implements JWKS as defined in:
//! - [RFC 7517](https://tools.ietf.org/html/rfc7517) (JSON Web Key)
//! - [RFC 7518](https://tools.ietf.org/html/rfc7518) (JSON Web Algorithms)

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rsa::{BigUint, RsaPrivateKey};
use serde::{Deserialize, Serialize};

use crate::algorithm::EllipticCurve;
use crate::error::{CryptoError, CryptoResult};
use crate::keys::{EcKey, KeyMaterial, RsaKey, SymmetricKey};

/// JSON Web Key Set.
///
/// A set of JSON Web Keys, returned by the JWKS endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonWebKeySet {
    /// Array of JSON Web Keys.
    pub keys: Vec<JsonWebKey>,
}

impl JsonWebKeySet {
    /// Creates a new empty JWKS.
    #[must_use]
    pub const fn new() -> Self {
        Self { keys: Vec::new() }
    }

    /// Creates a JWKS with the given keys.
    #[must_use]
    pub const fn with_keys(keys: Vec<JsonWebKey>) -> Self {
        Self { keys }
    }

    /// Adds a key to the set.
    pub fn add_key(&mut self, key: JsonWebKey) {
        self.keys.push(key);
    }

    /// Finds a key by its ID.
    #[must_use]
    pub fn find_key(&self, kid: &str) -> Option<&JsonWebKey> {
        self.keys.iter().find(|k| k.kid.as_deref() == Some(kid))
    }

    /// Finds keys whose declared algorithm matches.
    #[must_use]
    pub fn find_keys_by_alg(&self, alg: &str) -> Vec<&JsonWebKey> {
        self.keys
            .iter()
            .filter(|k| k.alg.as_deref() == Some(alg))
            .collect()
    }

    /// Returns the number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns whether the set has no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Key type for JWK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    /// RSA key.
    #[serde(rename = "RSA")]
    Rsa,
    /// Elliptic Curve key.
    #[serde(rename = "EC")]
    Ec,
    /// Octet sequence (symmetric key).
    #[serde(rename = "oct")]
    Oct,
}

/// Intended use of a public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyUse {
    /// Signature.
    Sig,
    /// Encryption.
    Enc,
}

/// JSON Web Key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonWebKey {
    /// Key type.
    pub kty: KeyType,

    /// Public key use.
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    pub key_use: Option<KeyUse>,

    /// Algorithm intended for use with the key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,

    /// Key ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// Key expiration time (seconds since the epoch).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    // === RSA Key Parameters ===
    /// RSA modulus (base64url encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,

    /// RSA exponent (base64url encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,

    /// RSA first prime factor (private keys only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p: Option<String>,

    /// RSA second prime factor (private keys only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,

    // === EC Key Parameters ===
    /// EC curve name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crv: Option<EllipticCurve>,

    /// EC x coordinate (base64url encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,

    /// EC y coordinate (base64url encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,

    /// Private exponent (RSA) or private scalar (EC).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,

    // === Symmetric Key Parameters ===
    /// Symmetric key value (base64url encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub k: Option<String>,
}

impl JsonWebKey {
    fn empty(kty: KeyType) -> Self {
        Self {
            kty,
            key_use: None,
            alg: None,
            kid: None,
            exp: None,
            n: None,
            e: None,
            p: None,
            q: None,
            crv: None,
            x: None,
            y: None,
            d: None,
            k: None,
        }
    }

    /// Builds the public JWK for key material.
    ///
    /// Symmetric keys have no publishable form.
    ///
    /// # Errors
    ///
    /// Returns an error for symmetric keys.
    pub fn public_from_material(
        material: &KeyMaterial,
        kid: impl Into<String>,
        alg: impl Into<String>,
        key_use: KeyUse,
    ) -> CryptoResult<Self> {
        let mut jwk = match material {
            KeyMaterial::Rsa(key) => {
                let mut jwk = Self::empty(KeyType::Rsa);
                jwk.n = Some(URL_SAFE_NO_PAD.encode(key.modulus()));
                jwk.e = Some(URL_SAFE_NO_PAD.encode(key.exponent()));
                jwk
            }
            KeyMaterial::Ec(key) => {
                let mut jwk = Self::empty(KeyType::Ec);
                jwk.crv = Some(key.curve());
                jwk.x = Some(URL_SAFE_NO_PAD.encode(key.x()));
                jwk.y = Some(URL_SAFE_NO_PAD.encode(key.y()));
                jwk
            }
            KeyMaterial::Symmetric(_) => {
                return Err(CryptoError::InvalidKey(
                    "symmetric keys cannot be published".to_string(),
                ));
            }
        };
        jwk.kid = Some(kid.into());
        jwk.alg = Some(alg.into());
        jwk.key_use = Some(key_use);
        Ok(jwk)
    }

    /// Converts this JWK into key material.
    ///
    /// Private parameters (`d`, `p`, `q`, `k`) are honoured when present.
    ///
    /// # Errors
    ///
    /// Returns an error if required parameters are missing or malformed.
    pub fn to_key_material(&self) -> CryptoResult<KeyMaterial> {
        match self.kty {
            KeyType::Rsa => {
                let n = decode_param(self.n.as_deref(), "n")?;
                let e = decode_param(self.e.as_deref(), "e")?;
                match (&self.d, &self.p, &self.q) {
                    (Some(d), Some(p), Some(q)) => {
                        let private = RsaPrivateKey::from_components(
                            BigUint::from_bytes_be(&n),
                            BigUint::from_bytes_be(&e),
                            BigUint::from_bytes_be(&decode_param(Some(d), "d")?),
                            vec![
                                BigUint::from_bytes_be(&decode_param(Some(p), "p")?),
                                BigUint::from_bytes_be(&decode_param(Some(q), "q")?),
                            ],
                        )
                        .map_err(|e| CryptoError::InvalidKey(format!("invalid RSA JWK: {e}")))?;
                        Ok(KeyMaterial::Rsa(RsaKey::from_private(private)))
                    }
                    _ => Ok(KeyMaterial::Rsa(RsaKey::from_components(&n, &e)?)),
                }
            }
            KeyType::Ec => {
                let curve = self
                    .crv
                    .ok_or_else(|| CryptoError::InvalidKey("EC JWK is missing crv".to_string()))?;
                let x = decode_param(self.x.as_deref(), "x")?;
                let y = decode_param(self.y.as_deref(), "y")?;
                match &self.d {
                    Some(d) => Ok(KeyMaterial::Ec(EcKey::from_private_scalar(
                        curve,
                        &decode_param(Some(d), "d")?,
                        &x,
                        &y,
                    )?)),
                    None => Ok(KeyMaterial::Ec(EcKey::from_coordinates(curve, &x, &y)?)),
                }
            }
            KeyType::Oct => {
                let k = decode_param(self.k.as_deref(), "k")?;
                Ok(KeyMaterial::Symmetric(SymmetricKey::new(k)))
            }
        }
    }

    /// Checks if this key is usable for signatures.
    #[must_use]
    pub fn is_signing_key(&self) -> bool {
        matches!(self.key_use, Some(KeyUse::Sig) | None)
    }

    /// Checks if this key is usable for encryption.
    #[must_use]
    pub fn is_encryption_key(&self) -> bool {
        matches!(self.key_use, Some(KeyUse::Enc) | None)
    }

    /// Returns the key ID if present.
    #[must_use]
    pub fn key_id(&self) -> Option<&str> {
        self.kid.as_deref()
    }

    /// Returns the algorithm if present.
    #[must_use]
    pub fn algorithm(&self) -> Option<&str> {
        self.alg.as_deref()
    }
}

fn decode_param(value: Option<&str>, name: &str) -> CryptoResult<Vec<u8>> {
    let value =
        value.ok_or_else(|| CryptoError::InvalidKey(format!("JWK is missing parameter '{name}'")))?;
    URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|_| CryptoError::InvalidKey(format!("JWK parameter '{name}' is not base64url")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn rsa_public_jwk_round_trip() {
        let key = KeyMaterial::Rsa(RsaKey::generate(2048).unwrap());
        let jwk = JsonWebKey::public_from_material(&key, "rsa-1", "RS256", KeyUse::Sig).unwrap();
        assert_eq!(jwk.e.as_deref(), Some("AQAB"));
        assert!(jwk.d.is_none());

        let material = jwk.to_key_material().unwrap();
        assert!(!material.has_private());
        assert_eq!(material.derive_key_id(), key.derive_key_id());
    }

    #[test]
    fn ec_public_jwk_serialization() {
        let key = KeyMaterial::Ec(EcKey::generate(EllipticCurve::P384).unwrap());
        let jwk = JsonWebKey::public_from_material(&key, "ec-1", "ES384", KeyUse::Sig).unwrap();
        let json = serde_json::to_value(&jwk).unwrap();
        assert_eq!(json["kty"], "EC");
        assert_eq!(json["crv"], "P-384");
        assert_eq!(json["use"], "sig");
        assert_eq!(json["kid"], "ec-1");
        assert!(json.get("n").is_none());
    }

    #[test]
    fn jwks_lookup_by_kid_and_alg() {
        let key = KeyMaterial::Ec(EcKey::generate(EllipticCurve::P256).unwrap());
        let mut jwks = JsonWebKeySet::new();
        jwks.add_key(JsonWebKey::public_from_material(&key, "a", "ES256", KeyUse::Sig).unwrap());
        jwks.add_key(JsonWebKey::public_from_material(&key, "b", "ES256", KeyUse::Enc).unwrap());

        assert!(jwks.find_key("b").is_some());
        assert!(jwks.find_key("c").is_none());
        assert_eq!(jwks.find_keys_by_alg("ES256").len(), 2);
    }

    #[test]
    fn symmetric_keys_are_not_published() {
        let key = KeyMaterial::from_secret("secret");
        assert!(JsonWebKey::public_from_material(&key, "s", "HS256", KeyUse::Sig).is_err());
    }

    #[test]
    fn oct_jwk_becomes_symmetric_material() {
        let jwk: JsonWebKey = serde_json::from_str(r#"{"kty":"oct","k":"c2VjcmV0"}"#).unwrap();
        let material = jwk.to_key_material().unwrap();
        assert!(matches!(material, KeyMaterial::Symmetric(ref k) if k.as_bytes() == b"secret"));
    }

    #[test]
    fn missing_parameters_are_reported() {
        let jwk: JsonWebKey = serde_json::from_str(r#"{"kty":"RSA","e":"AQAB"}"#).unwrap();
        assert!(matches!(jwk.to_key_material(), Err(CryptoError::InvalidKey(_))));
    }
}
