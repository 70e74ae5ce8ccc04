//! JOSE algorithm identifiers.
//!
//! Covers the JWA names used by OpenID Connect request and response objects:
//! - JWS: `none`, `HS*`, `RS*`, `PS*`, `ES*` at 256/384/512
//! - JWE key management: `RSA1_5`, `RSA-OAEP`, `A128KW`, `A256KW`, `dir`
//! - JWE content encryption: `A128GCM`, `A256GCM`, `A128CBC-HS256`, `A256CBC-HS512`

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for algorithm operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AlgorithmError {
    /// Unknown algorithm name.
    #[error("unknown algorithm: {0}")]
    Unknown(String),

    /// Unknown curve name.
    #[error("unknown curve: {0}")]
    UnknownCurve(String),
}

/// Hash functions used by signatures, MACs and token hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashAlgorithm {
    /// SHA-256.
    #[serde(rename = "SHA256")]
    Sha256,

    /// SHA-384.
    #[serde(rename = "SHA384")]
    Sha384,

    /// SHA-512.
    #[serde(rename = "SHA512")]
    Sha512,
}

impl HashAlgorithm {
    /// Returns the output length in bytes.
    #[must_use]
    pub const fn output_len(self) -> usize {
        match self {
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    /// Returns the algorithm name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sha256 => "SHA-256",
            Self::Sha384 => "SHA-384",
            Self::Sha512 => "SHA-512",
        }
    }
}

/// Key family an algorithm needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyFamily {
    /// No key (`alg=none`).
    None,
    /// Shared secret bytes.
    Symmetric,
    /// RSA key pair.
    Rsa,
    /// Elliptic curve key pair.
    Ec,
}

/// JWS signature algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureAlgorithm {
    /// Unsecured JWS. Never accepted unless explicitly allow-listed.
    #[serde(rename = "none")]
    None,

    /// HMAC with SHA-256.
    #[serde(rename = "HS256")]
    Hs256,
    /// HMAC with SHA-384.
    #[serde(rename = "HS384")]
    Hs384,
    /// HMAC with SHA-512.
    #[serde(rename = "HS512")]
    Hs512,

    /// RSASSA-PKCS1-v1_5 with SHA-256.
    #[serde(rename = "RS256")]
    Rs256,
    /// RSASSA-PKCS1-v1_5 with SHA-384.
    #[serde(rename = "RS384")]
    Rs384,
    /// RSASSA-PKCS1-v1_5 with SHA-512.
    #[serde(rename = "RS512")]
    Rs512,

    /// RSASSA-PSS with SHA-256.
    #[serde(rename = "PS256")]
    Ps256,
    /// RSASSA-PSS with SHA-384.
    #[serde(rename = "PS384")]
    Ps384,
    /// RSASSA-PSS with SHA-512.
    #[serde(rename = "PS512")]
    Ps512,

    /// ECDSA using P-256 and SHA-256.
    #[serde(rename = "ES256")]
    Es256,
    /// ECDSA using P-384 and SHA-384.
    #[serde(rename = "ES384")]
    Es384,
    /// ECDSA using P-521 and SHA-512.
    #[serde(rename = "ES512")]
    Es512,
}

impl SignatureAlgorithm {
    /// Every supported signature algorithm, `none` first.
    pub const ALL: [Self; 13] = [
        Self::None,
        Self::Hs256,
        Self::Hs384,
        Self::Hs512,
        Self::Rs256,
        Self::Rs384,
        Self::Rs512,
        Self::Ps256,
        Self::Ps384,
        Self::Ps512,
        Self::Es256,
        Self::Es384,
        Self::Es512,
    ];

    /// Returns the JWA algorithm name.
    #[must_use]
    pub const fn jwa_name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Hs256 => "HS256",
            Self::Hs384 => "HS384",
            Self::Hs512 => "HS512",
            Self::Rs256 => "RS256",
            Self::Rs384 => "RS384",
            Self::Rs512 => "RS512",
            Self::Ps256 => "PS256",
            Self::Ps384 => "PS384",
            Self::Ps512 => "PS512",
            Self::Es256 => "ES256",
            Self::Es384 => "ES384",
            Self::Es512 => "ES512",
        }
    }

    /// Returns the hash algorithm, or `None` for `alg=none`.
    #[must_use]
    pub const fn hash_algorithm(self) -> Option<HashAlgorithm> {
        match self {
            Self::None => None,
            Self::Hs256 | Self::Rs256 | Self::Ps256 | Self::Es256 => Some(HashAlgorithm::Sha256),
            Self::Hs384 | Self::Rs384 | Self::Ps384 | Self::Es384 => Some(HashAlgorithm::Sha384),
            Self::Hs512 | Self::Rs512 | Self::Ps512 | Self::Es512 => Some(HashAlgorithm::Sha512),
        }
    }

    /// Returns the key family this algorithm signs with.
    #[must_use]
    pub const fn key_family(self) -> KeyFamily {
        match self {
            Self::None => KeyFamily::None,
            Self::Hs256 | Self::Hs384 | Self::Hs512 => KeyFamily::Symmetric,
            Self::Rs256 | Self::Rs384 | Self::Rs512 | Self::Ps256 | Self::Ps384 | Self::Ps512 => {
                KeyFamily::Rsa
            }
            Self::Es256 | Self::Es384 | Self::Es512 => KeyFamily::Ec,
        }
    }

    /// Returns whether this is an HMAC algorithm.
    #[must_use]
    pub const fn is_hmac(self) -> bool {
        matches!(self, Self::Hs256 | Self::Hs384 | Self::Hs512)
    }

    /// Returns whether this is an ECDSA algorithm.
    #[must_use]
    pub const fn is_ecdsa(self) -> bool {
        matches!(self, Self::Es256 | Self::Es384 | Self::Es512)
    }

    /// Returns whether this is an RSA algorithm (PKCS#1 v1.5 or PSS).
    #[must_use]
    pub const fn is_rsa(self) -> bool {
        matches!(self.key_family(), KeyFamily::Rsa)
    }

    /// Returns whether this is an RSA-PSS algorithm.
    #[must_use]
    pub const fn is_pss(self) -> bool {
        matches!(self, Self::Ps256 | Self::Ps384 | Self::Ps512)
    }

    /// Returns the curve mandated by an ECDSA algorithm.
    #[must_use]
    pub const fn curve(self) -> Option<EllipticCurve> {
        match self {
            Self::Es256 => Some(EllipticCurve::P256),
            Self::Es384 => Some(EllipticCurve::P384),
            Self::Es512 => Some(EllipticCurve::P521),
            _ => None,
        }
    }

    /// Parses a JWA algorithm name.
    ///
    /// ## Errors
    ///
    /// Returns an error if the algorithm is unknown.
    pub fn from_jwa(name: &str) -> Result<Self, AlgorithmError> {
        Self::ALL
            .into_iter()
            .find(|alg| alg.jwa_name() == name)
            .ok_or_else(|| AlgorithmError::Unknown(name.to_string()))
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.jwa_name())
    }
}

/// JWE key management algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyEncryptionAlgorithm {
    /// RSAES-PKCS1-v1_5.
    #[serde(rename = "RSA1_5")]
    Rsa1_5,

    /// RSAES-OAEP with SHA-1 and MGF1-SHA-1.
    #[serde(rename = "RSA-OAEP")]
    RsaOaep,

    /// AES Key Wrap with a 128-bit KEK.
    #[serde(rename = "A128KW")]
    A128Kw,

    /// AES Key Wrap with a 256-bit KEK.
    #[serde(rename = "A256KW")]
    A256Kw,

    /// The shared key is the content encryption key.
    #[serde(rename = "dir")]
    Dir,
}

impl KeyEncryptionAlgorithm {
    /// Every supported key management algorithm.
    pub const ALL: [Self; 5] = [Self::Rsa1_5, Self::RsaOaep, Self::A128Kw, Self::A256Kw, Self::Dir];

    /// Returns the JWA algorithm name.
    #[must_use]
    pub const fn jwa_name(self) -> &'static str {
        match self {
            Self::Rsa1_5 => "RSA1_5",
            Self::RsaOaep => "RSA-OAEP",
            Self::A128Kw => "A128KW",
            Self::A256Kw => "A256KW",
            Self::Dir => "dir",
        }
    }

    /// Returns the key family the recipient key must belong to.
    #[must_use]
    pub const fn key_family(self) -> KeyFamily {
        match self {
            Self::Rsa1_5 | Self::RsaOaep => KeyFamily::Rsa,
            Self::A128Kw | Self::A256Kw | Self::Dir => KeyFamily::Symmetric,
        }
    }

    /// Returns the key-encryption key size in bytes for AES Key Wrap.
    #[must_use]
    pub const fn kek_len(self) -> Option<usize> {
        match self {
            Self::A128Kw => Some(16),
            Self::A256Kw => Some(32),
            _ => None,
        }
    }

    /// Parses a JWA algorithm name.
    ///
    /// ## Errors
    ///
    /// Returns an error if the algorithm is unknown.
    pub fn from_jwa(name: &str) -> Result<Self, AlgorithmError> {
        Self::ALL
            .into_iter()
            .find(|alg| alg.jwa_name() == name)
            .ok_or_else(|| AlgorithmError::Unknown(name.to_string()))
    }
}

impl fmt::Display for KeyEncryptionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.jwa_name())
    }
}

/// JWE content encryption algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockEncryptionAlgorithm {
    /// AES-128 in Galois/Counter Mode.
    #[serde(rename = "A128GCM")]
    A128Gcm,

    /// AES-256 in Galois/Counter Mode.
    #[serde(rename = "A256GCM")]
    A256Gcm,

    /// AES-128-CBC with HMAC-SHA-256 truncated to 128 bits.
    #[serde(rename = "A128CBC-HS256", alias = "A128CBC+HS256")]
    A128CbcHs256,

    /// AES-256-CBC with HMAC-SHA-512 truncated to 256 bits.
    #[serde(rename = "A256CBC-HS512", alias = "A256CBC+HS512")]
    A256CbcHs512,
}

impl BlockEncryptionAlgorithm {
    /// Every supported content encryption algorithm.
    pub const ALL: [Self; 4] = [Self::A128Gcm, Self::A256Gcm, Self::A128CbcHs256, Self::A256CbcHs512];

    /// Returns the JWA algorithm name.
    #[must_use]
    pub const fn jwa_name(self) -> &'static str {
        match self {
            Self::A128Gcm => "A128GCM",
            Self::A256Gcm => "A256GCM",
            Self::A128CbcHs256 => "A128CBC-HS256",
            Self::A256CbcHs512 => "A256CBC-HS512",
        }
    }

    /// Returns the content encryption key size in bytes.
    ///
    /// Composite CBC modes carry the MAC key and the encryption key, so their
    /// CEK is twice the AES key size.
    #[must_use]
    pub const fn cek_len(self) -> usize {
        match self {
            Self::A128Gcm => 16,
            Self::A256Gcm | Self::A128CbcHs256 => 32,
            Self::A256CbcHs512 => 64,
        }
    }

    /// Returns the initialization vector size in bytes.
    #[must_use]
    pub const fn iv_len(self) -> usize {
        match self {
            Self::A128Gcm | Self::A256Gcm => 12,
            Self::A128CbcHs256 | Self::A256CbcHs512 => 16,
        }
    }

    /// Returns the authentication tag size in bytes.
    #[must_use]
    pub const fn tag_len(self) -> usize {
        match self {
            Self::A128Gcm | Self::A256Gcm | Self::A128CbcHs256 => 16,
            Self::A256CbcHs512 => 32,
        }
    }

    /// Returns whether this is a composite AES-CBC + HMAC mode.
    #[must_use]
    pub const fn is_cbc_hmac(self) -> bool {
        matches!(self, Self::A128CbcHs256 | Self::A256CbcHs512)
    }

    /// Parses a JWA algorithm name.
    ///
    /// Accepts the draft `+` spelling of the composite modes.
    ///
    /// ## Errors
    ///
    /// Returns an error if the algorithm is unknown.
    pub fn from_jwa(name: &str) -> Result<Self, AlgorithmError> {
        match name {
            "A128GCM" => Ok(Self::A128Gcm),
            "A256GCM" => Ok(Self::A256Gcm),
            "A128CBC-HS256" | "A128CBC+HS256" => Ok(Self::A128CbcHs256),
            "A256CBC-HS512" | "A256CBC+HS512" => Ok(Self::A256CbcHs512),
            _ => Err(AlgorithmError::Unknown(name.to_string())),
        }
    }
}

impl fmt::Display for BlockEncryptionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.jwa_name())
    }
}

/// NIST elliptic curves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EllipticCurve {
    /// NIST P-256 curve (secp256r1).
    #[serde(rename = "P-256")]
    P256,

    /// NIST P-384 curve (secp384r1).
    #[serde(rename = "P-384")]
    P384,

    /// NIST P-521 curve (secp521r1).
    #[serde(rename = "P-521")]
    P521,
}

impl EllipticCurve {
    /// Returns the JWK curve name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::P256 => "P-256",
            Self::P384 => "P-384",
            Self::P521 => "P-521",
        }
    }

    /// Returns the byte length of one coordinate (and of `r`/`s` in a signature).
    #[must_use]
    pub const fn coordinate_len(self) -> usize {
        match self {
            Self::P256 => 32,
            Self::P384 => 48,
            Self::P521 => 66,
        }
    }

    /// Returns the ECDSA algorithm paired with this curve.
    #[must_use]
    pub const fn signature_algorithm(self) -> SignatureAlgorithm {
        match self {
            Self::P256 => SignatureAlgorithm::Es256,
            Self::P384 => SignatureAlgorithm::Es384,
            Self::P521 => SignatureAlgorithm::Es512,
        }
    }

    /// Parses a curve name.
    ///
    /// ## Errors
    ///
    /// Returns an error if the curve is unknown.
    pub fn from_name(name: &str) -> Result<Self, AlgorithmError> {
        match name {
            "P-256" | "secp256r1" | "prime256v1" => Ok(Self::P256),
            "P-384" | "secp384r1" => Ok(Self::P384),
            "P-521" | "secp521r1" => Ok(Self::P521),
            _ => Err(AlgorithmError::UnknownCurve(name.to_string())),
        }
    }
}
