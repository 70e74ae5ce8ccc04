//! # oidc-crypto
//!
//! JOSE primitives for OpenID Connect request and response objects.
//!
//! - JWS: `none`, `HS*`, `RS*`, `PS*`, `ES*` at 256/384/512
//! - JWE: `A128KW`, `A256KW`, `RSA1_5`, `RSA-OAEP`, `dir` with AES-GCM and
//!   AES-CBC-HMAC content encryption
//! - JWK and JWK Set conversion
//!
//! Every primitive is a pure function of its inputs and is safe to call
//! concurrently with different keys and payloads.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod algorithm;
pub mod error;
pub mod hash;
pub mod header;
pub mod jwe;
pub mod jwk;
pub mod jws;
pub mod keys;
pub mod random;

pub use algorithm::{
    AlgorithmError, BlockEncryptionAlgorithm, EllipticCurve, HashAlgorithm, KeyEncryptionAlgorithm,
    KeyFamily, SignatureAlgorithm,
};
pub use error::{CryptoError, CryptoResult};
pub use hash::{left_half_hash, sha256, sha384, sha512};
pub use header::{JoseHeader, b64_decode, b64_encode, segment_count};
pub use jwe::{CompactJwe, DecryptedJwe};
pub use jwk::{JsonWebKey, JsonWebKeySet, KeyType, KeyUse};
pub use jws::CompactJws;
pub use keys::{EcKey, KeyMaterial, RsaKey, SymmetricKey};
pub use random::{generate_client_secret, generate_opaque_token, generate_token_id};
