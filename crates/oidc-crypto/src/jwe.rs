//! JSON Web Encryption (compact serialization).
//!
//! Key management: `A128KW`/`A256KW` (RFC 3394 AES key wrap under a key derived
//! from the shared secret), `RSA1_5`, `RSA-OAEP` (SHA-1) and `dir`.
//!
//! Content encryption: `A128GCM`/`A256GCM`, and the composite
//! `A128CBC-HS256`/`A256CBC-HS512` modes where the CEK is split into a MAC half
//! followed by an encryption half.
//!
//! The AAD is the ASCII of the base64url protected header. Decryption fails
//! closed: every unwrap, tag, MAC or padding failure is reported as
//! [`CryptoError::DecryptionFailed`] and no plaintext is released.

use aws_lc_rs::{
    aead::{AES_128_GCM, AES_256_GCM, Aad, LessSafeKey, Nonce, UnboundKey},
    key_wrap::{AES_128, AES_256, AesKek, KeyWrap},
};
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use rsa::{Oaep, Pkcs1v15Encrypt, rand_core::OsRng};
use tracing::debug;

use crate::algorithm::{BlockEncryptionAlgorithm, HashAlgorithm, KeyEncryptionAlgorithm, KeyFamily};
use crate::error::{CryptoError, CryptoResult};
use crate::hash;
use crate::header::{JoseHeader, b64_decode, b64_encode};
use crate::keys::KeyMaterial;
use crate::random;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// The five parts of a compact JWE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactJwe {
    /// Base64url protected header, also the AAD.
    pub protected: String,
    /// Wrapped content encryption key (empty for `dir`).
    pub encrypted_key: Vec<u8>,
    /// Initialization vector.
    pub iv: Vec<u8>,
    /// Ciphertext.
    pub ciphertext: Vec<u8>,
    /// Authentication tag.
    pub tag: Vec<u8>,
}

impl CompactJwe {
    /// Parses a five-segment compact JWE.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::MalformedToken`] for a wrong segment count and
    /// [`CryptoError::DecryptionFailed`] for undecodable body segments.
    pub fn parse(token: &str) -> CryptoResult<Self> {
        let segments: Vec<&str> = token.split('.').collect();
        if segments.len() != 5 {
            return Err(CryptoError::MalformedToken(format!(
                "JWE must have 5 segments, found {}",
                segments.len()
            )));
        }
        let decode = |segment: &str| {
            b64_decode(segment, "JWE segment").map_err(|_| CryptoError::DecryptionFailed)
        };
        Ok(Self {
            protected: segments[0].to_string(),
            encrypted_key: decode(segments[1])?,
            iv: decode(segments[2])?,
            ciphertext: decode(segments[3])?,
            tag: decode(segments[4])?,
        })
    }

    /// Decodes the protected header.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::MalformedToken`] if the header is not base64url JSON.
    pub fn header(&self) -> CryptoResult<JoseHeader> {
        JoseHeader::decode(&self.protected)
    }

    /// Serializes to the compact form.
    #[must_use]
    pub fn to_compact(&self) -> String {
        format!(
            "{}.{}.{}.{}.{}",
            self.protected,
            b64_encode(&self.encrypted_key),
            b64_encode(&self.iv),
            b64_encode(&self.ciphertext),
            b64_encode(&self.tag)
        )
    }
}

/// Result of a successful decryption.
#[derive(Debug, Clone)]
pub struct DecryptedJwe {
    /// Protected header.
    pub header: JoseHeader,
    /// Verified plaintext.
    pub payload: Vec<u8>,
}

/// Encrypts `payload` under the algorithms named in `header`.
///
/// # Errors
///
/// Returns [`CryptoError::UnsupportedAlgorithm`] if `alg`/`enc` are missing,
/// unknown or do not match the key family, or [`CryptoError::Encryption`].
pub fn encrypt(header: &JoseHeader, payload: &[u8], key: &KeyMaterial) -> CryptoResult<CompactJwe> {
    let (key_alg, block_alg) = header.encryption_algorithms()?;
    check_family(key_alg, key)?;

    let protected = header.encode()?;
    let (cek, encrypted_key) = generate_and_wrap_cek(key_alg, block_alg, key)?;
    let iv = random::random_key_bytes(block_alg.iv_len())?;
    let (ciphertext, tag) = encrypt_content(block_alg, &cek, &iv, protected.as_bytes(), payload)?;

    Ok(CompactJwe {
        protected,
        encrypted_key,
        iv,
        ciphertext,
        tag,
    })
}

/// Encrypts `payload` and returns the compact token.
///
/// # Errors
///
/// See [`encrypt`].
pub fn encrypt_compact(header: &JoseHeader, payload: &[u8], key: &KeyMaterial) -> CryptoResult<String> {
    Ok(encrypt(header, payload, key)?.to_compact())
}

/// Decrypts a compact JWE.
///
/// # Errors
///
/// Returns [`CryptoError::MalformedToken`] for a wrong segment count or an
/// undecodable header, [`CryptoError::UnsupportedAlgorithm`] for unknown or
/// mismatched algorithms, and [`CryptoError::DecryptionFailed`] otherwise.
pub fn decrypt(token: &str, key: &KeyMaterial) -> CryptoResult<DecryptedJwe> {
    let jwe = CompactJwe::parse(token)?;
    let header = jwe.header()?;
    let (key_alg, block_alg) = header.encryption_algorithms()?;
    check_family(key_alg, key)?;

    let payload = decrypt_parts(&jwe, key_alg, block_alg, key).inspect_err(|_| {
        debug!(alg = %key_alg, enc = %block_alg, "JWE decryption failed");
    })?;
    Ok(DecryptedJwe { header, payload })
}

fn decrypt_parts(
    jwe: &CompactJwe,
    key_alg: KeyEncryptionAlgorithm,
    block_alg: BlockEncryptionAlgorithm,
    key: &KeyMaterial,
) -> CryptoResult<Vec<u8>> {
    if jwe.iv.len() != block_alg.iv_len() || jwe.tag.len() != block_alg.tag_len() {
        return Err(CryptoError::DecryptionFailed);
    }
    let cek = unwrap_cek(key_alg, block_alg, key, &jwe.encrypted_key)?;
    decrypt_content(
        block_alg,
        &cek,
        &jwe.iv,
        jwe.protected.as_bytes(),
        &jwe.ciphertext,
        &jwe.tag,
    )
}

fn check_family(key_alg: KeyEncryptionAlgorithm, key: &KeyMaterial) -> CryptoResult<()> {
    let matches = match key_alg.key_family() {
        KeyFamily::Symmetric => matches!(key, KeyMaterial::Symmetric(_)),
        KeyFamily::Rsa => matches!(key, KeyMaterial::Rsa(_)),
        KeyFamily::Ec | KeyFamily::None => false,
    };
    if matches {
        Ok(())
    } else {
        Err(CryptoError::UnsupportedAlgorithm(format!(
            "{key_alg} does not match the supplied key material"
        )))
    }
}

fn symmetric_key(key: &KeyMaterial, len: usize) -> CryptoResult<Vec<u8>> {
    match key {
        KeyMaterial::Symmetric(secret) => secret.derive(len),
        _ => Err(CryptoError::InvalidKey("shared secret required".to_string())),
    }
}

fn generate_and_wrap_cek(
    key_alg: KeyEncryptionAlgorithm,
    block_alg: BlockEncryptionAlgorithm,
    key: &KeyMaterial,
) -> CryptoResult<(Vec<u8>, Vec<u8>)> {
    if key_alg == KeyEncryptionAlgorithm::Dir {
        return Ok((symmetric_key(key, block_alg.cek_len())?, Vec::new()));
    }

    let cek = random::random_key_bytes(block_alg.cek_len())?;
    let encrypted_key = match (key_alg, key) {
        (KeyEncryptionAlgorithm::A128Kw | KeyEncryptionAlgorithm::A256Kw, _) => {
            let kek_len = key_alg.kek_len().unwrap_or(16);
            let kek = symmetric_key(key, kek_len)?;
            aes_key_wrap(&kek, &cek)?
        }
        (KeyEncryptionAlgorithm::Rsa1_5, KeyMaterial::Rsa(rsa)) => rsa
            .public_key()
            .encrypt(&mut OsRng, Pkcs1v15Encrypt, &cek)
            .map_err(|e| CryptoError::Encryption(format!("RSA1_5 key encryption failed: {e}")))?,
        (KeyEncryptionAlgorithm::RsaOaep, KeyMaterial::Rsa(rsa)) => rsa
            .public_key()
            .encrypt(&mut OsRng, Oaep::new::<sha1::Sha1>(), &cek)
            .map_err(|e| CryptoError::Encryption(format!("RSA-OAEP key encryption failed: {e}")))?,
        _ => return Err(CryptoError::UnsupportedAlgorithm(key_alg.to_string())),
    };
    Ok((cek, encrypted_key))
}

fn unwrap_cek(
    key_alg: KeyEncryptionAlgorithm,
    block_alg: BlockEncryptionAlgorithm,
    key: &KeyMaterial,
    encrypted_key: &[u8],
) -> CryptoResult<Vec<u8>> {
    let cek = match (key_alg, key) {
        (KeyEncryptionAlgorithm::Dir, _) => {
            if !encrypted_key.is_empty() {
                return Err(CryptoError::DecryptionFailed);
            }
            symmetric_key(key, block_alg.cek_len()).map_err(|_| CryptoError::DecryptionFailed)?
        }
        (KeyEncryptionAlgorithm::A128Kw | KeyEncryptionAlgorithm::A256Kw, _) => {
            let kek_len = key_alg.kek_len().unwrap_or(16);
            let kek = symmetric_key(key, kek_len).map_err(|_| CryptoError::DecryptionFailed)?;
            aes_key_unwrap(&kek, encrypted_key)?
        }
        (KeyEncryptionAlgorithm::Rsa1_5, KeyMaterial::Rsa(rsa)) => {
            let private = rsa.private_key().map_err(|_| CryptoError::DecryptionFailed)?;
            // A bad PKCS#1 block continues with a random CEK so the failure
            // surfaces at the tag check like every other one.
            match private.decrypt(Pkcs1v15Encrypt, encrypted_key) {
                Ok(cek) if cek.len() == block_alg.cek_len() => cek,
                _ => random::random_key_bytes(block_alg.cek_len())?,
            }
        }
        (KeyEncryptionAlgorithm::RsaOaep, KeyMaterial::Rsa(rsa)) => {
            let private = rsa.private_key().map_err(|_| CryptoError::DecryptionFailed)?;
            private
                .decrypt(Oaep::new::<sha1::Sha1>(), encrypted_key)
                .map_err(|_| CryptoError::DecryptionFailed)?
        }
        _ => return Err(CryptoError::DecryptionFailed),
    };
    if cek.len() == block_alg.cek_len() {
        Ok(cek)
    } else {
        Err(CryptoError::DecryptionFailed)
    }
}

fn aes_key_wrap(kek: &[u8], cek: &[u8]) -> CryptoResult<Vec<u8>> {
    let algorithm = if kek.len() == 16 { &AES_128 } else { &AES_256 };
    let kek = AesKek::new(algorithm, kek)
        .map_err(|_| CryptoError::InvalidKey("invalid AES key wrap key".to_string()))?;
    let mut output = vec![0u8; cek.len() + 15];
    let wrapped = kek
        .wrap(cek, &mut output)
        .map_err(|_| CryptoError::Encryption("AES key wrap failed".to_string()))?;
    Ok(wrapped.to_vec())
}

fn aes_key_unwrap(kek: &[u8], wrapped: &[u8]) -> CryptoResult<Vec<u8>> {
    let algorithm = if kek.len() == 16 { &AES_128 } else { &AES_256 };
    let kek = AesKek::new(algorithm, kek).map_err(|_| CryptoError::DecryptionFailed)?;
    let mut output = vec![0u8; wrapped.len()];
    let cek = kek
        .unwrap(wrapped, &mut output)
        .map_err(|_| CryptoError::DecryptionFailed)?;
    Ok(cek.to_vec())
}

fn gcm_key(block_alg: BlockEncryptionAlgorithm, cek: &[u8]) -> Option<LessSafeKey> {
    let algorithm = match block_alg {
        BlockEncryptionAlgorithm::A128Gcm => &AES_128_GCM,
        BlockEncryptionAlgorithm::A256Gcm => &AES_256_GCM,
        _ => return None,
    };
    UnboundKey::new(algorithm, cek).ok().map(LessSafeKey::new)
}

const fn mac_hash(block_alg: BlockEncryptionAlgorithm) -> HashAlgorithm {
    match block_alg {
        BlockEncryptionAlgorithm::A256CbcHs512 => HashAlgorithm::Sha512,
        _ => HashAlgorithm::Sha256,
    }
}

/// Computes the truncated CBC-HMAC tag over `AAD || IV || CT || AL`.
fn cbc_hmac_tag(
    block_alg: BlockEncryptionAlgorithm,
    mac_key: &[u8],
    aad: &[u8],
    iv: &[u8],
    ciphertext: &[u8],
) -> Vec<u8> {
    let aad_bits = (aad.len() as u64) * 8;
    let mut mac_input = Vec::with_capacity(aad.len() + iv.len() + ciphertext.len() + 8);
    mac_input.extend_from_slice(aad);
    mac_input.extend_from_slice(iv);
    mac_input.extend_from_slice(ciphertext);
    mac_input.extend_from_slice(&aad_bits.to_be_bytes());

    let mut mac = hash::hmac_sign(mac_hash(block_alg), mac_key, &mac_input);
    mac.truncate(block_alg.tag_len());
    mac
}

fn encrypt_content(
    block_alg: BlockEncryptionAlgorithm,
    cek: &[u8],
    iv: &[u8],
    aad: &[u8],
    plaintext: &[u8],
) -> CryptoResult<(Vec<u8>, Vec<u8>)> {
    if block_alg.is_cbc_hmac() {
        let (mac_key, enc_key) = cek.split_at(cek.len() / 2);
        let ciphertext = match block_alg {
            BlockEncryptionAlgorithm::A128CbcHs256 => Aes128CbcEnc::new_from_slices(enc_key, iv)
                .map_err(|e| CryptoError::Encryption(e.to_string()))?
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
            _ => Aes256CbcEnc::new_from_slices(enc_key, iv)
                .map_err(|e| CryptoError::Encryption(e.to_string()))?
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
        };
        let tag = cbc_hmac_tag(block_alg, mac_key, aad, iv, &ciphertext);
        return Ok((ciphertext, tag));
    }

    let key = gcm_key(block_alg, cek)
        .ok_or_else(|| CryptoError::Encryption(format!("invalid {block_alg} key")))?;
    let nonce = Nonce::try_assume_unique_for_key(iv)
        .map_err(|_| CryptoError::Encryption("invalid GCM nonce".to_string()))?;
    let mut in_out = plaintext.to_vec();
    let tag = key
        .seal_in_place_separate_tag(nonce, Aad::from(aad), &mut in_out)
        .map_err(|_| CryptoError::Encryption(format!("{block_alg} encryption failed")))?;
    Ok((in_out, tag.as_ref().to_vec()))
}

fn decrypt_content(
    block_alg: BlockEncryptionAlgorithm,
    cek: &[u8],
    iv: &[u8],
    aad: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
) -> CryptoResult<Vec<u8>> {
    if block_alg.is_cbc_hmac() {
        let (mac_key, enc_key) = cek.split_at(cek.len() / 2);
        let expected = cbc_hmac_tag(block_alg, mac_key, aad, iv, ciphertext);
        if !hash::constant_time_eq(&expected, tag) {
            return Err(CryptoError::DecryptionFailed);
        }
        let plaintext = match block_alg {
            BlockEncryptionAlgorithm::A128CbcHs256 => Aes128CbcDec::new_from_slices(enc_key, iv)
                .map_err(|_| CryptoError::DecryptionFailed)?
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
            _ => Aes256CbcDec::new_from_slices(enc_key, iv)
                .map_err(|_| CryptoError::DecryptionFailed)?
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
        };
        return plaintext.map_err(|_| CryptoError::DecryptionFailed);
    }

    let key = gcm_key(block_alg, cek).ok_or(CryptoError::DecryptionFailed)?;
    let nonce = Nonce::try_assume_unique_for_key(iv).map_err(|_| CryptoError::DecryptionFailed)?;
    let mut in_out = Vec::with_capacity(ciphertext.len() + tag.len());
    in_out.extend_from_slice(ciphertext);
    in_out.extend_from_slice(tag);
    let plaintext = key
        .open_in_place(nonce, Aad::from(aad), &mut in_out)
        .map_err(|_| CryptoError::DecryptionFailed)?;
    Ok(plaintext.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::RsaKey;
    use pretty_assertions::assert_eq;

    const PAYLOAD: &[u8] = br#"{"response_type":"code id_token","client_id":"s6BhdRkqt3"}"#;

    fn rsa_key() -> KeyMaterial {
        KeyMaterial::Rsa(RsaKey::generate(2048).unwrap())
    }

    fn key_for(alg: KeyEncryptionAlgorithm, rsa: &KeyMaterial) -> KeyMaterial {
        match alg.key_family() {
            KeyFamily::Rsa => rsa.clone(),
            _ => KeyMaterial::from_secret("a shared client secret"),
        }
    }

    #[test]
    fn every_algorithm_pair_round_trips() {
        let rsa = rsa_key();
        for key_alg in KeyEncryptionAlgorithm::ALL {
            for block_alg in BlockEncryptionAlgorithm::ALL {
                let private = key_for(key_alg, &rsa);
                let encrypt_key = private.to_public();
                let header = JoseHeader::encrypted(key_alg, block_alg);
                let token = encrypt_compact(&header, PAYLOAD, &encrypt_key).unwrap();
                assert_eq!(token.split('.').count(), 5);

                let decrypted = decrypt(&token, &private).unwrap();
                assert_eq!(decrypted.payload, PAYLOAD, "{key_alg} / {block_alg}");
                assert_eq!(decrypted.header.enc.as_deref(), Some(block_alg.jwa_name()));
            }
        }
    }

    #[test]
    fn cbc_cek_is_split_in_halves() {
        let key = KeyMaterial::from_secret("secret");
        let header = JoseHeader::encrypted(
            KeyEncryptionAlgorithm::A256Kw,
            BlockEncryptionAlgorithm::A256CbcHs512,
        );
        let jwe = encrypt(&header, PAYLOAD, &key).unwrap();
        assert_eq!(jwe.iv.len(), 16);
        assert_eq!(jwe.tag.len(), 32);
        // 64-byte CEK wrapped with one extra 8-byte block.
        assert_eq!(jwe.encrypted_key.len(), 72);
    }

    #[test]
    fn flipped_ciphertext_or_tag_byte_fails_uniformly() {
        let rsa = rsa_key();
        for key_alg in KeyEncryptionAlgorithm::ALL {
            for block_alg in BlockEncryptionAlgorithm::ALL {
                let private = key_for(key_alg, &rsa);
                let header = JoseHeader::encrypted(key_alg, block_alg);
                let jwe = encrypt(&header, PAYLOAD, &private).unwrap();

                let mut bad_ct = jwe.clone();
                bad_ct.ciphertext[0] ^= 0x01;
                assert!(matches!(
                    decrypt(&bad_ct.to_compact(), &private),
                    Err(CryptoError::DecryptionFailed)
                ));

                let mut bad_tag = jwe.clone();
                let last = bad_tag.tag.len() - 1;
                bad_tag.tag[last] ^= 0x80;
                assert!(matches!(
                    decrypt(&bad_tag.to_compact(), &private),
                    Err(CryptoError::DecryptionFailed)
                ));
            }
        }
    }

    #[test]
    fn tampered_header_fails_aad_check() {
        let key = KeyMaterial::from_secret("secret");
        let header = JoseHeader::encrypted(KeyEncryptionAlgorithm::A128Kw, BlockEncryptionAlgorithm::A128Gcm);
        let mut jwe = encrypt(&header, PAYLOAD, &key).unwrap();
        jwe.protected = header
            .with_kid(Some("injected".to_string()))
            .encode()
            .unwrap();
        assert!(matches!(decrypt(&jwe.to_compact(), &key), Err(CryptoError::DecryptionFailed)));
    }

    #[test]
    fn wrong_secret_fails() {
        let header = JoseHeader::encrypted(KeyEncryptionAlgorithm::A256Kw, BlockEncryptionAlgorithm::A256Gcm);
        let token = encrypt_compact(&header, PAYLOAD, &KeyMaterial::from_secret("right")).unwrap();
        assert!(matches!(
            decrypt(&token, &KeyMaterial::from_secret("wrong")),
            Err(CryptoError::DecryptionFailed)
        ));
    }

    #[test]
    fn wrong_rsa_key_fails_uniformly() {
        let header = JoseHeader::encrypted(KeyEncryptionAlgorithm::Rsa1_5, BlockEncryptionAlgorithm::A128CbcHs256);
        let token = encrypt_compact(&header, PAYLOAD, &rsa_key()).unwrap();
        assert!(matches!(decrypt(&token, &rsa_key()), Err(CryptoError::DecryptionFailed)));
    }

    #[test]
    fn dir_rejects_encrypted_key() {
        let key = KeyMaterial::from_secret("secret");
        let header = JoseHeader::encrypted(KeyEncryptionAlgorithm::Dir, BlockEncryptionAlgorithm::A128Gcm);
        let mut jwe = encrypt(&header, PAYLOAD, &key).unwrap();
        assert!(jwe.encrypted_key.is_empty());
        jwe.encrypted_key = vec![1, 2, 3];
        assert!(matches!(decrypt(&jwe.to_compact(), &key), Err(CryptoError::DecryptionFailed)));
    }

    #[test]
    fn key_family_mismatch_is_unsupported() {
        let header = JoseHeader::encrypted(KeyEncryptionAlgorithm::RsaOaep, BlockEncryptionAlgorithm::A128Gcm);
        assert!(matches!(
            encrypt(&header, PAYLOAD, &KeyMaterial::from_secret("secret")),
            Err(CryptoError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn wrong_segment_count_is_malformed() {
        assert!(matches!(
            decrypt("a.b.c", &KeyMaterial::from_secret("s")),
            Err(CryptoError::MalformedToken(_))
        ));
    }

    #[test]
    fn cbc_plus_alias_decrypts() {
        let key = KeyMaterial::from_secret("secret");
        let mut header = JoseHeader::encrypted(KeyEncryptionAlgorithm::A128Kw, BlockEncryptionAlgorithm::A128CbcHs256);
        header.enc = Some("A128CBC+HS256".to_string());
        let token = encrypt_compact(&header, PAYLOAD, &key).unwrap();
        assert_eq!(decrypt(&token, &key).unwrap().payload, PAYLOAD);
    }
}
