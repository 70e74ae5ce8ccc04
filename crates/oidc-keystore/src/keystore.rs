//! Password-protected key store.
//!
//! The store is a JSON file holding a distinguished name, PBKDF2 parameters and
//! one record per key. Private key bytes are sealed with AES-256-GCM under a
//! key derived from the store password; the key id is the AAD so records cannot
//! be swapped between ids. Public metadata (kid, alg, use, timestamps) stays in
//! clear text.

use std::fmt;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};

use aws_lc_rs::{
    aead::{AES_256_GCM, Aad, LessSafeKey, Nonce, UnboundKey},
    pbkdf2,
};
use chrono::{DateTime, Utc};
use oidc_core::config::KeySelectionStrategy;
use oidc_core::event::{Event, EventType};
use oidc_crypto::{
    EcKey, EllipticCurve, JsonWebKey, JsonWebKeySet, KeyEncryptionAlgorithm, KeyMaterial, KeyType,
    KeyUse, RsaKey, SignatureAlgorithm, SymmetricKey, b64_decode, b64_encode, random,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{KeyError, KeyResult};

const FORMAT_VERSION: u32 = 1;
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const CHECK_AAD: &[u8] = b"oidc-keystore-check";
const CHECK_PLAINTEXT: &[u8] = b"unlocked";

/// Algorithm a stored key serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAlgorithm {
    /// JWS algorithm.
    Signature(SignatureAlgorithm),
    /// JWE key management algorithm.
    Encryption(KeyEncryptionAlgorithm),
}

impl KeyAlgorithm {
    /// Parses a JWA name, trying signature algorithms first.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::UnsupportedAlgorithm`] for unknown names.
    pub fn from_jwa(name: &str) -> KeyResult<Self> {
        SignatureAlgorithm::from_jwa(name)
            .map(Self::Signature)
            .or_else(|_| KeyEncryptionAlgorithm::from_jwa(name).map(Self::Encryption))
            .map_err(|_| KeyError::UnsupportedAlgorithm(name.to_string()))
    }

    /// Returns the JWA name.
    #[must_use]
    pub const fn jwa_name(self) -> &'static str {
        match self {
            Self::Signature(alg) => alg.jwa_name(),
            Self::Encryption(alg) => alg.jwa_name(),
        }
    }

    /// Returns the `use` a key for this algorithm carries.
    #[must_use]
    pub const fn key_use(self) -> KeyUse {
        match self {
            Self::Signature(_) => KeyUse::Sig,
            Self::Encryption(_) => KeyUse::Enc,
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.jwa_name())
    }
}

/// A key held by the store.
#[derive(Debug, Clone)]
pub struct KeyEntry {
    /// Key id.
    pub kid: String,
    /// Algorithm the key was generated for.
    pub alg: KeyAlgorithm,
    /// Intended use.
    pub key_use: KeyUse,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Expiration time, if any.
    pub expires_at: Option<DateTime<Utc>>,
    /// Key material including the private half.
    pub material: KeyMaterial,
}

impl KeyEntry {
    /// Returns whether the key is expired at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }

    /// Returns the public JWK, or `None` for symmetric keys.
    #[must_use]
    pub fn public_jwk(&self) -> Option<JsonWebKey> {
        let mut jwk = JsonWebKey::public_from_material(
            &self.material.to_public(),
            self.kid.clone(),
            self.alg.jwa_name(),
            self.key_use,
        )
        .ok()?;
        jwk.exp = self.expires_at.map(|exp| exp.timestamp());
        Some(jwk)
    }
}

#[derive(Serialize, Deserialize)]
struct KeyStoreFile {
    version: u32,
    dn: String,
    salt: String,
    iterations: u32,
    check: Sealed,
    entries: Vec<StoredEntry>,
}

#[derive(Serialize, Deserialize)]
struct Sealed {
    nonce: String,
    ciphertext: String,
}

#[derive(Serialize, Deserialize)]
struct StoredEntry {
    kid: String,
    alg: String,
    #[serde(rename = "use")]
    key_use: KeyUse,
    kty: KeyType,
    #[serde(skip_serializing_if = "Option::is_none")]
    crv: Option<EllipticCurve>,
    created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
    secret: Sealed,
}

/// Password-protected key store.
pub struct KeyStore {
    path: Option<PathBuf>,
    dn: String,
    salt: Vec<u8>,
    iterations: u32,
    sealing_key: LessSafeKey,
    entries: Vec<KeyEntry>,
}

impl fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyStore")
            .field("path", &self.path)
            .field("dn", &self.dn)
            .field("keys", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl KeyStore {
    /// Creates an empty key store at `path` and writes it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn create(path: &Path, password: &str, dn: &str, iterations: u32) -> KeyResult<Self> {
        let mut store = Self::in_memory(password, dn, iterations)?;
        store.path = Some(path.to_path_buf());
        store.save()?;
        info!(path = %path.display(), dn, "created key store");
        Ok(store)
    }

    /// Creates an empty key store that is never written to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if key derivation fails.
    pub fn in_memory(password: &str, dn: &str, iterations: u32) -> KeyResult<Self> {
        let salt = random::random_key_bytes(SALT_LEN)?;
        let sealing_key = derive_sealing_key(password, &salt, iterations)?;
        Ok(Self {
            path: None,
            dn: dn.to_string(),
            salt,
            iterations,
            sealing_key,
            entries: Vec::new(),
        })
    }

    /// Opens an existing key store.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::KeyStoreUnavailable`] if the file cannot be read,
    /// [`KeyError::Serialization`] if it is not a key store and
    /// [`KeyError::Locked`] if the password is wrong.
    pub fn open(path: &Path, password: &str) -> KeyResult<Self> {
        let contents = std::fs::read(path).map_err(|e| {
            KeyError::KeyStoreUnavailable(format!("cannot read {}: {e}", path.display()))
        })?;
        let file: KeyStoreFile = serde_json::from_slice(&contents)
            .map_err(|e| KeyError::Serialization(e.to_string()))?;
        if file.version != FORMAT_VERSION {
            return Err(KeyError::Serialization(format!(
                "unsupported key store version {}",
                file.version
            )));
        }

        let salt = b64_decode(&file.salt, "salt")?;
        let sealing_key = derive_sealing_key(password, &salt, file.iterations)?;
        let check = unseal(&sealing_key, &file.check, CHECK_AAD)?;
        if check != CHECK_PLAINTEXT {
            return Err(KeyError::Locked);
        }

        let entries = file
            .entries
            .iter()
            .map(|stored| restore_entry(&sealing_key, stored))
            .collect::<KeyResult<Vec<_>>>()?;

        debug!(path = %path.display(), keys = entries.len(), "opened key store");
        Ok(Self {
            path: Some(path.to_path_buf()),
            dn: file.dn,
            salt,
            iterations: file.iterations,
            sealing_key,
            entries,
        })
    }

    /// Opens the key store at `path`, creating it when the file does not exist.
    ///
    /// # Errors
    ///
    /// See [`KeyStore::open`] and [`KeyStore::create`].
    pub fn open_or_create(path: &Path, password: &str, dn: &str, iterations: u32) -> KeyResult<Self> {
        if path.exists() {
            Self::open(path, password)
        } else {
            Self::create(path, password, dn, iterations)
        }
    }

    /// Writes the key store back to its file. In-memory stores are left alone.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::KeyStoreUnavailable`] if the file cannot be written.
    pub fn save(&self) -> KeyResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let file = KeyStoreFile {
            version: FORMAT_VERSION,
            dn: self.dn.clone(),
            salt: b64_encode(&self.salt),
            iterations: self.iterations,
            check: seal(&self.sealing_key, CHECK_PLAINTEXT, CHECK_AAD)?,
            entries: self
                .entries
                .iter()
                .map(|entry| store_entry(&self.sealing_key, entry))
                .collect::<KeyResult<Vec<_>>>()?,
        };
        let json = serde_json::to_vec_pretty(&file).map_err(|e| KeyError::Serialization(e.to_string()))?;

        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, json)
            .and_then(|()| std::fs::rename(&tmp, path))
            .map_err(|e| KeyError::KeyStoreUnavailable(format!("cannot write {}: {e}", path.display())))
    }

    /// Returns the distinguished name.
    #[must_use]
    pub fn dn(&self) -> &str {
        &self.dn
    }

    /// Returns the file path, if the store is file-backed.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns all keys in insertion order.
    #[must_use]
    pub fn entries(&self) -> &[KeyEntry] {
        &self.entries
    }

    /// Returns whether a key with this id exists.
    #[must_use]
    pub fn contains(&self, kid: &str) -> bool {
        self.get(kid).is_some()
    }

    /// Looks up a key by id.
    #[must_use]
    pub fn get(&self, kid: &str) -> Option<&KeyEntry> {
        self.entries.iter().find(|entry| entry.kid == kid)
    }

    /// Generates a key for `alg` and returns its id.
    ///
    /// `rsa_bits` is used for RSA algorithms only. The store is saved when
    /// file-backed.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::UnsupportedAlgorithm`] for `none` and `dir`, or an
    /// error if generation or saving fails.
    pub fn generate_key(
        &mut self,
        alg: KeyAlgorithm,
        expires_at: Option<DateTime<Utc>>,
        rsa_bits: usize,
    ) -> KeyResult<String> {
        let material = generate_material(alg, rsa_bits)?;
        let kid = format!(
            "{}_{}_{}",
            material.derive_key_id(),
            if alg.key_use() == KeyUse::Sig { "sig" } else { "enc" },
            alg.jwa_name().to_ascii_lowercase().replace('-', "_")
        );
        self.entries.push(KeyEntry {
            kid: kid.clone(),
            alg,
            key_use: alg.key_use(),
            created_at: Utc::now(),
            expires_at,
            material,
        });
        self.save()?;

        Event::builder(EventType::KeyGenerated)
            .key(kid.clone())
            .detail("alg", alg.jwa_name())
            .emit();
        Ok(kid)
    }

    /// Adds existing key material under `kid`, replacing any key with that id.
    ///
    /// # Errors
    ///
    /// Returns an error if saving fails.
    pub fn import_key(
        &mut self,
        kid: &str,
        alg: KeyAlgorithm,
        material: KeyMaterial,
        expires_at: Option<DateTime<Utc>>,
    ) -> KeyResult<()> {
        if !material.has_private() {
            return Err(KeyError::Crypto(oidc_crypto::CryptoError::InvalidKey(
                "only private keys can be imported".to_string(),
            )));
        }
        self.entries.retain(|entry| entry.kid != kid);
        self.entries.push(KeyEntry {
            kid: kid.to_string(),
            alg,
            key_use: alg.key_use(),
            created_at: Utc::now(),
            expires_at,
            material,
        });
        self.save()
    }

    /// Deletes a key. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if saving fails.
    pub fn delete_key(&mut self, kid: &str) -> KeyResult<bool> {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.kid != kid);
        let deleted = self.entries.len() != before;
        if deleted {
            self.save()?;
            Event::builder(EventType::KeyDeleted).key(kid).emit();
        }
        Ok(deleted)
    }

    /// Selects a non-expired key for `alg`.
    #[must_use]
    pub fn select(
        &self,
        alg: KeyAlgorithm,
        now: DateTime<Utc>,
        strategy: KeySelectionStrategy,
    ) -> Option<&KeyEntry> {
        let candidates = self
            .entries
            .iter()
            .filter(|entry| entry.alg == alg && !entry.is_expired(now));
        match strategy {
            KeySelectionStrategy::Newest => candidates.max_by_key(|entry| entry.created_at),
            KeySelectionStrategy::Oldest => candidates.min_by_key(|entry| entry.created_at),
        }
    }

    /// Exports the public halves of all asymmetric keys.
    #[must_use]
    pub fn public_jwks(&self) -> JsonWebKeySet {
        JsonWebKeySet::with_keys(self.entries.iter().filter_map(KeyEntry::public_jwk).collect())
    }
}

fn generate_material(alg: KeyAlgorithm, rsa_bits: usize) -> KeyResult<KeyMaterial> {
    let material = match alg {
        KeyAlgorithm::Signature(SignatureAlgorithm::None)
        | KeyAlgorithm::Encryption(KeyEncryptionAlgorithm::Dir) => {
            return Err(KeyError::UnsupportedAlgorithm(alg.to_string()));
        }
        KeyAlgorithm::Signature(sig) if sig.is_hmac() => {
            let len = sig.hash_algorithm().map_or(32, |h| h.output_len());
            KeyMaterial::Symmetric(SymmetricKey::new(random::random_key_bytes(len)?))
        }
        KeyAlgorithm::Signature(sig) => match sig.curve() {
            Some(curve) => KeyMaterial::Ec(EcKey::generate(curve)?),
            None => KeyMaterial::Rsa(RsaKey::generate(rsa_bits)?),
        },
        KeyAlgorithm::Encryption(KeyEncryptionAlgorithm::Rsa1_5 | KeyEncryptionAlgorithm::RsaOaep) => {
            KeyMaterial::Rsa(RsaKey::generate(rsa_bits)?)
        }
        KeyAlgorithm::Encryption(enc) => {
            let len = enc.kek_len().unwrap_or(32);
            KeyMaterial::Symmetric(SymmetricKey::new(random::random_key_bytes(len)?))
        }
    };
    Ok(material)
}

fn derive_sealing_key(password: &str, salt: &[u8], iterations: u32) -> KeyResult<LessSafeKey> {
    let iterations = NonZeroU32::new(iterations)
        .ok_or_else(|| KeyError::Serialization("iteration count must be positive".to_string()))?;
    let mut key = [0u8; 32];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        iterations,
        salt,
        password.as_bytes(),
        &mut key,
    );
    let unbound = UnboundKey::new(&AES_256_GCM, &key)
        .map_err(|_| KeyError::Serialization("cannot build sealing key".to_string()))?;
    Ok(LessSafeKey::new(unbound))
}

fn seal(key: &LessSafeKey, plaintext: &[u8], aad: &[u8]) -> KeyResult<Sealed> {
    let nonce_bytes = random::random_key_bytes(NONCE_LEN)?;
    let nonce = Nonce::try_assume_unique_for_key(&nonce_bytes)
        .map_err(|_| KeyError::Serialization("invalid nonce".to_string()))?;
    let mut in_out = plaintext.to_vec();
    key.seal_in_place_append_tag(nonce, Aad::from(aad), &mut in_out)
        .map_err(|_| KeyError::Serialization("sealing failed".to_string()))?;
    Ok(Sealed {
        nonce: b64_encode(&nonce_bytes),
        ciphertext: b64_encode(&in_out),
    })
}

fn unseal(key: &LessSafeKey, sealed: &Sealed, aad: &[u8]) -> KeyResult<Vec<u8>> {
    let nonce_bytes = b64_decode(&sealed.nonce, "nonce")?;
    let nonce = Nonce::try_assume_unique_for_key(&nonce_bytes).map_err(|_| KeyError::Locked)?;
    let mut in_out = b64_decode(&sealed.ciphertext, "ciphertext")?;
    let plaintext = key
        .open_in_place(nonce, Aad::from(aad), &mut in_out)
        .map_err(|_| KeyError::Locked)?;
    Ok(plaintext.to_vec())
}

fn store_entry(key: &LessSafeKey, entry: &KeyEntry) -> KeyResult<StoredEntry> {
    let (kty, crv, secret) = match &entry.material {
        KeyMaterial::Rsa(rsa) => (KeyType::Rsa, None, rsa.to_pkcs8_der()?),
        KeyMaterial::Ec(ec) => {
            let der = ec.pkcs8_der().ok_or_else(|| {
                KeyError::Serialization(format!("EC key {} has no PKCS#8 form", entry.kid))
            })?;
            (KeyType::Ec, Some(ec.curve()), der.to_vec())
        }
        KeyMaterial::Symmetric(secret) => (KeyType::Oct, None, secret.as_bytes().to_vec()),
    };
    Ok(StoredEntry {
        kid: entry.kid.clone(),
        alg: entry.alg.jwa_name().to_string(),
        key_use: entry.key_use,
        kty,
        crv,
        created_at: entry.created_at,
        expires_at: entry.expires_at,
        secret: seal(key, &secret, entry.kid.as_bytes())?,
    })
}

fn restore_entry(key: &LessSafeKey, stored: &StoredEntry) -> KeyResult<KeyEntry> {
    let secret = unseal(key, &stored.secret, stored.kid.as_bytes())?;
    let material = match stored.kty {
        KeyType::Rsa => KeyMaterial::Rsa(RsaKey::from_pkcs8_der(&secret)?),
        KeyType::Ec => {
            let curve = stored.crv.ok_or_else(|| {
                KeyError::Serialization(format!("EC key {} has no curve", stored.kid))
            })?;
            KeyMaterial::Ec(EcKey::from_pkcs8_der(curve, &secret)?)
        }
        KeyType::Oct => KeyMaterial::Symmetric(SymmetricKey::new(secret)),
    };
    Ok(KeyEntry {
        kid: stored.kid.clone(),
        alg: KeyAlgorithm::from_jwa(&stored.alg)?,
        key_use: stored.key_use,
        created_at: stored.created_at,
        expires_at: stored.expires_at,
        material,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    const ITERATIONS: u32 = 1_000;

    #[test]
    fn generated_keys_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keystore.json");

        let mut store = KeyStore::create(&path, "changeit", "CN=Test", ITERATIONS).unwrap();
        let es = store
            .generate_key(KeyAlgorithm::Signature(SignatureAlgorithm::Es256), None, 2048)
            .unwrap();
        let hs = store
            .generate_key(KeyAlgorithm::Signature(SignatureAlgorithm::Hs512), None, 2048)
            .unwrap();

        let reopened = KeyStore::open(&path, "changeit").unwrap();
        assert_eq!(reopened.dn(), "CN=Test");
        assert_eq!(reopened.entries().len(), 2);
        assert!(reopened.contains(&es));
        assert!(es.ends_with("_sig_es256"));
        match &reopened.get(&hs).unwrap().material {
            KeyMaterial::Symmetric(secret) => assert_eq!(secret.len(), 64),
            other => panic!("unexpected material {other:?}"),
        }
    }

    #[test]
    fn wrong_password_is_locked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keystore.json");
        KeyStore::create(&path, "right", "CN=Test", ITERATIONS).unwrap();

        assert!(matches!(KeyStore::open(&path, "wrong"), Err(KeyError::Locked)));
    }

    #[test]
    fn missing_file_is_unavailable() {
        let result = KeyStore::open(Path::new("/nonexistent/keystore.json"), "pw");
        assert!(matches!(result, Err(KeyError::KeyStoreUnavailable(_))));
    }

    #[test]
    fn file_does_not_contain_private_key_bytes_in_clear() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keystore.json");
        let mut store = KeyStore::create(&path, "pw", "CN=Test", ITERATIONS).unwrap();
        let kid = store
            .generate_key(KeyAlgorithm::Signature(SignatureAlgorithm::Hs256), None, 2048)
            .unwrap();
        let KeyMaterial::Symmetric(secret) = &store.get(&kid).unwrap().material else {
            panic!("expected a symmetric key");
        };

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(!contents.contains(&b64_encode(secret.as_bytes())));
    }

    #[test]
    fn selection_skips_expired_keys() {
        let mut store = KeyStore::in_memory("pw", "CN=Test", ITERATIONS).unwrap();
        let alg = KeyAlgorithm::Signature(SignatureAlgorithm::Es384);
        let now = Utc::now();
        let expired = store
            .generate_key(alg, Some(now - Duration::minutes(1)), 2048)
            .unwrap();
        let live = store
            .generate_key(alg, Some(now + Duration::days(1)), 2048)
            .unwrap();

        let selected = store.select(alg, now, KeySelectionStrategy::Oldest).unwrap();
        assert_eq!(selected.kid, live);
        assert!(store.get(&expired).unwrap().is_expired(now));
    }

    #[test]
    fn newest_and_oldest_strategies_differ() {
        let mut store = KeyStore::in_memory("pw", "CN=Test", ITERATIONS).unwrap();
        let alg = KeyAlgorithm::Signature(SignatureAlgorithm::Es256);
        let first = store.generate_key(alg, None, 2048).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = store.generate_key(alg, None, 2048).unwrap();

        let now = Utc::now();
        assert_eq!(store.select(alg, now, KeySelectionStrategy::Newest).unwrap().kid, second);
        assert_eq!(store.select(alg, now, KeySelectionStrategy::Oldest).unwrap().kid, first);
    }

    #[test]
    fn delete_removes_key() {
        let mut store = KeyStore::in_memory("pw", "CN=Test", ITERATIONS).unwrap();
        let kid = store
            .generate_key(KeyAlgorithm::Signature(SignatureAlgorithm::Es256), None, 2048)
            .unwrap();
        assert!(store.delete_key(&kid).unwrap());
        assert!(!store.delete_key(&kid).unwrap());
        assert!(!store.contains(&kid));
    }

    #[test]
    fn public_jwks_omits_symmetric_and_private_parts() {
        let mut store = KeyStore::in_memory("pw", "CN=Test", ITERATIONS).unwrap();
        store
            .generate_key(KeyAlgorithm::Signature(SignatureAlgorithm::Es256), None, 2048)
            .unwrap();
        store
            .generate_key(KeyAlgorithm::Signature(SignatureAlgorithm::Hs256), None, 2048)
            .unwrap();
        store
            .generate_key(KeyAlgorithm::Encryption(KeyEncryptionAlgorithm::RsaOaep), None, 2048)
            .unwrap();

        let jwks = store.public_jwks();
        assert_eq!(jwks.len(), 2);
        assert!(jwks.keys.iter().all(|k| k.d.is_none() && k.k.is_none()));
        let enc = jwks.find_keys_by_alg("RSA-OAEP");
        assert_eq!(enc.len(), 1);
        assert_eq!(enc[0].key_use, Some(KeyUse::Enc));
    }

    #[test]
    fn none_and_dir_cannot_be_generated() {
        let mut store = KeyStore::in_memory("pw", "CN=Test", ITERATIONS).unwrap();
        assert!(matches!(
            store.generate_key(KeyAlgorithm::Signature(SignatureAlgorithm::None), None, 2048),
            Err(KeyError::UnsupportedAlgorithm(_))
        ));
        assert!(matches!(
            store.generate_key(KeyAlgorithm::Encryption(KeyEncryptionAlgorithm::Dir), None, 2048),
            Err(KeyError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn key_algorithm_parses_both_families() {
        assert_eq!(
            KeyAlgorithm::from_jwa("PS384").unwrap(),
            KeyAlgorithm::Signature(SignatureAlgorithm::Ps384)
        );
        assert_eq!(
            KeyAlgorithm::from_jwa("RSA1_5").unwrap(),
            KeyAlgorithm::Encryption(KeyEncryptionAlgorithm::Rsa1_5)
        );
        assert!(KeyAlgorithm::from_jwa("XYZ").is_err());
    }
}
