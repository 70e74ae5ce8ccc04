//! Configuration management.
//!
//! Configuration is read from a TOML file and then overlaid with `OIDC_*`
//! environment variables. Every section has defaults, so an empty file is a
//! valid configuration. Structs are passed explicitly to the components that
//! need them.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use oidc_crypto::SignatureAlgorithm;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "OIDC_";

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Key material configuration.
    pub keys: KeyConfig,
    /// Request object validation policy.
    pub request_object: RequestObjectConfig,
    /// Token lifetimes and issuer.
    pub tokens: TokenConfig,
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,
}

/// Which key to pick when several keys match an algorithm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySelectionStrategy {
    /// Most recently created non-expired key.
    #[default]
    Newest,
    /// Least recently created non-expired key.
    Oldest,
}

/// Key store and JWKS configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    /// Path of the password-protected key store file.
    pub keystore_path: Option<PathBuf>,
    /// Key store password.
    #[serde(skip_serializing)]
    pub keystore_password: Option<String>,
    /// Distinguished name recorded in the key store.
    pub keystore_dn: String,
    /// Remote JWKS document used for key lookup.
    pub jwks_uri: Option<String>,
    /// JWKS request timeout in seconds.
    pub jwks_timeout_secs: u64,
    /// How long fetched JWKS documents are cached, in seconds.
    pub jwks_cache_ttl_secs: u64,
    /// RSA modulus size for generated keys.
    pub rsa_key_size: usize,
    /// PBKDF2 iterations protecting the key store.
    pub kdf_iterations: u32,
    /// Key selection when several keys share an algorithm.
    pub selection_strategy: KeySelectionStrategy,
}

/// Request object validation policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestObjectConfig {
    /// Signature algorithms accepted on request objects.
    pub allowed_signing_algs: Vec<SignatureAlgorithm>,
    /// Accept unsigned (`alg=none`) request objects. `none` must also be listed
    /// in `allowed_signing_algs`.
    pub allow_unsigned: bool,
    /// Reject request objects that are not encrypted.
    pub require_encryption: bool,
    /// Apply FAPI restrictions.
    pub fapi: bool,
    /// Maximum distance of `exp` into the future under FAPI, in minutes.
    pub max_exp_minutes: i64,
    /// Maximum age of `nbf` under FAPI, in minutes.
    pub max_nbf_age_minutes: i64,
    /// `request_uri` fetch timeout in seconds.
    pub request_uri_timeout_secs: u64,
    /// Substrings that make a `request_uri` unacceptable.
    pub request_uri_blocklist: Vec<String>,
}

/// Token configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Issuer identifier.
    pub issuer: String,
    /// Access token lifespan in seconds.
    pub access_token_lifespan: i64,
    /// Refresh token lifespan in seconds.
    pub refresh_token_lifespan: i64,
    /// ID token lifespan in seconds.
    pub id_token_lifespan: i64,
    /// Authorization code lifespan in seconds.
    pub auth_code_lifespan: i64,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            keystore_path: None,
            keystore_password: None,
            keystore_dn: "CN=OIDC Keystore".to_string(),
            jwks_uri: None,
            jwks_timeout_secs: 10,
            jwks_cache_ttl_secs: 300,
            rsa_key_size: 2048,
            kdf_iterations: 210_000,
            selection_strategy: KeySelectionStrategy::Newest,
        }
    }
}

impl Default for RequestObjectConfig {
    fn default() -> Self {
        Self {
            allowed_signing_algs: SignatureAlgorithm::ALL
                .into_iter()
                .filter(|alg| *alg != SignatureAlgorithm::None)
                .collect(),
            allow_unsigned: false,
            require_encryption: false,
            fapi: false,
            max_exp_minutes: 60,
            max_nbf_age_minutes: 60,
            request_uri_timeout_secs: 10,
            request_uri_blocklist: Vec::new(),
        }
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            issuer: "http://localhost:8080".to_string(),
            access_token_lifespan: 300,    // 5 minutes
            refresh_token_lifespan: 1_800, // 30 minutes
            id_token_lifespan: 300,        // 5 minutes
            auth_code_lifespan: 60,        // 1 minute
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml(&contents)?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid TOML for this schema.
    pub fn from_toml(contents: &str) -> ConfigResult<Self> {
        let mut config: Self = toml::from_str(contents)?;
        config.normalize();
        Ok(config)
    }

    /// Loads configuration from defaults overlaid with environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable has an unparsable value.
    pub fn from_env() -> ConfigResult<Self> {
        let mut config = Self::default();
        config.normalize();
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the file (when given) and overlays environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if loading or validation fails.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let mut config = Self::default();
                config.normalize();
                config
            }
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Creates a configuration for testing: fast key derivation, short timeouts.
    #[must_use]
    pub fn for_testing() -> Self {
        let mut config = Self::default();
        config.normalize();
        config.keys.kdf_iterations = 1_000;
        config.keys.jwks_timeout_secs = 2;
        config.keys.keystore_password = Some("test-password".to_string());
        config.request_object.request_uri_timeout_secs = 2;
        config.log_level = "debug".to_string();
        config
    }

    /// Overlays settings from `OIDC_*` variables resolved through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable has an unparsable value.
    pub fn apply_env<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(path) = var("KEYSTORE_PATH") {
            self.keys.keystore_path = Some(PathBuf::from(path));
        }
        if let Some(password) = var("KEYSTORE_PASSWORD") {
            self.keys.keystore_password = Some(password);
        }
        if let Some(dn) = var("KEYSTORE_DN") {
            self.keys.keystore_dn = dn;
        }
        if let Some(uri) = var("JWKS_URI") {
            self.keys.jwks_uri = Some(uri);
        }
        parse_into(&var, "JWKS_TIMEOUT_SECS", &mut self.keys.jwks_timeout_secs)?;
        parse_into(&var, "JWKS_CACHE_TTL_SECS", &mut self.keys.jwks_cache_ttl_secs)?;
        parse_into(&var, "RSA_KEY_SIZE", &mut self.keys.rsa_key_size)?;
        parse_into(&var, "KDF_ITERATIONS", &mut self.keys.kdf_iterations)?;
        if let Some(strategy) = var("KEY_SELECTION") {
            self.keys.selection_strategy = match strategy.to_ascii_lowercase().as_str() {
                "newest" => KeySelectionStrategy::Newest,
                "oldest" => KeySelectionStrategy::Oldest,
                other => {
                    return Err(ConfigError::invalid(
                        "OIDC_KEY_SELECTION",
                        format!("unknown strategy {other}"),
                    ));
                }
            };
        }

        if let Some(algs) = var("ALLOWED_SIGNING_ALGS") {
            self.request_object.allowed_signing_algs = algs
                .split(',')
                .map(str::trim)
                .filter(|alg| !alg.is_empty())
                .map(|alg| {
                    SignatureAlgorithm::from_jwa(alg)
                        .map_err(|e| ConfigError::invalid("OIDC_ALLOWED_SIGNING_ALGS", e.to_string()))
                })
                .collect::<ConfigResult<_>>()?;
        }
        parse_flag(&var, "ALLOW_UNSIGNED", &mut self.request_object.allow_unsigned);
        parse_flag(&var, "REQUIRE_ENCRYPTION", &mut self.request_object.require_encryption);
        parse_flag(&var, "FAPI", &mut self.request_object.fapi);
        parse_into(&var, "MAX_EXP_MINUTES", &mut self.request_object.max_exp_minutes)?;
        parse_into(&var, "MAX_NBF_AGE_MINUTES", &mut self.request_object.max_nbf_age_minutes)?;
        parse_into(
            &var,
            "REQUEST_URI_TIMEOUT_SECS",
            &mut self.request_object.request_uri_timeout_secs,
        )?;
        if let Some(blocklist) = var("REQUEST_URI_BLOCKLIST") {
            self.request_object.request_uri_blocklist = blocklist
                .split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(issuer) = var("ISSUER") {
            self.tokens.issuer = issuer;
        }
        parse_into(&var, "ACCESS_TOKEN_LIFESPAN", &mut self.tokens.access_token_lifespan)?;
        parse_into(&var, "REFRESH_TOKEN_LIFESPAN", &mut self.tokens.refresh_token_lifespan)?;
        parse_into(&var, "ID_TOKEN_LIFESPAN", &mut self.tokens.id_token_lifespan)?;
        parse_into(&var, "AUTH_CODE_LIFESPAN", &mut self.tokens.auth_code_lifespan)?;

        if let Some(level) = var("LOG_LEVEL") {
            self.log_level = level;
        }
        Ok(())
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.keys.rsa_key_size < oidc_crypto::keys::MIN_RSA_BITS {
            return Err(ConfigError::invalid(
                "keys.rsa_key_size",
                format!("must be at least {}", oidc_crypto::keys::MIN_RSA_BITS),
            ));
        }
        if self.keys.kdf_iterations == 0 {
            return Err(ConfigError::invalid("keys.kdf_iterations", "must be positive"));
        }
        for (key, value) in [
            ("tokens.access_token_lifespan", self.tokens.access_token_lifespan),
            ("tokens.refresh_token_lifespan", self.tokens.refresh_token_lifespan),
            ("tokens.id_token_lifespan", self.tokens.id_token_lifespan),
            ("tokens.auth_code_lifespan", self.tokens.auth_code_lifespan),
        ] {
            if value <= 0 {
                return Err(ConfigError::invalid(key, "must be positive"));
            }
        }
        Ok(())
    }

    fn normalize(&mut self) {
        if self.log_level.is_empty() {
            self.log_level = "info".to_string();
        }
    }
}

impl KeyConfig {
    /// Returns the JWKS request timeout.
    #[must_use]
    pub const fn jwks_timeout(&self) -> Duration {
        Duration::from_secs(self.jwks_timeout_secs)
    }

    /// Returns the JWKS cache lifetime.
    #[must_use]
    pub const fn jwks_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.jwks_cache_ttl_secs)
    }
}

impl RequestObjectConfig {
    /// Returns the signature algorithms actually accepted.
    ///
    /// `none` survives only when `allow_unsigned` is set and it is listed.
    /// FAPI additionally removes `none` and the `RS*` family.
    #[must_use]
    pub fn accepted_signing_algs(&self) -> Vec<SignatureAlgorithm> {
        self.allowed_signing_algs
            .iter()
            .copied()
            .filter(|alg| *alg != SignatureAlgorithm::None || (self.allow_unsigned && !self.fapi))
            .filter(|alg| !(self.fapi && alg.is_rsa() && !alg.is_pss()))
            .collect()
    }

    /// Returns whether unsigned request objects are accepted.
    #[must_use]
    pub fn accepts_unsigned(&self) -> bool {
        self.accepted_signing_algs().contains(&SignatureAlgorithm::None)
    }

    /// Returns the `request_uri` fetch timeout.
    #[must_use]
    pub const fn request_uri_timeout(&self) -> Duration {
        Duration::from_secs(self.request_uri_timeout_secs)
    }
}

fn parse_into<T, F>(var: &F, name: &str, target: &mut T) -> ConfigResult<()>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = var(name) {
        *target = raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::invalid(format!("{ENV_PREFIX}{name}"), format!("cannot parse {raw:?}")))?;
    }
    Ok(())
}

fn parse_flag<F>(var: &F, name: &str, target: &mut bool)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = var(name) {
        *target = raw.eq_ignore_ascii_case("true") || raw == "1";
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_exclude_none() {
        let config = Config::default();
        assert!(!config.request_object.accepts_unsigned());
        assert_eq!(config.request_object.accepted_signing_algs().len(), 12);
        assert_eq!(config.keys.rsa_key_size, 2048);
        assert_eq!(config.tokens.refresh_token_lifespan, 1_800);
    }

    #[test]
    fn none_needs_flag_and_listing() {
        let mut config = RequestObjectConfig::default();
        config.allow_unsigned = true;
        assert!(!config.accepts_unsigned());

        config.allowed_signing_algs.push(SignatureAlgorithm::None);
        assert!(config.accepts_unsigned());

        config.fapi = true;
        assert!(!config.accepts_unsigned());
    }

    #[test]
    fn fapi_drops_pkcs1_rsa() {
        let config = RequestObjectConfig {
            fapi: true,
            ..RequestObjectConfig::default()
        };
        let accepted = config.accepted_signing_algs();
        assert!(!accepted.contains(&SignatureAlgorithm::Rs256));
        assert!(accepted.contains(&SignatureAlgorithm::Ps256));
        assert!(accepted.contains(&SignatureAlgorithm::Es256));
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
log_level = "debug"

[keys]
jwks_uri = "https://op.example.com/jwks"
selection_strategy = "oldest"

[request_object]
allowed_signing_algs = ["RS256", "ES256"]
fapi = true

[tokens]
issuer = "https://op.example.com"
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.keys.jwks_uri.as_deref(), Some("https://op.example.com/jwks"));
        assert_eq!(config.keys.selection_strategy, KeySelectionStrategy::Oldest);
        assert_eq!(config.tokens.issuer, "https://op.example.com");
        assert_eq!(config.tokens.access_token_lifespan, 300);
        assert_eq!(
            config.request_object.accepted_signing_algs(),
            vec![SignatureAlgorithm::Es256]
        );
    }

    #[test]
    fn env_overlays_settings() {
        let mut config = Config::default();
        config
            .apply_env(lookup(&[
                ("OIDC_ISSUER", "https://issuer.example"),
                ("OIDC_ALLOWED_SIGNING_ALGS", "HS256, none"),
                ("OIDC_ALLOW_UNSIGNED", "true"),
                ("OIDC_ACCESS_TOKEN_LIFESPAN", "120"),
                ("OIDC_REQUEST_URI_BLOCKLIST", "localhost,127.0.0.1"),
            ]))
            .unwrap();

        assert_eq!(config.tokens.issuer, "https://issuer.example");
        assert_eq!(config.tokens.access_token_lifespan, 120);
        assert!(config.request_object.accepts_unsigned());
        assert_eq!(
            config.request_object.request_uri_blocklist,
            vec!["localhost".to_string(), "127.0.0.1".to_string()]
        );
    }

    #[test]
    fn unparsable_env_value_is_rejected() {
        let mut config = Config::default();
        let result = config.apply_env(lookup(&[("OIDC_RSA_KEY_SIZE", "big")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn small_rsa_size_fails_validation() {
        let mut config = Config::for_testing();
        config.keys.rsa_key_size = 1024;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = Config::from_file(Path::new("/nonexistent/oidc.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
