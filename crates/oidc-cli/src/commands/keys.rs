//! Key store commands.

use std::path::Path;

use chrono::{Duration, Utc};
use oidc_crypto::KeyUse;
use oidc_keystore::{KeyAlgorithm, KeyEntry};
use serde::Serialize;
use tabled::Tabled;

use crate::cli::OutputFormat;
use crate::config::ToolConfig;
use crate::error::{CliError, CliResult};
use crate::output::{output, output_document, success, warning};

/// Key store entry for display.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct KeyRow {
    /// Key id.
    #[tabled(rename = "Key ID")]
    pub kid: String,
    /// JWA algorithm.
    #[tabled(rename = "Algorithm")]
    pub alg: String,
    /// `sig` or `enc`.
    #[tabled(rename = "Use")]
    pub key_use: String,
    /// Creation time.
    #[tabled(rename = "Created")]
    pub created_at: String,
    /// Expiration time or `-`.
    #[tabled(rename = "Expires")]
    pub expires_at: String,
    /// Whether the key is expired.
    #[tabled(rename = "Expired")]
    pub expired: bool,
}

impl KeyRow {
    fn from_entry(entry: &KeyEntry) -> Self {
        Self {
            kid: entry.kid.clone(),
            alg: entry.alg.jwa_name().to_string(),
            key_use: match entry.key_use {
                KeyUse::Sig => "sig",
                KeyUse::Enc => "enc",
            }
            .to_string(),
            created_at: entry.created_at.to_rfc3339(),
            expires_at: entry.expires_at.map_or_else(|| "-".to_string(), |exp| exp.to_rfc3339()),
            expired: entry.is_expired(Utc::now()),
        }
    }
}

/// Generates a key and prints its id.
///
/// # Errors
///
/// Returns an error for unknown algorithms or if the store cannot be saved.
pub fn generate_key(
    config: &ToolConfig,
    algorithm: &str,
    expires_in_days: Option<i64>,
    rsa_bits: Option<usize>,
    format: OutputFormat,
) -> CliResult<()> {
    let alg = KeyAlgorithm::from_jwa(algorithm)?;
    if let Some(days) = expires_in_days
        && days <= 0
    {
        return Err(CliError::InvalidArgument(format!("expires-in-days must be positive, got {days}")));
    }
    let expires_at = expires_in_days.map(|days| Utc::now() + Duration::days(days));
    let bits = rsa_bits.unwrap_or(config.server.keys.rsa_key_size);

    let mut store = config.open_or_create_keystore()?;
    let kid = store.generate_key(alg, expires_at, bits)?;
    tracing::debug!(kid = %kid, alg = %alg, "key generated");

    match (format, store.get(&kid)) {
        (OutputFormat::Quiet, _) => println!("{kid}"),
        (OutputFormat::Json, Some(entry)) => output_document("Key", &KeyRow::from_entry(entry), format)?,
        _ => success(&format!("Generated {alg} key '{kid}'")),
    }
    Ok(())
}

/// Deletes a key.
///
/// # Errors
///
/// Returns [`CliError::NotFound`] if no key has that id.
pub fn delete_key(config: &ToolConfig, kid: &str) -> CliResult<()> {
    let mut store = config.open_keystore()?;
    if !store.delete_key(kid)? {
        return Err(CliError::NotFound {
            resource_type: "key".to_string(),
            id: kid.to_string(),
        });
    }
    success(&format!("Deleted key '{kid}'"));
    Ok(())
}

/// Lists the keys in the store.
///
/// # Errors
///
/// Returns an error if the store cannot be opened.
pub fn list_keys(config: &ToolConfig, format: OutputFormat) -> CliResult<()> {
    let store = config.open_keystore()?;
    let rows: Vec<KeyRow> = store.entries().iter().map(KeyRow::from_entry).collect();
    let expired = rows.iter().filter(|row| row.expired).count();
    output(&rows, format, |row| &row.kid)?;
    if expired > 0 && format == OutputFormat::Table {
        warning(&format!("{expired} expired key(s) are no longer published"));
    }
    Ok(())
}

/// Writes the public JWK Set to `out` or stdout.
///
/// # Errors
///
/// Returns an error if the store cannot be opened or the file written.
pub fn export_jwks(config: &ToolConfig, out: Option<&Path>, format: OutputFormat) -> CliResult<()> {
    let store = config.open_keystore()?;
    let jwks = store.public_jwks();
    match out {
        Some(path) => {
            std::fs::write(path, serde_json::to_string_pretty(&jwks)?)?;
            success(&format!("Exported {} key(s) to {}", jwks.len(), path.display()));
        }
        None => output_document("JWK Set", &jwks, format)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use oidc_core::Config;
    use oidc_crypto::JsonWebKeySet;

    fn tool_config(dir: &Path) -> ToolConfig {
        let mut server = Config::for_testing();
        server.keys.keystore_path = Some(dir.join("keys.json"));
        ToolConfig::from_config(server)
    }

    #[test]
    fn generate_list_delete() {
        let dir = tempfile::tempdir().unwrap();
        let config = tool_config(dir.path());

        generate_key(&config, "ES256", Some(30), None, OutputFormat::Quiet).unwrap();
        generate_key(&config, "RSA-OAEP", None, Some(2048), OutputFormat::Quiet).unwrap();

        let store = config.open_keystore().unwrap();
        assert_eq!(store.entries().len(), 2);
        let rows: Vec<KeyRow> = store.entries().iter().map(KeyRow::from_entry).collect();
        assert_eq!(rows[0].alg, "ES256");
        assert_eq!(rows[0].key_use, "sig");
        assert_ne!(rows[0].expires_at, "-");
        assert_eq!(rows[1].key_use, "enc");
        assert_eq!(rows[1].expires_at, "-");

        let kid = rows[0].kid.clone();
        delete_key(&config, &kid).unwrap();
        assert!(!config.open_keystore().unwrap().contains(&kid));
        assert!(matches!(delete_key(&config, &kid), Err(CliError::NotFound { .. })));
    }

    #[test]
    fn rejects_unknown_algorithm_and_bad_expiry() {
        let dir = tempfile::tempdir().unwrap();
        let config = tool_config(dir.path());
        assert!(matches!(
            generate_key(&config, "XS999", None, None, OutputFormat::Quiet),
            Err(CliError::Key(_))
        ));
        assert!(matches!(
            generate_key(&config, "ES256", Some(0), None, OutputFormat::Quiet),
            Err(CliError::InvalidArgument(_))
        ));
    }

    #[test]
    fn exported_jwks_has_no_private_members() {
        let dir = tempfile::tempdir().unwrap();
        let config = tool_config(dir.path());
        generate_key(&config, "PS256", None, Some(2048), OutputFormat::Quiet).unwrap();

        let out = dir.path().join("jwks.json");
        export_jwks(&config, Some(&out), OutputFormat::Table).unwrap();
        let text = std::fs::read_to_string(&out).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        let key = &value["keys"][0];
        assert_eq!(key["kty"], "RSA");
        assert!(key.get("d").is_none());
        assert!(serde_json::from_str::<JsonWebKeySet>(&text).is_ok());
    }
}
