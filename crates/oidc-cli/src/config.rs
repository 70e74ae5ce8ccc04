//! Configuration resolution for the key tool.

use std::path::{Path, PathBuf};

use oidc_core::Config;
use oidc_keystore::KeyStore;

use crate::cli::Cli;
use crate::error::{CliError, CliResult};

/// Returns `<config dir>/oidc/config.toml`.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|dir| dir.join("oidc").join("config.toml"))
}

/// Server configuration plus command-line overrides.
#[derive(Debug, Clone)]
pub struct ToolConfig {
    /// Loaded server configuration.
    pub server: Config,
}

impl ToolConfig {
    /// Loads the configuration named on the command line, or the default
    /// file when it exists, and applies the key store overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be loaded or is invalid.
    pub fn resolve(cli: &Cli) -> CliResult<Self> {
        let path = cli.config.clone().or_else(|| default_config_path().filter(|p| p.exists()));
        let mut server = Config::load(path.as_deref())?;
        if let Some(keystore) = &cli.keystore {
            server.keys.keystore_path = Some(keystore.clone());
        }
        if let Some(password) = &cli.password {
            server.keys.keystore_password = Some(password.clone());
        }
        Ok(Self { server })
    }

    /// Wraps an already loaded configuration.
    #[must_use]
    pub const fn from_config(server: Config) -> Self {
        Self { server }
    }

    fn keystore_location(&self) -> CliResult<(&Path, &str)> {
        let path = self
            .server
            .keys
            .keystore_path
            .as_deref()
            .ok_or_else(|| CliError::InvalidArgument("no key store path configured (use --keystore)".to_string()))?;
        let password = self
            .server
            .keys
            .keystore_password
            .as_deref()
            .ok_or_else(|| CliError::InvalidArgument("no key store password configured (use --password)".to_string()))?;
        Ok((path, password))
    }

    /// Opens the configured key store.
    ///
    /// # Errors
    ///
    /// Returns an error if no store is configured or it cannot be opened.
    pub fn open_keystore(&self) -> CliResult<KeyStore> {
        let (path, password) = self.keystore_location()?;
        if !path.exists() {
            return Err(CliError::NotFound {
                resource_type: "key store".to_string(),
                id: path.display().to_string(),
            });
        }
        Ok(KeyStore::open(path, password)?)
    }

    /// Opens the configured key store, creating it when missing.
    ///
    /// # Errors
    ///
    /// Returns an error if no store is configured or it cannot be opened.
    pub fn open_or_create_keystore(&self) -> CliResult<KeyStore> {
        let (path, password) = self.keystore_location()?;
        let keys = &self.server.keys;
        Ok(KeyStore::open_or_create(path, password, &keys.keystore_dn, keys.kdf_iterations)?)
    }
}
