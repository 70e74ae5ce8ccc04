//! Configuration errors.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for configuration loading.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Error raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read configuration file {path}: {source}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for this schema.
    #[error("invalid configuration file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A setting has an invalid value.
    #[error("invalid value for {key}: {message}")]
    InvalidValue {
        /// Setting name (file key or environment variable).
        key: String,
        /// What is wrong with it.
        message: String,
    },
}

impl ConfigError {
    /// Creates an [`ConfigError::InvalidValue`].
    pub fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_value_names_the_key() {
        let error = ConfigError::invalid("OIDC_RSA_KEY_SIZE", "must be at least 2048");
        assert_eq!(
            error.to_string(),
            "invalid value for OIDC_RSA_KEY_SIZE: must be at least 2048"
        );
    }
}
