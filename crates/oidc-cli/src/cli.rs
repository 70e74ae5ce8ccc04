//! CLI argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// oidc-keytool - key store and token utilities.
#[derive(Debug, Parser)]
#[command(name = "oidc-keytool")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (defaults to the user config directory).
    #[arg(short, long, env = "OIDC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Key store file (overrides config).
    #[arg(short, long, env = "OIDC_KEYSTORE_PATH")]
    pub keystore: Option<PathBuf>,

    /// Key store password (overrides config).
    #[arg(long, env = "OIDC_KEYSTORE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Output format.
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: OutputFormat,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON format.
    Json,
    /// Quiet (identifiers only).
    Quiet,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate a key in the key store.
    GenerateKey {
        /// JWA algorithm (RS256, PS384, ES512, RSA-OAEP, ...).
        #[arg(short, long, default_value = "RS256")]
        algorithm: String,

        /// Days until the key expires.
        #[arg(long)]
        expires_in_days: Option<i64>,

        /// RSA modulus size (overrides config).
        #[arg(long)]
        rsa_bits: Option<usize>,
    },

    /// Delete a key from the key store.
    DeleteKey {
        /// Key id.
        kid: String,
    },

    /// List the keys in the key store.
    List,

    /// Export the public keys as a JWK Set.
    ExportJwks {
        /// Write to this file instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Decode a compact JWS or JWE.
    DecodeToken {
        /// The token to decode.
        token: String,

        /// Verify the signature.
        #[arg(long)]
        verify: bool,

        /// JWKS URL for signature verification (defaults to the local key store).
        #[arg(long)]
        jwks_url: Option<String>,
    },

    /// Generate a random secret.
    GenerateSecret {
        /// Length in bytes.
        #[arg(short, long, default_value = "32")]
        length: usize,

        /// Output format (hex, base64, alphanumeric).
        #[arg(short, long, default_value = "base64")]
        format: String,
    },
}
