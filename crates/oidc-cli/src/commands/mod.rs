//! Command implementations.

pub mod keys;
pub mod secret;
pub mod token;

pub use keys::{delete_key, export_jwks, generate_key, list_keys};
pub use secret::generate_secret;
pub use token::decode_token;

use crate::cli::{Cli, Command};
use crate::config::ToolConfig;
use crate::error::CliResult;

/// Dispatches a parsed command line.
///
/// # Errors
///
/// Returns the error of the executed command.
pub async fn run(cli: Cli, config: &ToolConfig) -> CliResult<()> {
    let format = cli.output;
    match cli.command {
        Command::GenerateKey { algorithm, expires_in_days, rsa_bits } => {
            generate_key(config, &algorithm, expires_in_days, rsa_bits, format)
        }
        Command::DeleteKey { kid } => delete_key(config, &kid),
        Command::List => list_keys(config, format),
        Command::ExportJwks { out } => export_jwks(config, out.as_deref(), format),
        Command::DecodeToken { token, verify, jwks_url } => {
            decode_token(config, &token, verify, jwks_url.as_deref(), format).await
        }
        Command::GenerateSecret { length, format: encoding } => generate_secret(length, &encoding),
    }
}
