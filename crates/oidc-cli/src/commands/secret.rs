//! Secret generation.

use std::fmt::Write;

use base64::Engine;
use oidc_crypto::random::{random_alphanumeric, random_key_bytes};

use crate::error::{CliError, CliResult};

/// Prints a random secret of `length` bytes (characters for `alphanumeric`).
///
/// # Errors
///
/// Returns [`CliError::InvalidArgument`] for an unknown format or zero length.
pub fn generate_secret(length: usize, format: &str) -> CliResult<()> {
    println!("{}", encode_secret(length, format)?);
    Ok(())
}

fn encode_secret(length: usize, format: &str) -> CliResult<String> {
    if length == 0 {
        return Err(CliError::InvalidArgument("length must be at least 1".to_string()));
    }
    match format.to_lowercase().as_str() {
        "hex" => Ok(hex_encode(&random_key_bytes(length)?)),
        "base64" => Ok(base64::engine::general_purpose::STANDARD.encode(random_key_bytes(length)?)),
        "base64url" => Ok(oidc_crypto::b64_encode(&random_key_bytes(length)?)),
        "alphanumeric" => Ok(random_alphanumeric(length)),
        _ => Err(CliError::InvalidArgument(format!(
            "unknown format: {format}. Supported: hex, base64, base64url, alphanumeric"
        ))),
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}
