//! Token inspection.

use chrono::{DateTime, Utc};
use oidc_crypto::{CompactJwe, CompactJws, JoseHeader, SignatureAlgorithm, segment_count};
use oidc_keystore::DefaultKeyProvider;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::cli::OutputFormat;
use crate::config::ToolConfig;
use crate::error::{CliError, CliResult};
use crate::output::{error, info, output_document, success};

/// Decoded view of a compact token.
#[derive(Debug, Clone, Serialize)]
pub struct DecodedToken {
    /// Outer protected header.
    pub header: JoseHeader,
    /// Signature header of a nested token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inner_header: Option<JoseHeader>,
    /// Payload, when readable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    /// Whether the signature was checked.
    pub verified: bool,
}

impl DecodedToken {
    /// Decodes `token` without checking its signature. Encrypted tokens
    /// expose their header only.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not a compact JWS or JWE.
    pub fn inspect(token: &str) -> CliResult<Self> {
        let jws = match segment_count(token) {
            3 => CompactJws::parse(token)?,
            2 => CompactJws::parse_unsecured(token)?,
            5 => {
                return Ok(Self {
                    header: CompactJwe::parse(token)?.header()?,
                    inner_header: None,
                    payload: None,
                    verified: false,
                });
            }
            n => {
                return Err(CliError::InvalidArgument(format!(
                    "expected a compact token with 3 or 5 segments, found {n}"
                )));
            }
        };
        let payload = serde_json::from_slice(jws.payload())
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(jws.payload()).into_owned()));
        Ok(Self {
            header: jws.header().clone(),
            inner_header: None,
            payload: Some(payload),
            verified: false,
        })
    }

    fn claims(&self) -> Option<&Map<String, Value>> {
        self.payload.as_ref().and_then(Value::as_object)
    }
}

/// Decodes a token and optionally verifies it against the local key store
/// or a JWKS URL.
///
/// Encrypted tokens are only readable with `--verify` and a key store that
/// holds the recipient key.
///
/// # Errors
///
/// Returns an error if the token is malformed or verification fails.
pub async fn decode_token(
    config: &ToolConfig,
    token: &str,
    verify: bool,
    jwks_url: Option<&str>,
    format: OutputFormat,
) -> CliResult<()> {
    let decoded = if verify {
        let keys = &config.server.keys;
        let provider = match jwks_url {
            Some(url) => {
                info(&format!("Fetching JWKS from: {url}"));
                DefaultKeyProvider::new().with_jwks_uri(url, keys.jwks_timeout(), keys.jwks_cache_ttl())?
            }
            None => DefaultKeyProvider::from_config(keys)?,
        };
        let accepted: Vec<SignatureAlgorithm> = SignatureAlgorithm::ALL
            .into_iter()
            .filter(|alg| *alg != SignatureAlgorithm::None)
            .collect();
        let jwt = oidc_protocol::request_object::decode(token, &provider, &accepted).await?;
        DecodedToken {
            header: jwt.header,
            inner_header: jwt.inner_header,
            payload: Some(Value::Object(jwt.claims)),
            verified: true,
        }
    } else {
        DecodedToken::inspect(token)?
    };

    output_document("Token", &decoded, format)?;
    if format == OutputFormat::Table {
        report_times(&decoded);
        if decoded.verified {
            success("Signature verified");
        } else if decoded.payload.is_none() {
            info("Token is encrypted; use --verify with the recipient key store to decrypt");
        }
    }
    Ok(())
}

fn report_times(decoded: &DecodedToken) {
    let Some(claims) = decoded.claims() else {
        return;
    };
    if let Some(exp) = claims.get("exp").and_then(Value::as_i64) {
        if exp < Utc::now().timestamp() {
            error(&format!("Token EXPIRED at: {}", format_timestamp(exp)));
        } else {
            info(&format!("Token expires at: {}", format_timestamp(exp)));
        }
    }
    if let Some(iat) = claims.get("iat").and_then(Value::as_i64) {
        info(&format!("Token issued at: {}", format_timestamp(iat)));
    }
}

fn format_timestamp(secs: i64) -> String {
    DateTime::from_timestamp(secs, 0)
        .map_or_else(|| "invalid timestamp".to_string(), |dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
}
