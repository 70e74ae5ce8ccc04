//! Validated JWT with uniform claim accessors.

use oidc_crypto::JoseHeader;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// A token whose signature or encryption has been checked.
///
/// `header` is the outermost header. For a nested token (signed then
/// encrypted) `inner_header` holds the signature header.
#[derive(Debug, Clone)]
pub struct Jwt {
    /// Outermost protected header.
    pub header: JoseHeader,
    /// Header of the nested JWS, for signed-then-encrypted tokens.
    pub inner_header: Option<JoseHeader>,
    /// Claim set.
    pub claims: Map<String, Value>,
    /// Compact form as received.
    pub raw: String,
}

impl Jwt {
    /// Creates a token from its parts.
    #[must_use]
    pub fn new(header: JoseHeader, claims: Map<String, Value>, raw: impl Into<String>) -> Self {
        Self {
            header,
            inner_header: None,
            claims,
            raw: raw.into(),
        }
    }

    /// Returns the key id the token was protected with, preferring the
    /// signature header of a nested token.
    #[must_use]
    pub fn key_id(&self) -> Option<&str> {
        self.inner_header
            .as_ref()
            .and_then(|h| h.kid.as_deref())
            .or(self.header.kid.as_deref())
    }

    /// Returns whether the token was encrypted.
    #[must_use]
    pub const fn is_encrypted(&self) -> bool {
        self.header.is_encrypted()
    }

    /// Returns a claim by name.
    ///
    /// A name that is not a top-level member is resolved as a dotted path,
    /// so `address.country` reaches into the `address` object.
    #[must_use]
    pub fn get_claim(&self, name: &str) -> Option<&Value> {
        if let Some(value) = self.claims.get(name) {
            return Some(value);
        }
        let mut segments = name.split('.');
        let mut current = self.claims.get(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Returns a claim as a string. Numbers and booleans are rendered as
    /// their JSON text; objects and arrays yield `None`.
    #[must_use]
    pub fn get_claim_as_string(&self, name: &str) -> Option<String> {
        match self.get_claim(name)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Returns a claim as a JSON object. A string member holding JSON object
    /// text is parsed.
    #[must_use]
    pub fn get_claim_as_json(&self, name: &str) -> Option<Map<String, Value>> {
        match self.get_claim(name)? {
            Value::Object(object) => Some(object.clone()),
            Value::String(text) => serde_json::from_str(text).ok(),
            _ => None,
        }
    }

    /// Returns a claim as an integer. Numeric strings are accepted.
    #[must_use]
    pub fn get_claim_as_i64(&self, name: &str) -> Option<i64> {
        match self.get_claim(name)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Returns a claim as a list of strings. A space-delimited string is
    /// split.
    #[must_use]
    pub fn get_claim_as_list(&self, name: &str) -> Option<Vec<String>> {
        match self.get_claim(name)? {
            Value::String(s) => Some(s.split_whitespace().map(str::to_string).collect()),
            Value::Array(items) => items.iter().map(|v| v.as_str().map(str::to_string)).collect(),
            _ => None,
        }
    }

    /// Returns whether the claim is present.
    #[must_use]
    pub fn has_claim(&self, name: &str) -> bool {
        self.get_claim(name).is_some()
    }

    /// Returns the names in `names` that are absent.
    ///
    /// Reports presence only; what to do about a missing essential claim is
    /// up to the caller.
    #[must_use]
    pub fn missing_claims<'a, I>(&self, names: I) -> Vec<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        names.into_iter().filter(|name| !self.has_claim(name)).collect()
    }

    /// Returns whether `aud` is or contains `audience`.
    #[must_use]
    pub fn audience_contains(&self, audience: &str) -> bool {
        match self.claims.get("aud") {
            Some(Value::String(aud)) => aud == audience,
            Some(Value::Array(items)) => items.iter().any(|v| v.as_str() == Some(audience)),
            _ => false,
        }
    }

    /// Deserializes the claim set into a typed structure.
    ///
    /// # Errors
    ///
    /// Returns an error if the claims do not fit `T`.
    pub fn claims_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.claims.clone()))
    }
}
