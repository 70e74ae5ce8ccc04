//! Claims model.
//!
//! Implements the claims request parameter of `OpenID` Connect Core 1.0,
//! section 5.5, the ID Token claim set and the release of subject claims
//! into ID Tokens and `UserInfo` responses.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Members of the structured `address` claim.
pub const ADDRESS_MEMBERS: [&str; 6] = [
    "formatted",
    "street_address",
    "locality",
    "region",
    "postal_code",
    "country",
];

/// Constraint attached to an individually requested claim.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ClaimConstraint {
    /// Requested with no constraint (`null`).
    #[default]
    Null,
    /// `{"essential": bool}`.
    Essential(bool),
    /// `{"value": "..."}`.
    Value(String),
    /// `{"values": [...]}`, order preserved.
    Values(Vec<String>),
}

impl ClaimConstraint {
    /// Creates an essential constraint.
    #[must_use]
    pub const fn essential() -> Self {
        Self::Essential(true)
    }

    /// Creates a voluntary constraint.
    #[must_use]
    pub const fn voluntary() -> Self {
        Self::Essential(false)
    }

    /// Creates a single-value constraint.
    #[must_use]
    pub fn value(value: impl Into<String>) -> Self {
        Self::Value(value.into())
    }

    /// Creates a value-list constraint.
    #[must_use]
    pub fn values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Values(values.into_iter().map(Into::into).collect())
    }

    /// Returns whether the claim was marked essential.
    #[must_use]
    pub const fn is_essential(&self) -> bool {
        matches!(self, Self::Essential(true))
    }

    /// Returns whether a subject value satisfies the constraint.
    ///
    /// `Null` and `Essential` accept any value.
    #[must_use]
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::Null | Self::Essential(_) => true,
            Self::Value(expected) => value_matches(value, expected),
            Self::Values(expected) => expected.iter().any(|e| value_matches(value, e)),
        }
    }

    /// Converts the constraint to its JSON form.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Essential(essential) => serde_json::json!({ "essential": essential }),
            Self::Value(value) => serde_json::json!({ "value": value }),
            Self::Values(values) => serde_json::json!({ "values": values }),
        }
    }

    /// Parses a constraint from its JSON form.
    ///
    /// When an object carries several members, `values` wins over `value`,
    /// which wins over `essential`. An empty object is `Null`.
    ///
    /// # Errors
    ///
    /// Returns a message when the JSON is neither `null` nor an object, or a
    /// member has the wrong type.
    pub fn from_json(json: &Value) -> Result<Self, String> {
        let object = match json {
            Value::Null => return Ok(Self::Null),
            Value::Object(object) => object,
            other => return Err(format!("claim constraint must be null or an object, found {other}")),
        };
        if let Some(values) = object.get("values") {
            let values = values
                .as_array()
                .ok_or("\"values\" must be an array")?
                .iter()
                .map(json_to_string)
                .collect();
            return Ok(Self::Values(values));
        }
        if let Some(value) = object.get("value") {
            return Ok(Self::Value(json_to_string(value)));
        }
        if let Some(essential) = object.get("essential") {
            let essential = essential.as_bool().ok_or("\"essential\" must be a boolean")?;
            return Ok(Self::Essential(essential));
        }
        Ok(Self::Null)
    }
}

impl Serialize for ClaimConstraint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ClaimConstraint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = Value::deserialize(deserializer)?;
        Self::from_json(&json).map_err(D::Error::custom)
    }
}

fn json_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn value_matches(value: &Value, expected: &str) -> bool {
    match value {
        Value::String(s) => s == expected,
        other => other.to_string() == expected,
    }
}

/// Individually requested claims, grouped by destination.
///
/// Names are unique per set. Adding a name again replaces its constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimsRequest {
    /// Claims requested in the ID Token.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub id_token: BTreeMap<String, ClaimConstraint>,

    /// Claims requested from the `UserInfo` endpoint.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub userinfo: BTreeMap<String, ClaimConstraint>,
}

impl ClaimsRequest {
    /// Creates an empty request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a claim in the ID Token. Last write wins.
    pub fn add_id_token_claim(&mut self, name: impl Into<String>, constraint: ClaimConstraint) {
        self.id_token.insert(name.into(), constraint);
    }

    /// Requests a claim from the `UserInfo` endpoint. Last write wins.
    pub fn add_userinfo_claim(&mut self, name: impl Into<String>, constraint: ClaimConstraint) {
        self.userinfo.insert(name.into(), constraint);
    }

    /// Returns whether no claim was requested.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.id_token.is_empty() && self.userinfo.is_empty()
    }

    /// Serializes the request to its JSON form.
    ///
    /// The result is a copy, so later changes to the request do not affect it.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let set = |claims: &BTreeMap<String, ClaimConstraint>| {
            Value::Object(
                claims
                    .iter()
                    .map(|(name, constraint)| (name.clone(), constraint.to_json()))
                    .collect(),
            )
        };
        let mut object = Map::new();
        if !self.id_token.is_empty() {
            object.insert("id_token".to_string(), set(&self.id_token));
        }
        if !self.userinfo.is_empty() {
            object.insert("userinfo".to_string(), set(&self.userinfo));
        }
        Value::Object(object)
    }

    /// Parses a claims request from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not describe a claims request.
    pub fn from_json(json: &Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(json)
    }

    /// Parses the `claims` query parameter.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameter is not a JSON claims request.
    pub fn from_param(param: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(param)
    }

    /// Returns the essential claim names of `set`.
    #[must_use]
    pub fn essential_names(set: &BTreeMap<String, ClaimConstraint>) -> Vec<&str> {
        set.iter()
            .filter(|(_, constraint)| constraint.is_essential())
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

impl fmt::Display for ClaimsRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

/// JWT audience claim (can be single string or array).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Audience {
    /// Single audience.
    Single(String),
    /// Multiple audiences.
    Multiple(Vec<String>),
}

impl Audience {
    /// Checks if the audience contains a specific value.
    #[must_use]
    pub fn contains(&self, value: &str) -> bool {
        match self {
            Self::Single(s) => s == value,
            Self::Multiple(v) => v.iter().any(|s| s == value),
        }
    }

    /// Returns the audiences as a vector.
    #[must_use]
    pub fn as_vec(&self) -> Vec<&str> {
        match self {
            Self::Single(s) => vec![s.as_str()],
            Self::Multiple(v) => v.iter().map(String::as_str).collect(),
        }
    }
}

impl From<String> for Audience {
    fn from(s: String) -> Self {
        Self::Single(s)
    }
}

impl From<&str> for Audience {
    fn from(s: &str) -> Self {
        Self::Single(s.to_string())
    }
}

/// OIDC address claim structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressClaim {
    /// Full mailing address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted: Option<String>,

    /// Street address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street_address: Option<String>,

    /// City or locality.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locality: Option<String>,

    /// State, province, or region.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Postal code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,

    /// Country.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl AddressClaim {
    /// Returns one member by name.
    #[must_use]
    pub fn member(&self, name: &str) -> Option<&str> {
        match name {
            "formatted" => self.formatted.as_deref(),
            "street_address" => self.street_address.as_deref(),
            "locality" => self.locality.as_deref(),
            "region" => self.region.as_deref(),
            "postal_code" => self.postal_code.as_deref(),
            "country" => self.country.as_deref(),
            _ => None,
        }
    }

    /// Returns whether no member is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        ADDRESS_MEMBERS.iter().all(|name| self.member(name).is_none())
    }
}

/// ID Token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenClaims {
    /// Issuer.
    pub iss: String,

    /// Subject.
    pub sub: String,

    /// Audience, the client id.
    pub aud: Audience,

    /// Expiration time (Unix timestamp).
    pub exp: i64,

    /// Issued at time (Unix timestamp).
    pub iat: i64,

    /// Authentication time (required if `max_age` was requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_time: Option<i64>,

    /// Nonce (required if provided in request).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// Authentication context class reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acr: Option<String>,

    /// Authorized party.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub azp: Option<String>,

    /// Access token hash.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at_hash: Option<String>,

    /// Code hash.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub c_hash: Option<String>,

    /// Released subject claims.
    #[serde(flatten)]
    pub additional: Map<String, Value>,
}

impl IdTokenClaims {
    /// Creates new ID token claims issued now.
    #[must_use]
    pub fn new(
        issuer: impl Into<String>,
        subject: impl Into<String>,
        audience: impl Into<Audience>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            iss: issuer.into(),
            sub: subject.into(),
            aud: audience.into(),
            exp: expires_at.timestamp(),
            iat: Utc::now().timestamp(),
            auth_time: None,
            nonce: None,
            acr: None,
            azp: None,
            at_hash: None,
            c_hash: None,
            additional: Map::new(),
        }
    }

    /// Sets the nonce.
    #[must_use]
    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// Sets the authentication time.
    #[must_use]
    pub const fn with_auth_time(mut self, auth_time: i64) -> Self {
        self.auth_time = Some(auth_time);
        self
    }

    /// Sets the authentication context class reference.
    #[must_use]
    pub fn with_acr(mut self, acr: impl Into<String>) -> Self {
        self.acr = Some(acr.into());
        self
    }

    /// Sets the access token hash.
    #[must_use]
    pub fn with_at_hash(mut self, at_hash: impl Into<String>) -> Self {
        self.at_hash = Some(at_hash.into());
        self
    }

    /// Sets the code hash.
    #[must_use]
    pub fn with_c_hash(mut self, c_hash: impl Into<String>) -> Self {
        self.c_hash = Some(c_hash.into());
        self
    }

    /// Sets the authorized party.
    #[must_use]
    pub fn with_azp(mut self, azp: impl Into<String>) -> Self {
        self.azp = Some(azp.into());
        self
    }

    /// Adds released subject claims. Registered claims are never overwritten.
    #[must_use]
    pub fn with_claims(mut self, claims: Map<String, Value>) -> Self {
        for (name, value) in claims {
            if !is_registered_id_token_claim(&name) {
                self.additional.insert(name, value);
            }
        }
        self
    }
}

fn is_registered_id_token_claim(name: &str) -> bool {
    matches!(
        name,
        "iss" | "sub" | "aud" | "exp" | "iat" | "auth_time" | "nonce" | "acr" | "azp" | "at_hash" | "c_hash"
    )
}

/// Attributes of an end-user, as held by the user directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectProfile {
    /// Subject identifier.
    pub subject: String,

    /// Top-level claims keyed by claim name.
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,

    /// Postal address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<AddressClaim>,
}

impl SubjectProfile {
    /// Creates a profile with no attributes.
    #[must_use]
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            ..Self::default()
        }
    }

    /// Sets a top-level attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Sets the address.
    #[must_use]
    pub fn with_address(mut self, address: AddressClaim) -> Self {
        self.address = Some(address);
        self
    }
}

/// Claims released by a scope value.
#[must_use]
pub fn scope_claims(scope: &str) -> &'static [&'static str] {
    match scope {
        "profile" => &[
            "name",
            "family_name",
            "given_name",
            "middle_name",
            "nickname",
            "preferred_username",
            "profile",
            "picture",
            "website",
            "gender",
            "birthdate",
            "zoneinfo",
            "locale",
            "updated_at",
        ],
        "email" => &["email", "email_verified"],
        "phone" => &["phone_number", "phone_number_verified"],
        "address" => &["address"],
        _ => &[],
    }
}

/// Returns the address member named by `name`, accepting both the bare
/// member name and the `address.` prefixed form.
fn address_member(name: &str) -> Option<&str> {
    let member = name.strip_prefix("address.").unwrap_or(name);
    ADDRESS_MEMBERS.contains(&member).then_some(member)
}

/// Builds the claim set released to a client.
///
/// `sub` is always present. Claims covered by the granted `scopes` are
/// released when the subject has them. Individually requested claims are
/// added on top: a claim the subject does not have is omitted, and a claim
/// with a `Value`/`Values` constraint is released only if the subject's value
/// satisfies it. Address members are nested inside `address`.
#[must_use]
pub fn release_claims(
    profile: &SubjectProfile,
    requested: &BTreeMap<String, ClaimConstraint>,
    scopes: &[String],
) -> Map<String, Value> {
    let mut released = Map::new();
    let mut address = Map::new();

    for name in scopes.iter().flat_map(|scope| scope_claims(scope)) {
        if *name == "address" {
            if let Some(profile_address) = &profile.address {
                for member in ADDRESS_MEMBERS {
                    if let Some(value) = profile_address.member(member) {
                        address.insert(member.to_string(), Value::String(value.to_string()));
                    }
                }
            }
        } else if let Some(value) = profile.attributes.get(*name) {
            released.insert((*name).to_string(), value.clone());
        }
    }

    for (name, constraint) in requested {
        if let Some(member) = address_member(name) {
            let value = profile
                .address
                .as_ref()
                .and_then(|a| a.member(member))
                .map(|v| Value::String(v.to_string()));
            if let Some(value) = value
                && constraint.accepts(&value)
            {
                address.insert(member.to_string(), value);
            }
        } else if name == "address" {
            if let Some(profile_address) = &profile.address {
                for member in ADDRESS_MEMBERS {
                    if let Some(value) = profile_address.member(member) {
                        address.insert(member.to_string(), Value::String(value.to_string()));
                    }
                }
            }
        } else if let Some(value) = profile.attributes.get(name)
            && constraint.accepts(value)
        {
            released.insert(name.clone(), value.clone());
        }
    }

    if !address.is_empty() {
        released.insert("address".to_string(), Value::Object(address));
    }
    released.insert("sub".to_string(), Value::String(profile.subject.clone()));
    released
}
