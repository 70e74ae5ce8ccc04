//! Audit events.
//!
//! Security-relevant operations (token issuance, refresh and revocation, key
//! lifecycle, rejected request objects) are recorded as [`Event`] values and
//! emitted on the `audit` tracing target. Token values never appear in an
//! event; callers pass a hash prefix when they need to correlate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tracing target used by [`Event::emit`].
pub const AUDIT_TARGET: &str = "audit";

/// Event type categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    // Token events
    /// Authorization code exchanged for tokens.
    CodeToToken,
    /// Authorization code exchange failed.
    CodeToTokenError,
    /// Refresh token used.
    RefreshToken,
    /// Refresh token use failed.
    RefreshTokenError,
    /// Token revoked.
    RevokeToken,
    /// Every token of a grant revoked.
    RevokeGrant,
    /// UserInfo released.
    UserInfoRequest,
    /// UserInfo request rejected.
    UserInfoRequestError,

    // Request object events
    /// Request object accepted.
    RequestObjectAccepted,
    /// Request object rejected.
    RequestObjectRejected,

    // Key events
    /// Key generated in the key store.
    KeyGenerated,
    /// Key removed from the key store.
    KeyDeleted,
}

/// Outcome of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventOutcome {
    /// Operation succeeded.
    Success,
    /// Operation failed.
    Failure,
}

/// A security event for audit logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique event identifier.
    pub id: Uuid,

    /// Timestamp of the event.
    pub timestamp: DateTime<Utc>,

    /// Type of event.
    pub event_type: EventType,

    /// Outcome of the event.
    pub outcome: EventOutcome,

    /// Client ID associated with the event.
    pub client_id: Option<String>,

    /// Subject associated with the event.
    pub subject: Option<String>,

    /// Grant the affected tokens belong to.
    pub grant_id: Option<Uuid>,

    /// Key ID involved in the event.
    pub key_id: Option<String>,

    /// Error code (for failure events).
    pub error: Option<String>,

    /// Additional details as key-value pairs.
    pub details: Vec<(String, String)>,
}

impl Event {
    /// Creates a new event builder.
    #[must_use]
    pub const fn builder(event_type: EventType) -> EventBuilder {
        EventBuilder::new(event_type)
    }

    /// Logs the event on the `audit` target.
    ///
    /// Failures are logged at `warn`, everything else at `info`.
    pub fn emit(&self) {
        let details = self
            .details
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" ");
        let client_id = self.client_id.as_deref().unwrap_or("-");
        let subject = self.subject.as_deref().unwrap_or("-");
        let grant_id = self.grant_id.map(|id| id.to_string()).unwrap_or_default();
        let kid = self.key_id.as_deref().unwrap_or("-");
        match self.outcome {
            EventOutcome::Success => tracing::info!(
                target: AUDIT_TARGET,
                event_id = %self.id,
                event_type = ?self.event_type,
                client_id,
                subject,
                grant_id = %grant_id,
                kid,
                details = %details,
                "audit event"
            ),
            EventOutcome::Failure => tracing::warn!(
                target: AUDIT_TARGET,
                event_id = %self.id,
                event_type = ?self.event_type,
                client_id,
                subject,
                grant_id = %grant_id,
                kid,
                error = self.error.as_deref().unwrap_or("-"),
                details = %details,
                "audit event"
            ),
        }
    }
}

/// Builder for creating events.
pub struct EventBuilder {
    event_type: EventType,
    outcome: EventOutcome,
    client_id: Option<String>,
    subject: Option<String>,
    grant_id: Option<Uuid>,
    key_id: Option<String>,
    error: Option<String>,
    details: Vec<(String, String)>,
}

impl EventBuilder {
    /// Creates a new event builder.
    #[must_use]
    pub const fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            outcome: EventOutcome::Success,
            client_id: None,
            subject: None,
            grant_id: None,
            key_id: None,
            error: None,
            details: Vec::new(),
        }
    }

    /// Sets the outcome to success.
    #[must_use]
    pub const fn success(mut self) -> Self {
        self.outcome = EventOutcome::Success;
        self
    }

    /// Sets the outcome to failure with an error code.
    #[must_use]
    pub fn failure(mut self, error: impl Into<String>) -> Self {
        self.outcome = EventOutcome::Failure;
        self.error = Some(error.into());
        self
    }

    /// Sets the client ID.
    #[must_use]
    pub fn client(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Sets the subject.
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Sets the grant ID.
    #[must_use]
    pub const fn grant(mut self, grant_id: Uuid) -> Self {
        self.grant_id = Some(grant_id);
        self
    }

    /// Sets the key ID.
    #[must_use]
    pub fn key(mut self, kid: impl Into<String>) -> Self {
        self.key_id = Some(kid.into());
        self
    }

    /// Adds a detail key-value pair.
    #[must_use]
    pub fn detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.push((key.into(), value.into()));
        self
    }

    /// Builds the event.
    #[must_use]
    pub fn build(self) -> Event {
        Event {
            id: Uuid::now_v7(),
            timestamp: Utc::now(),
            event_type: self.event_type,
            outcome: self.outcome,
            client_id: self.client_id,
            subject: self.subject,
            grant_id: self.grant_id,
            key_id: self.key_id,
            error: self.error,
            details: self.details,
        }
    }

    /// Builds and emits the event.
    pub fn emit(self) {
        self.build().emit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_builder_creates_success_event() {
        let grant_id = Uuid::now_v7();

        let event = Event::builder(EventType::RevokeGrant)
            .success()
            .client("s6BhdRkqt3")
            .grant(grant_id)
            .detail("token_type_hint", "refresh_token")
            .build();

        assert_eq!(event.event_type, EventType::RevokeGrant);
        assert_eq!(event.outcome, EventOutcome::Success);
        assert_eq!(event.client_id.as_deref(), Some("s6BhdRkqt3"));
        assert_eq!(event.grant_id, Some(grant_id));
        assert_eq!(event.details.len(), 1);
        assert!(event.error.is_none());
    }

    #[test]
    fn event_builder_creates_failure_event() {
        let event = Event::builder(EventType::RequestObjectRejected)
            .failure("invalid_request_object")
            .client("client-1")
            .build();

        assert_eq!(event.outcome, EventOutcome::Failure);
        assert_eq!(event.error.as_deref(), Some("invalid_request_object"));
    }

    #[test]
    fn event_has_timestamp() {
        let before = Utc::now();
        let event = Event::builder(EventType::KeyGenerated).key("kid-1").build();
        let after = Utc::now();

        assert!(event.timestamp >= before);
        assert!(event.timestamp <= after);
    }

    #[test]
    fn event_type_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&EventType::RefreshTokenError).unwrap();
        assert_eq!(json, "\"REFRESH_TOKEN_ERROR\"");
    }

    #[test]
    fn emit_without_subscriber_does_not_panic() {
        Event::builder(EventType::CodeToToken).subject("alice").emit();
    }
}
