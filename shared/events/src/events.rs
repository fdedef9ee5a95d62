//! Event payload definitions for inter-service communication.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope wrapping every event published to the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope<T> {
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    /// Unique per message, independent of `correlation_id`. Handlers dedupe on
    /// `(subject, message_id)` to make delivery idempotent across retries.
    pub message_id: Uuid,
    /// Correlation id threaded from the originating request, for tracing across
    /// services.
    pub correlation_id: Uuid,
    pub data: T,
}

impl<T> EventEnvelope<T> {
    pub fn new(event_type: &str, message_id: Uuid, correlation_id: Uuid, data: T) -> Self {
        Self {
            event_type: event_type.to_string(),
            timestamp: Utc::now(),
            version: "1.0".to_string(),
            message_id,
            correlation_id,
            data,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgreementCreatedEvent {
    pub agreement_id: Uuid,
    pub tenant_id: Uuid,
    pub partner_tenant_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgreementStatusUpdatedEvent {
    pub agreement_id: Uuid,
    pub tenant_id: Uuid,
    pub from_status: String,
    pub to_status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitRequestedEvent {
    pub visit_id: Uuid,
    pub agreement_id: Uuid,
    pub tenant_id: Uuid,
    pub member_id: Uuid,
    pub facility_id: Uuid,
    pub requested_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitConfirmedEvent {
    pub visit_id: Uuid,
    pub tenant_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitCheckedInEvent {
    pub visit_id: Uuid,
    pub tenant_id: Uuid,
    pub checked_in_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitCompletedEvent {
    pub visit_id: Uuid,
    pub tenant_id: Uuid,
    pub checked_out_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitCancelledEvent {
    pub visit_id: Uuid,
    pub tenant_id: Uuid,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitNoShowEvent {
    pub visit_id: Uuid,
    pub tenant_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRevokedEvent {
    pub tenant_id: Uuid,
    pub principal_id: Option<Uuid>,
    /// The revoked token's own `jti`, so subscribers can mirror the revocation into
    /// their own local `RevocationStore` without re-deriving it from the token itself.
    pub jti: Uuid,
    pub revoked_at: DateTime<Utc>,
}
