//! Service trait for the agreement state machine.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use shared_error::AppError;

use crate::model::{Agreement, AgreementTerms};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewDecision {
    Approve,
    Reject,
}

#[async_trait]
pub trait AgreementService: Send + Sync {
    /// Proposes a new agreement in `pending` status.
    ///
    /// Fails `InvalidInput` if `terms` are malformed, `Conflict` if a non-terminal
    /// agreement already exists between this ordered tenant pair. Emits
    /// `agreement.created` on success.
    #[allow(clippy::too_many_arguments)]
    async fn propose(
        &self,
        proposer: Uuid,
        proposing_tenant_id: Uuid,
        target_tenant_id: Uuid,
        title: String,
        description: Option<String>,
        terms: AgreementTerms,
        correlation_id: Uuid,
    ) -> Result<Agreement, AppError>;

    /// `pending -> {approved, rejected}`. Stamps `reviewed_at`/reviewer and emits
    /// `agreement.status_updated`. Fails `Forbidden{wrong_tenant}` if `caller_tenant_id`
    /// is neither side of the agreement.
    async fn review(
        &self,
        agreement_id: Uuid,
        decision: ReviewDecision,
        reviewer: Uuid,
        caller_tenant_id: Uuid,
        correlation_id: Uuid,
    ) -> Result<Agreement, AppError>;

    /// `approved -> active`. Stamps `activated_at` and emits `agreement.status_updated`.
    /// Fails `Forbidden{wrong_tenant}` if `caller_tenant_id` is neither side of the
    /// agreement.
    async fn activate(&self, agreement_id: Uuid, caller_tenant_id: Uuid, correlation_id: Uuid) -> Result<Agreement, AppError>;

    /// Background-job entry point: transitions every `active` agreement whose
    /// `expires_at` is at or before `now` to `expired`. Idempotent on re-run.
    async fn expire_sweep(&self, now: DateTime<Utc>, correlation_id: Uuid) -> Result<usize, AppError>;
}
