//! Repository contracts for agreements, visits, restrictions, and
//! the transactional outbox.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use shared_error::AppError;

use crate::model::{Agreement, Visit, VisitRestriction};

#[async_trait]
pub trait AgreementRepository: Send + Sync {
    async fn find_by_id(&self, agreement_id: Uuid) -> Result<Option<Agreement>, AppError>;

    /// The invariant-enforcing read: at most one non-terminal agreement may exist
    /// between this *ordered* tenant pair.
    async fn find_non_terminal_between(
        &self,
        proposing_tenant_id: Uuid,
        target_tenant_id: Uuid,
    ) -> Result<Option<Agreement>, AppError>;

    async fn create(&self, agreement: &Agreement) -> Result<Agreement, AppError>;

    /// Optimistic-version update: fails `Conflict` if `agreement.version` no longer
    /// matches the stored row.
    async fn update(&self, agreement: &Agreement) -> Result<Agreement, AppError>;

    async fn list_active_expired_as_of(&self, as_of: DateTime<Utc>) -> Result<Vec<Agreement>, AppError>;

    async fn health_check(&self) -> Result<bool, AppError>;
}

#[async_trait]
pub trait VisitRepository: Send + Sync {
    async fn find_by_id(&self, visit_id: Uuid) -> Result<Option<Visit>, AppError>;
    async fn find_by_verification_code(&self, code: &str) -> Result<Option<Visit>, AppError>;
    async fn verification_code_exists(&self, code: &str) -> Result<bool, AppError>;

    /// Count of the member's non-cancelled visits to `visiting_tenant_id` within
    /// `[start, end]` inclusive, used for the quota engine's monthly/yearly cap checks.
    async fn count_non_cancelled_in_range(
        &self,
        member_id: Uuid,
        visiting_tenant_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<u32, AppError>;

    async fn create(&self, visit: &Visit) -> Result<Visit, AppError>;

    /// Optimistic-version update backing `confirm`/`check_in`/`check_out`/`cancel`/
    /// `mark_no_show`.
    async fn update(&self, visit: &Visit) -> Result<Visit, AppError>;

    async fn health_check(&self) -> Result<bool, AppError>;
}

#[async_trait]
pub trait VisitRestrictionRepository: Send + Sync {
    async fn list_active_for_agreement(&self, agreement_id: Uuid) -> Result<Vec<VisitRestriction>, AppError>;
    async fn create(&self, restriction: &VisitRestriction) -> Result<VisitRestriction, AppError>;
}

/// The transactional outbox: every successful state transition enqueues exactly one
/// row here in the same database transaction as the state change.
#[async_trait]
pub trait OutboxRepository: Send + Sync {
    async fn enqueue(
        &self,
        tenant_id: Uuid,
        subject: &str,
        correlation_id: Uuid,
        payload: serde_json::Value,
    ) -> Result<Uuid, AppError>;
}
