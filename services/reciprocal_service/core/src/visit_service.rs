//! Service trait for the visit state machine, gated by the quota engine.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use shared_error::AppError;

use crate::model::Visit;

pub struct RequestVisitInput {
    pub agreement_id: Uuid,
    pub member_id: Uuid,
    pub visiting_tenant_id: Uuid,
    pub home_tenant_id: Uuid,
    pub visit_date: NaiveDate,
    pub visit_time: NaiveTime,
    pub purpose: Option<String>,
    pub guest_count: i32,
    pub facilities_used: Vec<String>,
    pub estimated_cost: Option<i64>,
    pub currency: String,
}

#[async_trait]
pub trait VisitService: Send + Sync {
    /// Loads the agreement (must be `active`), consults the quota engine, generates
    /// and persists a unique verification code, and emits `visit.requested`. Fails
    /// `Forbidden{wrong_tenant}` if `caller_tenant_id` is neither
    /// `input.visiting_tenant_id` nor `input.home_tenant_id`.
    async fn request_visit(&self, input: RequestVisitInput, caller_tenant_id: Uuid, correlation_id: Uuid) -> Result<Visit, AppError>;

    /// `pending -> confirmed`. Stamps `verified_at`/`verified_by`. Fails
    /// `Forbidden{wrong_tenant}` if `caller_tenant_id` is neither side of the visit.
    async fn confirm(&self, visit_id: Uuid, confirmer: Uuid, caller_tenant_id: Uuid, correlation_id: Uuid) -> Result<Visit, AppError>;

    /// Looks up by verification code; `confirmed -> checked_in` (or `pending ->
    /// checked_in` when `allow_direct_check_in` is set, mirroring a tenant setting).
    /// Fails `Forbidden{wrong_tenant}` if `caller_tenant_id` is neither side of the visit.
    async fn check_in(
        &self,
        verification_code: &str,
        allow_direct_check_in: bool,
        caller_tenant_id: Uuid,
        now: DateTime<Utc>,
        correlation_id: Uuid,
    ) -> Result<Visit, AppError>;

    /// `checked_in -> completed`. Computes duration and applies the discount to
    /// `actual_cost` if supplied. Fails `Forbidden{wrong_tenant}` if `caller_tenant_id`
    /// is neither side of the visit.
    async fn check_out(
        &self,
        verification_code: &str,
        actual_cost: Option<i64>,
        caller_tenant_id: Uuid,
        now: DateTime<Utc>,
        correlation_id: Uuid,
    ) -> Result<Visit, AppError>;

    /// From any non-terminal state except `checked_in`. Fails `Forbidden{wrong_tenant}`
    /// if `caller_tenant_id` is neither side of the visit.
    async fn cancel(&self, visit_id: Uuid, reason: Option<String>, caller_tenant_id: Uuid, correlation_id: Uuid) -> Result<Visit, AppError>;

    /// `confirmed -> no_show`, only once `visit_date` is more than
    /// `no_show_threshold_hours` in the past relative to `now`. Fails
    /// `Forbidden{wrong_tenant}` if `caller_tenant_id` is neither side of the visit.
    async fn mark_no_show(
        &self,
        visit_id: Uuid,
        caller_tenant_id: Uuid,
        now: DateTime<Utc>,
        no_show_threshold_hours: i64,
        correlation_id: Uuid,
    ) -> Result<Visit, AppError>;
}
