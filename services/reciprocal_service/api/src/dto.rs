//! Request/response bodies for the reciprocal-club HTTP surface.

use chrono::{NaiveDate, NaiveTime};
use reciprocal_service_core::{Agreement, AgreementStatus, AgreementTerms, Visit, VisitStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct ProposeAgreementRequest {
    pub target_tenant_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub description: Option<String>,
    pub terms: AgreementTerms,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecisionDto {
    Approve,
    Reject,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReviewAgreementRequest {
    pub decision: ReviewDecisionDto,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RequestVisitRequest {
    pub visiting_tenant_id: Uuid,
    pub home_tenant_id: Uuid,
    pub member_id: Uuid,
    pub visit_date: NaiveDate,
    pub visit_time: NaiveTime,
    pub purpose: Option<String>,
    #[validate(range(min = 0, max = 20))]
    pub guest_count: i32,
    #[serde(default)]
    pub facilities_used: Vec<String>,
    pub estimated_cost: Option<i64>,
    #[validate(length(equal = 3))]
    pub currency: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CheckInRequest {
    #[validate(length(equal = 32))]
    pub verification_code: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CheckOutRequest {
    #[validate(length(equal = 32))]
    pub verification_code: String,
    pub actual_cost: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CancelVisitRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AgreementResponse {
    pub agreement_id: Uuid,
    pub proposing_tenant_id: Uuid,
    pub target_tenant_id: Uuid,
    pub title: String,
    pub status: AgreementStatus,
    pub version: i64,
}

impl From<Agreement> for AgreementResponse {
    fn from(a: Agreement) -> Self {
        Self {
            agreement_id: a.agreement_id,
            proposing_tenant_id: a.proposing_tenant_id,
            target_tenant_id: a.target_tenant_id,
            title: a.title,
            status: a.status,
            version: a.version,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VisitResponse {
    pub visit_id: Uuid,
    pub agreement_id: Uuid,
    pub status: VisitStatus,
    pub version: i64,
    pub verification_code: String,
    pub qr_payload: String,
    pub duration_minutes: Option<i64>,
    pub actual_cost: Option<i64>,
}

impl From<Visit> for VisitResponse {
    fn from(v: Visit) -> Self {
        let qr_payload = v.qr_payload();
        Self {
            visit_id: v.visit_id,
            agreement_id: v.agreement_id,
            status: v.status,
            version: v.version,
            verification_code: v.verification_code,
            qr_payload,
            duration_minutes: v.duration_minutes,
            actual_cost: v.actual_cost,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ExpireSweepResponse {
    pub expired_count: usize,
}
