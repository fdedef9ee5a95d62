use std::sync::Arc;

use axum::extract::{Path, State};
use axum::{Extension, Json};
use chrono::Utc;
use reciprocal_service_core::{AgreementService, ReviewDecision, VisitService};
use shared_auth::{AuthUser, JwtSecretProvider, PermissionSet, RequireAllPermissions};
use shared_error::AppError;
use shared_rpc::CorrelationId;
use uuid::Uuid;

use crate::dto::{
    AgreementResponse, CancelVisitRequest, CheckInRequest, CheckOutRequest, ExpireSweepResponse, HealthResponse,
    ProposeAgreementRequest, RequestVisitRequest, ReviewAgreementRequest, ReviewDecisionDto, VisitResponse,
};

pub struct AgreementAdmin;
impl PermissionSet for AgreementAdmin {
    fn required() -> &'static [(&'static str, &'static str)] {
        &[("agreement", "manage")]
    }
}

pub struct VisitOperator;
impl PermissionSet for VisitOperator {
    fn required() -> &'static [(&'static str, &'static str)] {
        &[("visit", "operate")]
    }
}

pub struct AppState<Ag, Vi> {
    pub agreements: Arc<Ag>,
    pub visits: Arc<Vi>,
    pub no_show_threshold_hours: i64,
    pub allow_direct_check_in: bool,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
}

impl<Ag, Vi> Clone for AppState<Ag, Vi> {
    fn clone(&self) -> Self {
        Self {
            agreements: Arc::clone(&self.agreements),
            visits: Arc::clone(&self.visits),
            no_show_threshold_hours: self.no_show_threshold_hours,
            allow_direct_check_in: self.allow_direct_check_in,
            jwt_secret: self.jwt_secret.clone(),
            jwt_issuer: self.jwt_issuer.clone(),
            jwt_audience: self.jwt_audience.clone(),
        }
    }
}

impl<Ag, Vi> JwtSecretProvider for AppState<Ag, Vi> {
    fn jwt_secret(&self) -> &str {
        &self.jwt_secret
    }

    fn jwt_issuer(&self) -> &str {
        &self.jwt_issuer
    }

    fn jwt_audience(&self) -> &str {
        &self.jwt_audience
    }
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok", version: env!("CARGO_PKG_VERSION") })
}

pub async fn propose<Ag: AgreementService, Vi>(
    State(state): State<AppState<Ag, Vi>>,
    RequireAllPermissions { user, .. }: RequireAllPermissions<AgreementAdmin>,
    Extension(CorrelationId(correlation_id)): Extension<CorrelationId>,
    shared_rpc::ValidatedJson(payload): shared_rpc::ValidatedJson<ProposeAgreementRequest>,
) -> Result<Json<AgreementResponse>, AppError> {
    let agreement = state
        .agreements
        .propose(
            user.user_id,
            user.tenant_id,
            payload.target_tenant_id,
            payload.title,
            payload.description,
            payload.terms,
            correlation_id,
        )
        .await?;

    Ok(Json(agreement.into()))
}

pub async fn review<Ag: AgreementService, Vi>(
    State(state): State<AppState<Ag, Vi>>,
    RequireAllPermissions { user, .. }: RequireAllPermissions<AgreementAdmin>,
    Path(agreement_id): Path<Uuid>,
    Extension(CorrelationId(correlation_id)): Extension<CorrelationId>,
    shared_rpc::ValidatedJson(payload): shared_rpc::ValidatedJson<ReviewAgreementRequest>,
) -> Result<Json<AgreementResponse>, AppError> {
    let decision = match payload.decision {
        ReviewDecisionDto::Approve => ReviewDecision::Approve,
        ReviewDecisionDto::Reject => ReviewDecision::Reject,
    };
    let agreement = state.agreements.review(agreement_id, decision, user.user_id, user.tenant_id, correlation_id).await?;
    Ok(Json(agreement.into()))
}

pub async fn activate<Ag: AgreementService, Vi>(
    State(state): State<AppState<Ag, Vi>>,
    RequireAllPermissions { user, .. }: RequireAllPermissions<AgreementAdmin>,
    Path(agreement_id): Path<Uuid>,
    Extension(CorrelationId(correlation_id)): Extension<CorrelationId>,
) -> Result<Json<AgreementResponse>, AppError> {
    let agreement = state.agreements.activate(agreement_id, user.tenant_id, correlation_id).await?;
    Ok(Json(agreement.into()))
}

pub async fn expire_sweep<Ag: AgreementService, Vi>(
    State(state): State<AppState<Ag, Vi>>,
    RequireAllPermissions { .. }: RequireAllPermissions<AgreementAdmin>,
    Extension(CorrelationId(correlation_id)): Extension<CorrelationId>,
) -> Result<Json<ExpireSweepResponse>, AppError> {
    let expired_count = state.agreements.expire_sweep(Utc::now(), correlation_id).await?;
    Ok(Json(ExpireSweepResponse { expired_count }))
}

pub async fn request_visit<Ag, Vi: VisitService>(
    State(state): State<AppState<Ag, Vi>>,
    RequireAllPermissions { user, .. }: RequireAllPermissions<VisitOperator>,
    Path(agreement_id): Path<Uuid>,
    Extension(CorrelationId(correlation_id)): Extension<CorrelationId>,
    shared_rpc::ValidatedJson(payload): shared_rpc::ValidatedJson<RequestVisitRequest>,
) -> Result<Json<VisitResponse>, AppError> {
    let visit = state
        .visits
        .request_visit(
            reciprocal_service_core::RequestVisitInput {
                agreement_id,
                member_id: payload.member_id,
                visiting_tenant_id: payload.visiting_tenant_id,
                home_tenant_id: payload.home_tenant_id,
                visit_date: payload.visit_date,
                visit_time: payload.visit_time,
                purpose: payload.purpose,
                guest_count: payload.guest_count,
                facilities_used: payload.facilities_used,
                estimated_cost: payload.estimated_cost,
                currency: payload.currency,
            },
            user.tenant_id,
            correlation_id,
        )
        .await?;

    Ok(Json(visit.into()))
}

pub async fn confirm<Ag, Vi: VisitService>(
    State(state): State<AppState<Ag, Vi>>,
    RequireAllPermissions { user, .. }: RequireAllPermissions<VisitOperator>,
    Path(visit_id): Path<Uuid>,
    Extension(CorrelationId(correlation_id)): Extension<CorrelationId>,
) -> Result<Json<VisitResponse>, AppError> {
    let visit = state.visits.confirm(visit_id, user.user_id, user.tenant_id, correlation_id).await?;
    Ok(Json(visit.into()))
}

pub async fn check_in<Ag, Vi: VisitService>(
    State(state): State<AppState<Ag, Vi>>,
    RequireAllPermissions { user, .. }: RequireAllPermissions<VisitOperator>,
    Extension(CorrelationId(correlation_id)): Extension<CorrelationId>,
    shared_rpc::ValidatedJson(payload): shared_rpc::ValidatedJson<CheckInRequest>,
) -> Result<Json<VisitResponse>, AppError> {
    let visit = state
        .visits
        .check_in(&payload.verification_code, state.allow_direct_check_in, user.tenant_id, Utc::now(), correlation_id)
        .await?;
    Ok(Json(visit.into()))
}

pub async fn check_out<Ag, Vi: VisitService>(
    State(state): State<AppState<Ag, Vi>>,
    RequireAllPermissions { user, .. }: RequireAllPermissions<VisitOperator>,
    Extension(CorrelationId(correlation_id)): Extension<CorrelationId>,
    shared_rpc::ValidatedJson(payload): shared_rpc::ValidatedJson<CheckOutRequest>,
) -> Result<Json<VisitResponse>, AppError> {
    let visit = state
        .visits
        .check_out(&payload.verification_code, payload.actual_cost, user.tenant_id, Utc::now(), correlation_id)
        .await?;
    Ok(Json(visit.into()))
}

pub async fn cancel<Ag, Vi: VisitService>(
    State(state): State<AppState<Ag, Vi>>,
    user: AuthUser,
    Path(visit_id): Path<Uuid>,
    Extension(CorrelationId(correlation_id)): Extension<CorrelationId>,
    shared_rpc::ValidatedJson(payload): shared_rpc::ValidatedJson<CancelVisitRequest>,
) -> Result<Json<VisitResponse>, AppError> {
    let visit = state.visits.cancel(visit_id, payload.reason, user.tenant_id, correlation_id).await?;
    Ok(Json(visit.into()))
}

pub async fn mark_no_show<Ag, Vi: VisitService>(
    State(state): State<AppState<Ag, Vi>>,
    RequireAllPermissions { user, .. }: RequireAllPermissions<VisitOperator>,
    Path(visit_id): Path<Uuid>,
    Extension(CorrelationId(correlation_id)): Extension<CorrelationId>,
) -> Result<Json<VisitResponse>, AppError> {
    let visit =
        state.visits.mark_no_show(visit_id, user.tenant_id, Utc::now(), state.no_show_threshold_hours, correlation_id).await?;
    Ok(Json(visit.into()))
}
