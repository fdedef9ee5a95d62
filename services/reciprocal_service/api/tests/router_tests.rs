//! Router-level integration tests: auth/permission gating and request/response
//! wiring, exercised with fake services so no database is required. Business-rule
//! coverage (quota engine, state machines) lives in `reciprocal_service_core`'s own
//! test modules.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::routing::{get, patch, post};
use axum::Router;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use reciprocal_service_api::handlers::{self, AppState};
use reciprocal_service_core::{AgreementService, AgreementTerms, ReviewDecision, RequestVisitInput, VisitService};
use shared_error::AppError;
use shared_jwt::Claims;
use tower::ServiceExt;
use uuid::Uuid;

struct FakeAgreements;

#[async_trait::async_trait]
impl AgreementService for FakeAgreements {
    async fn propose(
        &self,
        proposer: Uuid,
        proposing_tenant_id: Uuid,
        target_tenant_id: Uuid,
        title: String,
        description: Option<String>,
        terms: AgreementTerms,
        _correlation_id: Uuid,
    ) -> Result<reciprocal_service_core::Agreement, AppError> {
        Ok(sample_agreement(proposer, proposing_tenant_id, target_tenant_id, title, description, terms))
    }

    async fn review(
        &self,
        agreement_id: Uuid,
        _decision: ReviewDecision,
        reviewer: Uuid,
        _caller_tenant_id: Uuid,
        _correlation_id: Uuid,
    ) -> Result<reciprocal_service_core::Agreement, AppError> {
        let mut a = sample_agreement(reviewer, Uuid::new_v4(), Uuid::new_v4(), "t".into(), None, sample_terms());
        a.agreement_id = agreement_id;
        a.status = reciprocal_service_core::AgreementStatus::Approved;
        Ok(a)
    }

    async fn activate(
        &self,
        agreement_id: Uuid,
        _caller_tenant_id: Uuid,
        _correlation_id: Uuid,
    ) -> Result<reciprocal_service_core::Agreement, AppError> {
        let mut a = sample_agreement(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), "t".into(), None, sample_terms());
        a.agreement_id = agreement_id;
        a.status = reciprocal_service_core::AgreementStatus::Active;
        Ok(a)
    }

    async fn expire_sweep(&self, _now: DateTime<Utc>, _correlation_id: Uuid) -> Result<usize, AppError> {
        Ok(0)
    }
}

struct FakeVisits;

#[async_trait::async_trait]
impl VisitService for FakeVisits {
    async fn request_visit(
        &self,
        input: RequestVisitInput,
        _caller_tenant_id: Uuid,
        _correlation_id: Uuid,
    ) -> Result<reciprocal_service_core::Visit, AppError> {
        Ok(sample_visit(input.agreement_id, input.member_id, input.visiting_tenant_id, input.home_tenant_id, input.visit_date))
    }

    async fn confirm(
        &self,
        visit_id: Uuid,
        _confirmer: Uuid,
        _caller_tenant_id: Uuid,
        _correlation_id: Uuid,
    ) -> Result<reciprocal_service_core::Visit, AppError> {
        let mut v = sample_visit(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Utc::now().date_naive());
        v.visit_id = visit_id;
        v.status = reciprocal_service_core::VisitStatus::Confirmed;
        Ok(v)
    }

    async fn check_in(
        &self,
        verification_code: &str,
        _allow_direct_check_in: bool,
        _caller_tenant_id: Uuid,
        _now: DateTime<Utc>,
        _correlation_id: Uuid,
    ) -> Result<reciprocal_service_core::Visit, AppError> {
        if verification_code == "unknown" {
            return Err(AppError::not_found("visit not found"));
        }
        let mut v = sample_visit(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Utc::now().date_naive());
        v.verification_code = verification_code.to_string();
        v.status = reciprocal_service_core::VisitStatus::CheckedIn;
        Ok(v)
    }

    async fn check_out(
        &self,
        verification_code: &str,
        actual_cost: Option<i64>,
        _caller_tenant_id: Uuid,
        _now: DateTime<Utc>,
        _correlation_id: Uuid,
    ) -> Result<reciprocal_service_core::Visit, AppError> {
        let mut v = sample_visit(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Utc::now().date_naive());
        v.verification_code = verification_code.to_string();
        v.status = reciprocal_service_core::VisitStatus::Completed;
        v.actual_cost = actual_cost;
        Ok(v)
    }

    async fn cancel(
        &self,
        visit_id: Uuid,
        _reason: Option<String>,
        _caller_tenant_id: Uuid,
        _correlation_id: Uuid,
    ) -> Result<reciprocal_service_core::Visit, AppError> {
        let mut v = sample_visit(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Utc::now().date_naive());
        v.visit_id = visit_id;
        v.status = reciprocal_service_core::VisitStatus::Cancelled;
        Ok(v)
    }

    async fn mark_no_show(
        &self,
        visit_id: Uuid,
        _caller_tenant_id: Uuid,
        _now: DateTime<Utc>,
        _no_show_threshold_hours: i64,
        _correlation_id: Uuid,
    ) -> Result<reciprocal_service_core::Visit, AppError> {
        let mut v = sample_visit(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Utc::now().date_naive());
        v.visit_id = visit_id;
        v.status = reciprocal_service_core::VisitStatus::NoShow;
        Ok(v)
    }
}

fn sample_terms() -> AgreementTerms {
    AgreementTerms {
        max_visits_per_month: Some(2),
        max_visits_per_year: None,
        allowed_weekdays: None,
        allowed_time_window: None,
        require_advance_booking: false,
        advance_booking_days: 0,
        allowed_facilities: None,
        excluded_dates: vec![],
        discount_percent: 10,
        currency: "USD".to_string(),
    }
}

#[allow(clippy::too_many_arguments)]
fn sample_agreement(
    proposer: Uuid,
    proposing_tenant_id: Uuid,
    target_tenant_id: Uuid,
    title: String,
    description: Option<String>,
    terms: AgreementTerms,
) -> reciprocal_service_core::Agreement {
    let now = Utc::now();
    reciprocal_service_core::Agreement {
        agreement_id: Uuid::new_v4(),
        proposing_tenant_id,
        target_tenant_id,
        title,
        description,
        terms,
        status: reciprocal_service_core::AgreementStatus::Pending,
        version: 1,
        proposed_by: proposer,
        reviewed_by: None,
        proposed_at: now,
        reviewed_at: None,
        activated_at: None,
        expires_at: None,
        external_anchor_id: None,
        created_at: now,
        updated_at: now,
    }
}

fn sample_visit(
    agreement_id: Uuid,
    member_id: Uuid,
    visiting_tenant_id: Uuid,
    home_tenant_id: Uuid,
    visit_date: NaiveDate,
) -> reciprocal_service_core::Visit {
    let now = Utc::now();
    reciprocal_service_core::Visit {
        visit_id: Uuid::new_v4(),
        agreement_id,
        member_id,
        visiting_tenant_id,
        home_tenant_id,
        visit_date,
        visit_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
        purpose: None,
        guest_count: 0,
        facilities_used: vec![],
        status: reciprocal_service_core::VisitStatus::Pending,
        version: 1,
        verification_code: "a".repeat(32),
        check_in_time: None,
        check_out_time: None,
        duration_minutes: None,
        estimated_cost: None,
        actual_cost: None,
        discount_applied_percent: None,
        currency: "USD".to_string(),
        member_rating: None,
        member_feedback: None,
        club_rating: None,
        club_feedback: None,
        external_anchor_id: None,
        verified_at: None,
        verified_by: None,
        created_at: now,
        updated_at: now,
    }
}

const JWT_SECRET: &str = "test-secret-at-least-enough-bytes";
const JWT_ISSUER: &str = "reciprocal-clubs";
const JWT_AUDIENCE: &str = "reciprocal-clubs-api";

fn bearer_token(roles: Vec<&str>, permissions: Vec<(&str, &str)>) -> String {
    let claims = Claims::new_access(
        Uuid::new_v4(),
        Uuid::new_v4(),
        roles.into_iter().map(String::from).collect(),
        permissions.into_iter().map(|(r, a)| (r.to_string(), a.to_string())).collect(),
        900,
        JWT_ISSUER,
        JWT_AUDIENCE,
        0,
        0,
    );
    shared_jwt::encode_jwt(&claims, JWT_SECRET).expect("token should encode")
}

fn test_app() -> Router {
    let state = AppState {
        agreements: Arc::new(FakeAgreements),
        visits: Arc::new(FakeVisits),
        no_show_threshold_hours: 24,
        allow_direct_check_in: false,
        jwt_secret: JWT_SECRET.to_string(),
        jwt_issuer: JWT_ISSUER.to_string(),
        jwt_audience: JWT_AUDIENCE.to_string(),
    };

    let router = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/v1/agreements", post(handlers::propose::<FakeAgreements, FakeVisits>))
        .route(
            "/api/v1/agreements/{agreement_id}/visits",
            post(handlers::request_visit::<FakeAgreements, FakeVisits>),
        )
        .route(
            "/api/v1/visits/check-in",
            post(handlers::check_in::<FakeAgreements, FakeVisits>),
        )
        .route(
            "/api/v1/visits/{visit_id}/cancel",
            post(handlers::cancel::<FakeAgreements, FakeVisits>),
        )
        .route(
            "/api/v1/visits/{visit_id}/no-show",
            patch(handlers::mark_no_show::<FakeAgreements, FakeVisits>),
        )
        .with_state(state);

    shared_rpc::with_base_interceptors(router)
}

#[tokio::test]
async fn health_check_requires_no_auth() {
    let app = test_app();
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn propose_without_a_bearer_token_is_unauthorized() {
    let app = test_app();
    let body = serde_json::json!({
        "target_tenant_id": Uuid::new_v4(),
        "title": "Sunrise Club reciprocal agreement",
        "terms": sample_terms_json(),
    });
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/v1/agreements")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn propose_without_agreement_manage_permission_is_forbidden() {
    let app = test_app();
    let token = bearer_token(vec!["member"], vec![]);
    let body = serde_json::json!({
        "target_tenant_id": Uuid::new_v4(),
        "title": "Sunrise Club reciprocal agreement",
        "terms": sample_terms_json(),
    });
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/v1/agreements")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn propose_with_permission_and_valid_body_succeeds() {
    let app = test_app();
    let token = bearer_token(vec!["admin"], vec![("agreement", "manage")]);
    let body = serde_json::json!({
        "target_tenant_id": Uuid::new_v4(),
        "title": "Sunrise Club reciprocal agreement",
        "terms": sample_terms_json(),
    });
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/v1/agreements")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn propose_with_a_blank_title_is_rejected_before_reaching_the_service() {
    let app = test_app();
    let token = bearer_token(vec!["admin"], vec![("agreement", "manage")]);
    let body = serde_json::json!({
        "target_tenant_id": Uuid::new_v4(),
        "title": "",
        "terms": sample_terms_json(),
    });
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/v1/agreements")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn check_in_allows_any_authenticated_operator_with_the_right_permission() {
    let app = test_app();
    let token = bearer_token(vec!["staff"], vec![("visit", "operate")]);
    let body = serde_json::json!({ "verification_code": "a".repeat(32) });
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/v1/visits/check-in")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn cancel_only_requires_authentication_not_a_specific_permission() {
    let app = test_app();
    let token = bearer_token(vec!["member"], vec![]);
    let body = serde_json::json!({ "reason": "plans changed" });
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri(format!("/api/v1/visits/{}/cancel", Uuid::new_v4()))
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

fn sample_terms_json() -> serde_json::Value {
    serde_json::json!({
        "max_visits_per_month": 2,
        "max_visits_per_year": null,
        "allowed_weekdays": null,
        "allowed_time_window": null,
        "require_advance_booking": false,
        "advance_booking_days": 0,
        "allowed_facilities": null,
        "excluded_dates": [],
        "discount_percent": 10,
        "currency": "USD"
    })
}
