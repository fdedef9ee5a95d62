//! `VisitService` implementation generic over the repository traits, gated by the
//! pure quota engine in `crate::quota`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::json;
use shared_events::{
    VisitCancelledEvent, VisitCheckedInEvent, VisitCompletedEvent, VisitConfirmedEvent, VisitNoShowEvent,
    VisitRequestedEvent,
};
use shared_types::Money;
use uuid::Uuid;

use shared_error::AppError;

use crate::model::{Agreement, AgreementStatus, Visit, VisitStatus};
use crate::quota::{evaluate_quota, month_bounds, year_bounds};
use crate::repository::{AgreementRepository, OutboxRepository, VisitRepository, VisitRestrictionRepository};
use crate::verification::generate_verification_code;
use crate::visit_service::{RequestVisitInput, VisitService};

const MAX_VERIFICATION_CODE_ATTEMPTS: u32 = 3;

pub struct VisitServiceImpl<Vr, Ar, Rr, Or> {
    pub visits: Arc<Vr>,
    pub agreements: Arc<Ar>,
    pub restrictions: Arc<Rr>,
    pub outbox: Arc<Or>,
}

impl<Vr, Ar, Rr, Or> VisitServiceImpl<Vr, Ar, Rr, Or> {
    pub fn new(visits: Arc<Vr>, agreements: Arc<Ar>, restrictions: Arc<Rr>, outbox: Arc<Or>) -> Self {
        Self { visits, agreements, restrictions, outbox }
    }
}

#[async_trait]
impl<Vr, Ar, Rr, Or> VisitService for VisitServiceImpl<Vr, Ar, Rr, Or>
where
    Vr: VisitRepository,
    Ar: AgreementRepository,
    Rr: VisitRestrictionRepository,
    Or: OutboxRepository,
{
    async fn request_visit(&self, input: RequestVisitInput, caller_tenant_id: Uuid, correlation_id: Uuid) -> Result<Visit, AppError> {
        if caller_tenant_id != input.visiting_tenant_id && caller_tenant_id != input.home_tenant_id {
            return Err(wrong_tenant());
        }

        let agreement = self
            .agreements
            .find_by_id(input.agreement_id)
            .await?
            .ok_or_else(|| AppError::not_found("agreement not found"))?;

        if agreement.status != AgreementStatus::Active {
            return Err(AppError::conflict("agreement is not active").with_field("status", agreement.status.status_str()));
        }

        let restrictions = self.restrictions.list_active_for_agreement(agreement.agreement_id).await?;

        let (month_start, month_end) = month_bounds(input.visit_date);
        let monthly_count = self
            .visits
            .count_non_cancelled_in_range(input.member_id, input.visiting_tenant_id, month_start, month_end)
            .await?;

        let (year_start, year_end) = year_bounds(input.visit_date);
        let yearly_count = self
            .visits
            .count_non_cancelled_in_range(input.member_id, input.visiting_tenant_id, year_start, year_end)
            .await?;

        evaluate_quota(
            &agreement.terms,
            &restrictions,
            input.member_id,
            input.visit_date,
            input.visit_time,
            &input.facilities_used,
            monthly_count,
            yearly_count,
        )?;

        let mut code = generate_verification_code();
        let mut attempts = 1;
        while self.visits.verification_code_exists(&code).await? {
            if attempts >= MAX_VERIFICATION_CODE_ATTEMPTS {
                return Err(AppError::internal("exhausted verification code generation attempts"));
            }
            code = generate_verification_code();
            attempts += 1;
        }

        let now = Utc::now();
        let visit = Visit {
            visit_id: Uuid::now_v7(),
            agreement_id: agreement.agreement_id,
            member_id: input.member_id,
            visiting_tenant_id: input.visiting_tenant_id,
            home_tenant_id: input.home_tenant_id,
            visit_date: input.visit_date,
            visit_time: input.visit_time,
            purpose: input.purpose,
            guest_count: input.guest_count,
            facilities_used: input.facilities_used,
            status: VisitStatus::Pending,
            version: 1,
            verification_code: code,
            check_in_time: None,
            check_out_time: None,
            duration_minutes: None,
            estimated_cost: input.estimated_cost,
            actual_cost: None,
            discount_applied_percent: None,
            currency: input.currency,
            member_rating: None,
            member_feedback: None,
            club_rating: None,
            club_feedback: None,
            external_anchor_id: None,
            verified_at: None,
            verified_by: None,
            created_at: now,
            updated_at: now,
        };

        let created = self.visits.create(&visit).await?;

        self.outbox
            .enqueue(
                created.visiting_tenant_id,
                "visit.requested",
                correlation_id,
                json!(VisitRequestedEvent {
                    visit_id: created.visit_id,
                    agreement_id: created.agreement_id,
                    tenant_id: created.visiting_tenant_id,
                    member_id: created.member_id,
                    facility_id: Uuid::nil(),
                    requested_date: created.visit_date.and_hms_opt(0, 0, 0).unwrap().and_utc(),
                }),
            )
            .await?;

        Ok(created)
    }

    async fn confirm(&self, visit_id: Uuid, confirmer: Uuid, caller_tenant_id: Uuid, correlation_id: Uuid) -> Result<Visit, AppError> {
        let mut visit = self.load(visit_id).await?;
        ensure_tenant_party(&visit, caller_tenant_id)?;

        if visit.status == VisitStatus::Confirmed {
            return Ok(visit);
        }
        if !visit.status.can_transition_to(VisitStatus::Confirmed) {
            return Err(illegal_transition(visit.status, VisitStatus::Confirmed));
        }

        visit.status = VisitStatus::Confirmed;
        visit.version += 1;
        visit.verified_at = Some(Utc::now());
        visit.verified_by = Some(confirmer);
        visit.updated_at = Utc::now();

        let updated = self.visits.update(&visit).await?;
        self.outbox
            .enqueue(
                updated.visiting_tenant_id,
                "visit.confirmed",
                correlation_id,
                json!(VisitConfirmedEvent { visit_id: updated.visit_id, tenant_id: updated.visiting_tenant_id }),
            )
            .await?;
        Ok(updated)
    }

    async fn check_in(
        &self,
        verification_code: &str,
        allow_direct_check_in: bool,
        caller_tenant_id: Uuid,
        now: DateTime<Utc>,
        correlation_id: Uuid,
    ) -> Result<Visit, AppError> {
        let mut visit = self
            .visits
            .find_by_verification_code(verification_code)
            .await?
            .ok_or_else(|| AppError::not_found("no visit found for this verification code"))?;
        ensure_tenant_party(&visit, caller_tenant_id)?;

        if visit.status == VisitStatus::CheckedIn {
            return Ok(visit);
        }

        let eligible = visit.status.can_transition_to(VisitStatus::CheckedIn)
            || (allow_direct_check_in && visit.status == VisitStatus::Pending);
        if !eligible {
            return Err(illegal_transition(visit.status, VisitStatus::CheckedIn));
        }

        visit.status = VisitStatus::CheckedIn;
        visit.version += 1;
        visit.check_in_time = Some(now);
        visit.updated_at = now;

        let updated = self.visits.update(&visit).await?;
        self.outbox
            .enqueue(
                updated.visiting_tenant_id,
                "visit.checked_in",
                correlation_id,
                json!(VisitCheckedInEvent {
                    visit_id: updated.visit_id,
                    tenant_id: updated.visiting_tenant_id,
                    checked_in_at: now,
                }),
            )
            .await?;
        Ok(updated)
    }

    async fn check_out(
        &self,
        verification_code: &str,
        actual_cost: Option<i64>,
        caller_tenant_id: Uuid,
        now: DateTime<Utc>,
        correlation_id: Uuid,
    ) -> Result<Visit, AppError> {
        let mut visit = self
            .visits
            .find_by_verification_code(verification_code)
            .await?
            .ok_or_else(|| AppError::not_found("no visit found for this verification code"))?;
        ensure_tenant_party(&visit, caller_tenant_id)?;

        if visit.status == VisitStatus::Completed {
            return Ok(visit);
        }
        if !visit.status.can_transition_to(VisitStatus::Completed) {
            return Err(illegal_transition(visit.status, VisitStatus::Completed));
        }

        let check_in_time = visit
            .check_in_time
            .ok_or_else(|| AppError::internal("checked-in visit missing check_in_time"))?;
        if now < check_in_time {
            return Err(AppError::invalid_input("check_out cannot precede check_in"));
        }

        let agreement = self.agreements.find_by_id(visit.agreement_id).await?;
        let discount_percent = agreement.as_ref().map(|a| a.terms.discount_percent);

        visit.status = VisitStatus::Completed;
        visit.version += 1;
        visit.check_out_time = Some(now);
        visit.duration_minutes = Some((now - check_in_time).num_minutes());
        if let Some(cost) = actual_cost {
            let discounted = match discount_percent {
                Some(percent) => Money(cost).apply_discount_percent(percent).0,
                None => cost,
            };
            visit.actual_cost = Some(discounted);
            visit.discount_applied_percent = discount_percent;
        }
        visit.updated_at = now;

        let updated = self.visits.update(&visit).await?;
        self.outbox
            .enqueue(
                updated.visiting_tenant_id,
                "visit.completed",
                correlation_id,
                json!(VisitCompletedEvent {
                    visit_id: updated.visit_id,
                    tenant_id: updated.visiting_tenant_id,
                    checked_out_at: now,
                }),
            )
            .await?;
        Ok(updated)
    }

    async fn cancel(&self, visit_id: Uuid, reason: Option<String>, caller_tenant_id: Uuid, correlation_id: Uuid) -> Result<Visit, AppError> {
        let mut visit = self.load(visit_id).await?;
        ensure_tenant_party(&visit, caller_tenant_id)?;

        if visit.status == VisitStatus::Cancelled {
            return Ok(visit);
        }
        if visit.status.is_terminal() || visit.status == VisitStatus::CheckedIn {
            return Err(illegal_transition(visit.status, VisitStatus::Cancelled));
        }

        visit.status = VisitStatus::Cancelled;
        visit.version += 1;
        visit.updated_at = Utc::now();

        let updated = self.visits.update(&visit).await?;
        self.outbox
            .enqueue(
                updated.visiting_tenant_id,
                "visit.cancelled",
                correlation_id,
                json!(VisitCancelledEvent {
                    visit_id: updated.visit_id,
                    tenant_id: updated.visiting_tenant_id,
                    reason: reason.clone(),
                }),
            )
            .await?;
        Ok(updated)
    }

    async fn mark_no_show(
        &self,
        visit_id: Uuid,
        caller_tenant_id: Uuid,
        now: DateTime<Utc>,
        no_show_threshold_hours: i64,
        correlation_id: Uuid,
    ) -> Result<Visit, AppError> {
        let mut visit = self.load(visit_id).await?;
        ensure_tenant_party(&visit, caller_tenant_id)?;

        if visit.status == VisitStatus::NoShow {
            return Ok(visit);
        }
        if visit.status != VisitStatus::Confirmed {
            return Err(illegal_transition(visit.status, VisitStatus::NoShow));
        }

        let visit_start = visit.visit_date.and_hms_opt(0, 0, 0).unwrap().and_utc();
        if now - visit_start < chrono::Duration::hours(no_show_threshold_hours) {
            return Err(AppError::conflict("visit date has not yet crossed the no-show threshold"));
        }

        visit.status = VisitStatus::NoShow;
        visit.version += 1;
        visit.updated_at = now;

        let updated = self.visits.update(&visit).await?;
        self.outbox
            .enqueue(
                updated.visiting_tenant_id,
                "visit.no_show",
                correlation_id,
                json!(VisitNoShowEvent { visit_id: updated.visit_id, tenant_id: updated.visiting_tenant_id }),
            )
            .await?;
        Ok(updated)
    }
}

impl<Vr, Ar, Rr, Or> VisitServiceImpl<Vr, Ar, Rr, Or>
where
    Vr: VisitRepository,
{
    async fn load(&self, visit_id: Uuid) -> Result<Visit, AppError> {
        self.visits.find_by_id(visit_id).await?.ok_or_else(|| AppError::not_found("visit not found"))
    }
}

fn illegal_transition(from: VisitStatus, to: VisitStatus) -> AppError {
    AppError::conflict("illegal visit status transition")
        .with_field("from", from.status_str())
        .with_field("to", to.status_str())
}

fn ensure_tenant_party(visit: &Visit, caller_tenant_id: Uuid) -> Result<(), AppError> {
    if visit.visiting_tenant_id != caller_tenant_id && visit.home_tenant_id != caller_tenant_id {
        return Err(wrong_tenant());
    }
    Ok(())
}

fn wrong_tenant() -> AppError {
    AppError::forbidden("caller's tenant is not a party to this visit").with_field("reason", "wrong_tenant")
}

impl VisitStatus {
    fn status_str(self) -> &'static str {
        match self {
            VisitStatus::Pending => "pending",
            VisitStatus::Confirmed => "confirmed",
            VisitStatus::CheckedIn => "checked_in",
            VisitStatus::Completed => "completed",
            VisitStatus::Cancelled => "cancelled",
            VisitStatus::NoShow => "no_show",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AgreementTerms, RestrictionType, VisitRestriction};
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeVisits(Mutex<HashMap<Uuid, Visit>>);
    struct FakeAgreements(Mutex<HashMap<Uuid, Agreement>>);
    struct FakeRestrictions(Mutex<Vec<VisitRestriction>>);
    struct FakeOutbox(Mutex<Vec<(Uuid, String, serde_json::Value)>>);

    #[async_trait]
    impl VisitRepository for FakeVisits {
        async fn find_by_id(&self, visit_id: Uuid) -> Result<Option<Visit>, AppError> {
            Ok(self.0.lock().unwrap().get(&visit_id).cloned())
        }

        async fn find_by_verification_code(&self, code: &str) -> Result<Option<Visit>, AppError> {
            Ok(self.0.lock().unwrap().values().find(|v| v.verification_code == code).cloned())
        }

        async fn verification_code_exists(&self, code: &str) -> Result<bool, AppError> {
            Ok(self.0.lock().unwrap().values().any(|v| v.verification_code == code))
        }

        async fn count_non_cancelled_in_range(
            &self,
            member_id: Uuid,
            visiting_tenant_id: Uuid,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<u32, AppError> {
            Ok(self
                .0
                .lock()
                .unwrap()
                .values()
                .filter(|v| {
                    v.member_id == member_id
                        && v.visiting_tenant_id == visiting_tenant_id
                        && v.status != VisitStatus::Cancelled
                        && v.visit_date >= start
                        && v.visit_date <= end
                })
                .count() as u32)
        }

        async fn create(&self, visit: &Visit) -> Result<Visit, AppError> {
            self.0.lock().unwrap().insert(visit.visit_id, visit.clone());
            Ok(visit.clone())
        }

        async fn update(&self, visit: &Visit) -> Result<Visit, AppError> {
            self.0.lock().unwrap().insert(visit.visit_id, visit.clone());
            Ok(visit.clone())
        }

        async fn health_check(&self) -> Result<bool, AppError> {
            Ok(true)
        }
    }

    #[async_trait]
    impl AgreementRepository for FakeAgreements {
        async fn find_by_id(&self, agreement_id: Uuid) -> Result<Option<Agreement>, AppError> {
            Ok(self.0.lock().unwrap().get(&agreement_id).cloned())
        }

        async fn find_non_terminal_between(&self, _p: Uuid, _t: Uuid) -> Result<Option<Agreement>, AppError> {
            unimplemented!("not exercised by visit_service tests")
        }

        async fn create(&self, _agreement: &Agreement) -> Result<Agreement, AppError> {
            unimplemented!("not exercised by visit_service tests")
        }

        async fn update(&self, agreement: &Agreement) -> Result<Agreement, AppError> {
            self.0.lock().unwrap().insert(agreement.agreement_id, agreement.clone());
            Ok(agreement.clone())
        }

        async fn list_active_expired_as_of(&self, _as_of: DateTime<Utc>) -> Result<Vec<Agreement>, AppError> {
            unimplemented!("not exercised by visit_service tests")
        }

        async fn health_check(&self) -> Result<bool, AppError> {
            Ok(true)
        }
    }

    #[async_trait]
    impl VisitRestrictionRepository for FakeRestrictions {
        async fn list_active_for_agreement(&self, _agreement_id: Uuid) -> Result<Vec<VisitRestriction>, AppError> {
            Ok(self.0.lock().unwrap().clone())
        }

        async fn create(&self, restriction: &VisitRestriction) -> Result<VisitRestriction, AppError> {
            self.0.lock().unwrap().push(restriction.clone());
            Ok(restriction.clone())
        }
    }

    #[async_trait]
    impl OutboxRepository for FakeOutbox {
        async fn enqueue(
            &self,
            tenant_id: Uuid,
            subject: &str,
            _correlation_id: Uuid,
            payload: serde_json::Value,
        ) -> Result<Uuid, AppError> {
            self.0.lock().unwrap().push((tenant_id, subject.to_string(), payload));
            Ok(Uuid::new_v4())
        }
    }

    fn terms() -> AgreementTerms {
        AgreementTerms {
            max_visits_per_month: Some(1),
            max_visits_per_year: Some(10),
            allowed_weekdays: None,
            allowed_time_window: None,
            require_advance_booking: false,
            advance_booking_days: 0,
            allowed_facilities: None,
            excluded_dates: vec![],
            discount_percent: 20,
            currency: "USD".to_string(),
        }
    }

    fn active_agreement(proposing: Uuid, target: Uuid) -> Agreement {
        let now = Utc::now();
        Agreement {
            agreement_id: Uuid::new_v4(),
            proposing_tenant_id: proposing,
            target_tenant_id: target,
            title: "t".to_string(),
            description: None,
            terms: terms(),
            status: AgreementStatus::Active,
            version: 1,
            proposed_by: Uuid::new_v4(),
            reviewed_by: None,
            proposed_at: now,
            reviewed_at: None,
            activated_at: Some(now),
            expires_at: None,
            external_anchor_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn service(
        agreement: Agreement,
        restrictions: Vec<VisitRestriction>,
    ) -> VisitServiceImpl<FakeVisits, FakeAgreements, FakeRestrictions, FakeOutbox> {
        let mut agreements = HashMap::new();
        let agreement_id = agreement.agreement_id;
        agreements.insert(agreement_id, agreement);
        VisitServiceImpl::new(
            Arc::new(FakeVisits(Mutex::new(HashMap::new()))),
            Arc::new(FakeAgreements(Mutex::new(agreements))),
            Arc::new(FakeRestrictions(Mutex::new(restrictions))),
            Arc::new(FakeOutbox(Mutex::new(Vec::new()))),
        )
    }

    fn input(agreement_id: Uuid, member_id: Uuid, visiting_tenant_id: Uuid, home_tenant_id: Uuid) -> RequestVisitInput {
        RequestVisitInput {
            agreement_id,
            member_id,
            visiting_tenant_id,
            home_tenant_id,
            visit_date: NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
            visit_time: chrono::NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            purpose: None,
            guest_count: 0,
            facilities_used: vec![],
            estimated_cost: Some(1000),
            currency: "USD".to_string(),
        }
    }

    #[tokio::test]
    async fn happy_path_visit_walks_the_full_lifecycle() {
        let proposing = Uuid::new_v4();
        let target = Uuid::new_v4();
        let agreement = active_agreement(proposing, target);
        let agreement_id = agreement.agreement_id;
        let svc = service(agreement, vec![]);
        let member = Uuid::new_v4();

        let visit = svc.request_visit(input(agreement_id, member, target, proposing), target, Uuid::new_v4()).await.unwrap();
        assert_eq!(visit.status, VisitStatus::Pending);
        assert_eq!(visit.verification_code.len(), 32);

        let confirmed = svc.confirm(visit.visit_id, Uuid::new_v4(), target, Uuid::new_v4()).await.unwrap();
        assert_eq!(confirmed.status, VisitStatus::Confirmed);

        let now = Utc::now();
        let checked_in = svc.check_in(&visit.verification_code, false, target, now, Uuid::new_v4()).await.unwrap();
        assert_eq!(checked_in.status, VisitStatus::CheckedIn);

        let later = now + chrono::Duration::minutes(90);
        let checked_out = svc.check_out(&visit.verification_code, Some(1000), target, later, Uuid::new_v4()).await.unwrap();
        assert_eq!(checked_out.status, VisitStatus::Completed);
        assert_eq!(checked_out.duration_minutes, Some(90));
        assert_eq!(checked_out.actual_cost, Some(800));

        assert_eq!(svc.outbox.0.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn monthly_cap_denies_the_second_visit_in_the_same_month() {
        let proposing = Uuid::new_v4();
        let target = Uuid::new_v4();
        let agreement = active_agreement(proposing, target);
        let agreement_id = agreement.agreement_id;
        let svc = service(agreement, vec![]);
        let member = Uuid::new_v4();

        svc.request_visit(input(agreement_id, member, target, proposing), target, Uuid::new_v4()).await.unwrap();
        let err = svc
            .request_visit(input(agreement_id, member, target, proposing), target, Uuid::new_v4())
            .await
            .unwrap_err();
        assert_eq!(err.fields.get("rule").unwrap(), crate::quota::RULE_MONTHLY_CAP);
    }

    #[tokio::test]
    async fn blacklisted_member_is_denied() {
        let proposing = Uuid::new_v4();
        let target = Uuid::new_v4();
        let agreement = active_agreement(proposing, target);
        let agreement_id = agreement.agreement_id;
        let member = Uuid::new_v4();
        let restriction = VisitRestriction {
            restriction_id: Uuid::new_v4(),
            agreement_id,
            member_id: Some(member),
            restriction_type: RestrictionType::Blacklist,
            start_date: None,
            end_date: None,
            active: true,
            reason: Some("fraud".to_string()),
            applied_by: Uuid::new_v4(),
            applied_at: Utc::now(),
        };
        let svc = service(agreement, vec![restriction]);

        let err = svc
            .request_visit(input(agreement_id, member, target, proposing), target, Uuid::new_v4())
            .await
            .unwrap_err();
        assert_eq!(err.fields.get("rule").unwrap(), crate::quota::RULE_BLACKLIST);
    }

    #[tokio::test]
    async fn requesting_against_a_non_active_agreement_is_a_conflict() {
        let proposing = Uuid::new_v4();
        let target = Uuid::new_v4();
        let mut agreement = active_agreement(proposing, target);
        agreement.status = AgreementStatus::Suspended;
        let agreement_id = agreement.agreement_id;
        let svc = service(agreement, vec![]);

        let err = svc
            .request_visit(input(agreement_id, Uuid::new_v4(), target, proposing), target, Uuid::new_v4())
            .await
            .unwrap_err();
        assert_eq!(err.kind, shared_error::ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn check_in_is_rejected_from_an_illegal_prior_state() {
        let proposing = Uuid::new_v4();
        let target = Uuid::new_v4();
        let agreement = active_agreement(proposing, target);
        let agreement_id = agreement.agreement_id;
        let svc = service(agreement, vec![]);
        let visit = svc
            .request_visit(input(agreement_id, Uuid::new_v4(), target, proposing), target, Uuid::new_v4())
            .await
            .unwrap();

        let err = svc.check_in(&visit.verification_code, false, target, Utc::now(), Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.kind, shared_error::ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn request_visit_from_an_unrelated_tenant_is_forbidden() {
        let proposing = Uuid::new_v4();
        let target = Uuid::new_v4();
        let agreement = active_agreement(proposing, target);
        let agreement_id = agreement.agreement_id;
        let svc = service(agreement, vec![]);

        let err = svc
            .request_visit(input(agreement_id, Uuid::new_v4(), target, proposing), Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert_eq!(err.kind, shared_error::ErrorKind::Forbidden);
        assert_eq!(err.fields.get("reason").unwrap(), "wrong_tenant");
    }

    #[tokio::test]
    async fn cancel_from_an_unrelated_tenant_is_forbidden() {
        let proposing = Uuid::new_v4();
        let target = Uuid::new_v4();
        let agreement = active_agreement(proposing, target);
        let agreement_id = agreement.agreement_id;
        let svc = service(agreement, vec![]);
        let visit = svc
            .request_visit(input(agreement_id, Uuid::new_v4(), target, proposing), target, Uuid::new_v4())
            .await
            .unwrap();

        let err = svc.cancel(visit.visit_id, None, Uuid::new_v4(), Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.kind, shared_error::ErrorKind::Forbidden);
        assert_eq!(err.fields.get("reason").unwrap(), "wrong_tenant");
    }
}
