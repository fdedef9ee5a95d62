//! `AgreementService` implementation generic over the repository traits, mirroring
//! `identity_service_core::token_service::TokenServiceImpl`'s generic-over-repository
//! shape so unit tests can monomorphize over in-memory fakes with no trait-object
//! overhead.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use shared_events::{AgreementCreatedEvent, AgreementStatusUpdatedEvent};
use uuid::Uuid;

use shared_error::AppError;

use crate::agreement_service::{AgreementService, ReviewDecision};
use crate::model::{Agreement, AgreementStatus, AgreementTerms};
use crate::repository::{AgreementRepository, OutboxRepository};

pub struct AgreementServiceImpl<Ar, Or> {
    pub agreements: Arc<Ar>,
    pub outbox: Arc<Or>,
}

impl<Ar, Or> AgreementServiceImpl<Ar, Or> {
    pub fn new(agreements: Arc<Ar>, outbox: Arc<Or>) -> Self {
        Self { agreements, outbox }
    }
}

#[async_trait]
impl<Ar, Or> AgreementService for AgreementServiceImpl<Ar, Or>
where
    Ar: AgreementRepository,
    Or: OutboxRepository,
{
    async fn propose(
        &self,
        proposer: Uuid,
        proposing_tenant_id: Uuid,
        target_tenant_id: Uuid,
        title: String,
        description: Option<String>,
        terms: AgreementTerms,
        correlation_id: Uuid,
    ) -> Result<Agreement, AppError> {
        if proposing_tenant_id == target_tenant_id {
            return Err(AppError::invalid_input("proposing and target tenant must differ"));
        }
        terms.validate().map_err(AppError::invalid_input)?;

        if self
            .agreements
            .find_non_terminal_between(proposing_tenant_id, target_tenant_id)
            .await?
            .is_some()
        {
            return Err(AppError::conflict("a non-terminal agreement already exists between these tenants"));
        }

        let now = Utc::now();
        let agreement = Agreement {
            agreement_id: Uuid::now_v7(),
            proposing_tenant_id,
            target_tenant_id,
            title,
            description,
            terms,
            status: AgreementStatus::Pending,
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
        };

        let created = self.agreements.create(&agreement).await?;

        self.outbox
            .enqueue(
                proposing_tenant_id,
                "agreement.created",
                correlation_id,
                json!(AgreementCreatedEvent {
                    agreement_id: created.agreement_id,
                    tenant_id: proposing_tenant_id,
                    partner_tenant_id: target_tenant_id,
                }),
            )
            .await?;

        Ok(created)
    }

    async fn review(
        &self,
        agreement_id: Uuid,
        decision: ReviewDecision,
        reviewer: Uuid,
        caller_tenant_id: Uuid,
        correlation_id: Uuid,
    ) -> Result<Agreement, AppError> {
        let to = match decision {
            ReviewDecision::Approve => AgreementStatus::Approved,
            ReviewDecision::Reject => AgreementStatus::Rejected,
        };
        self.transition(agreement_id, to, Some(caller_tenant_id), correlation_id, |agreement| {
            agreement.reviewed_by = Some(reviewer);
            agreement.reviewed_at = Some(Utc::now());
        })
        .await
    }

    async fn activate(&self, agreement_id: Uuid, caller_tenant_id: Uuid, correlation_id: Uuid) -> Result<Agreement, AppError> {
        self.transition(agreement_id, AgreementStatus::Active, Some(caller_tenant_id), correlation_id, |agreement| {
            agreement.activated_at = Some(Utc::now());
        })
        .await
    }

    async fn expire_sweep(&self, now: DateTime<Utc>, correlation_id: Uuid) -> Result<usize, AppError> {
        let expired = self.agreements.list_active_expired_as_of(now).await?;
        let mut count = 0;
        for agreement in expired {
            // Idempotent: a concurrent sweep may have already expired this row
            // between the list query and this transition; skip rather than fail.
            if !agreement.status.can_transition_to(AgreementStatus::Expired) {
                continue;
            }
            // System-initiated: no caller tenant to check membership against.
            self.transition(agreement.agreement_id, AgreementStatus::Expired, None, correlation_id, |_| {}).await?;
            count += 1;
        }
        Ok(count)
    }
}

impl<Ar, Or> AgreementServiceImpl<Ar, Or>
where
    Ar: AgreementRepository,
    Or: OutboxRepository,
{
    async fn transition(
        &self,
        agreement_id: Uuid,
        to: AgreementStatus,
        caller_tenant_id: Option<Uuid>,
        correlation_id: Uuid,
        stamp: impl FnOnce(&mut Agreement),
    ) -> Result<Agreement, AppError> {
        let mut agreement = self
            .agreements
            .find_by_id(agreement_id)
            .await?
            .ok_or_else(|| AppError::not_found("agreement not found"))?;

        if let Some(caller_tenant_id) = caller_tenant_id {
            if agreement.proposing_tenant_id != caller_tenant_id && agreement.target_tenant_id != caller_tenant_id {
                return Err(AppError::forbidden("caller's tenant is not a party to this agreement")
                    .with_field("reason", "wrong_tenant"));
            }
        }

        if agreement.status == to {
            // Already in the target state: idempotent no-op.
            return Ok(agreement);
        }

        if !agreement.status.can_transition_to(to) {
            return Err(AppError::conflict("illegal agreement status transition")
                .with_field("from", agreement.status_str())
                .with_field("to", to.status_str()));
        }

        let from = agreement.status;
        stamp(&mut agreement);
        agreement.status = to;
        agreement.version += 1;
        agreement.updated_at = Utc::now();

        let updated = self.agreements.update(&agreement).await?;

        self.outbox
            .enqueue(
                updated.proposing_tenant_id,
                "agreement.status_updated",
                correlation_id,
                json!(AgreementStatusUpdatedEvent {
                    agreement_id: updated.agreement_id,
                    tenant_id: updated.proposing_tenant_id,
                    from_status: from.status_str().to_string(),
                    to_status: to.status_str().to_string(),
                }),
            )
            .await?;

        Ok(updated)
    }
}

impl AgreementStatus {
    fn status_str(self) -> &'static str {
        match self {
            AgreementStatus::Pending => "pending",
            AgreementStatus::Approved => "approved",
            AgreementStatus::Rejected => "rejected",
            AgreementStatus::Active => "active",
            AgreementStatus::Suspended => "suspended",
            AgreementStatus::Expired => "expired",
            AgreementStatus::Cancelled => "cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeAgreements(Mutex<HashMap<Uuid, Agreement>>);
    struct FakeOutbox(Mutex<Vec<(Uuid, String, serde_json::Value)>>);

    #[async_trait]
    impl AgreementRepository for FakeAgreements {
        async fn find_by_id(&self, agreement_id: Uuid) -> Result<Option<Agreement>, AppError> {
            Ok(self.0.lock().unwrap().get(&agreement_id).cloned())
        }

        async fn find_non_terminal_between(
            &self,
            proposing_tenant_id: Uuid,
            target_tenant_id: Uuid,
        ) -> Result<Option<Agreement>, AppError> {
            Ok(self
                .0
                .lock()
                .unwrap()
                .values()
                .find(|a| {
                    a.proposing_tenant_id == proposing_tenant_id
                        && a.target_tenant_id == target_tenant_id
                        && a.is_non_terminal()
                })
                .cloned())
        }

        async fn create(&self, agreement: &Agreement) -> Result<Agreement, AppError> {
            self.0.lock().unwrap().insert(agreement.agreement_id, agreement.clone());
            Ok(agreement.clone())
        }

        async fn update(&self, agreement: &Agreement) -> Result<Agreement, AppError> {
            self.0.lock().unwrap().insert(agreement.agreement_id, agreement.clone());
            Ok(agreement.clone())
        }

        async fn list_active_expired_as_of(&self, as_of: DateTime<Utc>) -> Result<Vec<Agreement>, AppError> {
            Ok(self
                .0
                .lock()
                .unwrap()
                .values()
                .filter(|a| a.status == AgreementStatus::Active && a.expires_at.is_some_and(|e| e <= as_of))
                .cloned()
                .collect())
        }

        async fn health_check(&self) -> Result<bool, AppError> {
            Ok(true)
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
            max_visits_per_month: None,
            max_visits_per_year: None,
            allowed_weekdays: None,
            allowed_time_window: None,
            require_advance_booking: false,
            advance_booking_days: 0,
            allowed_facilities: None,
            excluded_dates: vec![],
            discount_percent: 0,
            currency: "USD".to_string(),
        }
    }

    fn service() -> AgreementServiceImpl<FakeAgreements, FakeOutbox> {
        AgreementServiceImpl::new(
            Arc::new(FakeAgreements(Mutex::new(HashMap::new()))),
            Arc::new(FakeOutbox(Mutex::new(Vec::new()))),
        )
    }

    #[tokio::test]
    async fn propose_rejects_proposing_tenant_equal_to_target() {
        let svc = service();
        let tenant = Uuid::new_v4();
        let err = svc
            .propose(Uuid::new_v4(), tenant, tenant, "t".into(), None, terms(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert_eq!(err.kind, shared_error::ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn propose_rejects_a_second_non_terminal_agreement_between_the_same_pair() {
        let svc = service();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        svc.propose(Uuid::new_v4(), a, b, "first".into(), None, terms(), Uuid::new_v4()).await.unwrap();
        let err = svc
            .propose(Uuid::new_v4(), a, b, "second".into(), None, terms(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert_eq!(err.kind, shared_error::ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn review_then_activate_walks_the_state_machine_and_emits_events() {
        let svc = service();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let agreement = svc.propose(Uuid::new_v4(), a, b, "t".into(), None, terms(), Uuid::new_v4()).await.unwrap();

        let approved = svc
            .review(agreement.agreement_id, ReviewDecision::Approve, Uuid::new_v4(), b, Uuid::new_v4())
            .await
            .unwrap();
        assert_eq!(approved.status, AgreementStatus::Approved);

        let activated = svc.activate(agreement.agreement_id, a, Uuid::new_v4()).await.unwrap();
        assert_eq!(activated.status, AgreementStatus::Active);
        assert!(activated.activated_at.is_some());

        assert_eq!(svc.outbox.0.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn activating_a_pending_agreement_is_an_illegal_transition() {
        let svc = service();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let agreement = svc.propose(Uuid::new_v4(), a, b, "t".into(), None, terms(), Uuid::new_v4()).await.unwrap();

        let err = svc.activate(agreement.agreement_id, a, Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.kind, shared_error::ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn activating_from_an_unrelated_tenant_is_forbidden() {
        let svc = service();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let agreement = svc.propose(Uuid::new_v4(), a, b, "t".into(), None, terms(), Uuid::new_v4()).await.unwrap();
        svc.review(agreement.agreement_id, ReviewDecision::Approve, Uuid::new_v4(), b, Uuid::new_v4()).await.unwrap();

        let err = svc.activate(agreement.agreement_id, Uuid::new_v4(), Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.kind, shared_error::ErrorKind::Forbidden);
        assert_eq!(err.fields.get("reason").unwrap(), "wrong_tenant");
    }

    #[tokio::test]
    async fn expire_sweep_is_idempotent_on_re_run() {
        let svc = service();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let agreement = svc.propose(Uuid::new_v4(), a, b, "t".into(), None, terms(), Uuid::new_v4()).await.unwrap();
        svc.review(agreement.agreement_id, ReviewDecision::Approve, Uuid::new_v4(), b, Uuid::new_v4()).await.unwrap();
        let mut activated = svc.activate(agreement.agreement_id, a, Uuid::new_v4()).await.unwrap();
        activated.expires_at = Some(Utc::now() - chrono::Duration::days(1));
        svc.agreements.update(&activated).await.unwrap();

        let swept_first = svc.expire_sweep(Utc::now(), Uuid::new_v4()).await.unwrap();
        assert_eq!(swept_first, 1);
        let swept_second = svc.expire_sweep(Utc::now(), Uuid::new_v4()).await.unwrap();
        assert_eq!(swept_second, 0);
    }
}
