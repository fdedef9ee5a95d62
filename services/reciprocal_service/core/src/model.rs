//! Domain entities for reciprocal agreements and visits.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A bilateral contract between two clubs granting their members visit privileges.
#[derive(Debug, Clone, FromRow)]
pub struct Agreement {
    pub agreement_id: Uuid,
    pub proposing_tenant_id: Uuid,
    pub target_tenant_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    #[sqlx(json)]
    pub terms: AgreementTerms,
    pub status: AgreementStatus,
    pub version: i64,
    pub proposed_by: Uuid,
    pub reviewed_by: Option<Uuid>,
    pub proposed_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub activated_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub external_anchor_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agreement {
    pub fn is_non_terminal(&self) -> bool {
        !self.status.is_terminal()
    }
}

/// Structured terms negotiated between the two tenants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgreementTerms {
    pub max_visits_per_month: Option<u32>,
    pub max_visits_per_year: Option<u32>,
    pub allowed_weekdays: Option<Vec<Weekday>>,
    pub allowed_time_window: Option<(NaiveTime, NaiveTime)>,
    pub require_advance_booking: bool,
    pub advance_booking_days: u32,
    pub allowed_facilities: Option<Vec<String>>,
    pub excluded_dates: Vec<NaiveDate>,
    pub discount_percent: u8,
    pub currency: String,
}

impl AgreementTerms {
    /// `propose`'s `InvalidInput` guard: negative caps can't be represented (unsigned
    /// fields already rule that out), so this only catches an inverted time window or
    /// an out-of-range discount.
    pub fn validate(&self) -> Result<(), String> {
        if let Some((start, end)) = self.allowed_time_window {
            if end <= start {
                return Err("allowed_time_window end must be after start".to_string());
            }
        }
        if self.discount_percent > 100 {
            return Err("discount_percent must be within [0, 100]".to_string());
        }
        Ok(())
    }
}

/// Tagged state of an `Agreement`. The only legal transitions are those enumerated in
/// `AgreementStatus::can_transition_to`; anything else is `Conflict{illegal_transition}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
pub enum AgreementStatus {
    Pending,
    Approved,
    Rejected,
    Active,
    Suspended,
    Expired,
    Cancelled,
}

impl AgreementStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, AgreementStatus::Rejected | AgreementStatus::Expired | AgreementStatus::Cancelled)
    }

    /// Kept as one explicit match so an unlisted transition is always illegal and
    /// the whole table can be audited at a glance.
    pub fn can_transition_to(self, to: AgreementStatus) -> bool {
        use AgreementStatus::*;
        matches!(
            (self, to),
            (Pending, Approved)
                | (Pending, Rejected)
                | (Approved, Active)
                | (Approved, Cancelled)
                | (Active, Suspended)
                | (Active, Expired)
                | (Active, Cancelled)
                | (Suspended, Active)
                | (Suspended, Cancelled)
        )
    }
}

/// Restriction applied to visits under an agreement, consulted by the quota engine.
#[derive(Debug, Clone, FromRow)]
pub struct VisitRestriction {
    pub restriction_id: Uuid,
    pub agreement_id: Uuid,
    pub member_id: Option<Uuid>,
    pub restriction_type: RestrictionType,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub active: bool,
    pub reason: Option<String>,
    pub applied_by: Uuid,
    pub applied_at: DateTime<Utc>,
}

impl VisitRestriction {
    pub fn applies_to(&self, member_id: Uuid) -> bool {
        self.active && self.member_id.is_none_or(|m| m == member_id)
    }

    pub fn covers_date(&self, date: NaiveDate) -> bool {
        self.start_date.is_none_or(|s| date >= s) && self.end_date.is_none_or(|e| date <= e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
pub enum RestrictionType {
    Suspension,
    Limitation,
    Blacklist,
    Temporary,
}

/// A single reciprocal visit. `verification_code` is a 32-hex-character,
/// cryptographically random, globally unique token; the QR payload is derived
/// from it and never stored independently of the fields it's derived from.
#[derive(Debug, Clone, FromRow)]
pub struct Visit {
    pub visit_id: Uuid,
    pub agreement_id: Uuid,
    pub member_id: Uuid,
    pub visiting_tenant_id: Uuid,
    pub home_tenant_id: Uuid,
    pub visit_date: NaiveDate,
    pub visit_time: NaiveTime,
    pub purpose: Option<String>,
    pub guest_count: i32,
    #[sqlx(json)]
    pub facilities_used: Vec<String>,
    pub status: VisitStatus,
    pub version: i64,
    pub verification_code: String,
    pub check_in_time: Option<DateTime<Utc>>,
    pub check_out_time: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
    pub estimated_cost: Option<i64>,
    pub actual_cost: Option<i64>,
    pub discount_applied_percent: Option<u8>,
    pub currency: String,
    pub member_rating: Option<i16>,
    pub member_feedback: Option<String>,
    pub club_rating: Option<i16>,
    pub club_feedback: Option<String>,
    pub external_anchor_id: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
    pub verified_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Visit {
    pub fn qr_payload(&self) -> String {
        qr_payload(&self.verification_code, self.visit_id, self.visit_date)
    }
}

/// `"reciprocal-visit:{verification_code}:{visit_id}:{YYYY-MM-DD}"`. A bare,
/// case-sensitive, whitespace-free string.
pub fn qr_payload(verification_code: &str, visit_id: Uuid, visit_date: NaiveDate) -> String {
    format!("reciprocal-visit:{verification_code}:{visit_id}:{}", visit_date.format("%Y-%m-%d"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
pub enum VisitStatus {
    Pending,
    Confirmed,
    CheckedIn,
    Completed,
    Cancelled,
    NoShow,
}

impl VisitStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, VisitStatus::Completed | VisitStatus::Cancelled | VisitStatus::NoShow)
    }

    pub fn can_transition_to(self, to: VisitStatus) -> bool {
        use VisitStatus::*;
        matches!(
            (self, to),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, CheckedIn)
                | (Confirmed, Cancelled)
                | (Confirmed, NoShow)
                | (CheckedIn, Completed)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agreement_status_rejects_transitions_outside_the_table() {
        assert!(AgreementStatus::Pending.can_transition_to(AgreementStatus::Approved));
        assert!(!AgreementStatus::Pending.can_transition_to(AgreementStatus::Active));
        assert!(!AgreementStatus::Rejected.can_transition_to(AgreementStatus::Active));
        assert!(AgreementStatus::Suspended.can_transition_to(AgreementStatus::Active));
    }

    #[test]
    fn visit_status_allows_only_forward_progress_and_named_terminals() {
        assert!(VisitStatus::Confirmed.can_transition_to(VisitStatus::CheckedIn));
        assert!(!VisitStatus::CheckedIn.can_transition_to(VisitStatus::Cancelled));
        assert!(!VisitStatus::Completed.can_transition_to(VisitStatus::Pending));
    }

    #[test]
    fn terms_reject_inverted_time_window_and_out_of_range_discount() {
        let mut terms = AgreementTerms {
            max_visits_per_month: None,
            max_visits_per_year: None,
            allowed_weekdays: None,
            allowed_time_window: Some((NaiveTime::from_hms_opt(18, 0, 0).unwrap(), NaiveTime::from_hms_opt(9, 0, 0).unwrap())),
            require_advance_booking: false,
            advance_booking_days: 0,
            allowed_facilities: None,
            excluded_dates: vec![],
            discount_percent: 10,
            currency: "USD".to_string(),
        };
        assert!(terms.validate().is_err());

        terms.allowed_time_window = None;
        terms.discount_percent = 150;
        assert!(terms.validate().is_err());

        terms.discount_percent = 10;
        assert!(terms.validate().is_ok());
    }

    #[test]
    fn qr_payload_matches_the_documented_format() {
        let visit_id = Uuid::nil();
        let date = NaiveDate::from_ymd_opt(2026, 1, 28).unwrap();
        assert_eq!(qr_payload("abc123", visit_id, date), format!("reciprocal-visit:abc123:{visit_id}:2026-01-28"));
    }
}
