//! The Quota & Restriction Engine: a pure function over
//! already-loaded state, kept storage-free so the seven-step evaluation order is
//! unit-testable without a database.

use chrono::{Datelike, NaiveDate, NaiveTime};
use serde_json::json;
use uuid::Uuid;

use crate::model::{AgreementTerms, RestrictionType, VisitRestriction};
use shared_error::AppError;

/// A single denied-rule identifier, carried as a structured `AppError` field so
/// callers (and tests) can assert on which of the seven steps fired.
pub const RULE_BLACKLIST: &str = "blacklist";
pub const RULE_SUSPENDED: &str = "suspended";
pub const RULE_WEEKDAY_OR_WINDOW: &str = "weekday_or_time_window";
pub const RULE_EXCLUDED_DATE: &str = "excluded_date";
pub const RULE_MONTHLY_CAP: &str = "monthly_cap_exceeded";
pub const RULE_YEARLY_CAP: &str = "yearly_cap_exceeded";
pub const RULE_FACILITIES: &str = "facilities_not_allowed";

/// Evaluates a candidate visit against an agreement's terms and restrictions, checking
/// blacklist, suspension, weekday/time window, excluded dates, monthly cap, yearly cap,
/// and facility allowlist in that order. `monthly_count`/`yearly_count` must already
/// exclude cancelled visits and be scoped to `member_id` + the visiting tenant.
#[allow(clippy::too_many_arguments)]
pub fn evaluate_quota(
    terms: &AgreementTerms,
    restrictions: &[VisitRestriction],
    member_id: Uuid,
    visit_date: NaiveDate,
    visit_time: NaiveTime,
    requested_facilities: &[String],
    monthly_count: u32,
    yearly_count: u32,
) -> Result<(), AppError> {
    for restriction in restrictions {
        if !restriction.applies_to(member_id) {
            continue;
        }
        if restriction.restriction_type == RestrictionType::Blacklist {
            return Err(deny(RULE_BLACKLIST, json!({"restriction_id": restriction.restriction_id})));
        }
    }

    for restriction in restrictions {
        if !restriction.applies_to(member_id) {
            continue;
        }
        let is_timed = matches!(restriction.restriction_type, RestrictionType::Temporary | RestrictionType::Suspension);
        if is_timed && restriction.covers_date(visit_date) {
            return Err(deny(RULE_SUSPENDED, json!({"restriction_id": restriction.restriction_id})));
        }
    }

    if let Some(weekdays) = &terms.allowed_weekdays {
        if !weekdays.contains(&visit_date.weekday()) {
            return Err(deny(RULE_WEEKDAY_OR_WINDOW, json!({"weekday": visit_date.weekday().to_string()})));
        }
    }

    if let Some((window_start, window_end)) = terms.allowed_time_window {
        if visit_time < window_start || visit_time > window_end {
            return Err(deny(
                RULE_WEEKDAY_OR_WINDOW,
                json!({"visit_time": visit_time.to_string(), "window_start": window_start.to_string(), "window_end": window_end.to_string()}),
            ));
        }
    }

    if terms.excluded_dates.contains(&visit_date) {
        return Err(deny(RULE_EXCLUDED_DATE, json!({"visit_date": visit_date.to_string()})));
    }

    if let Some(max_monthly) = terms.max_visits_per_month {
        if monthly_count >= max_monthly {
            return Err(deny(RULE_MONTHLY_CAP, json!({"max": max_monthly, "count": monthly_count})));
        }
    }

    if let Some(max_yearly) = terms.max_visits_per_year {
        if yearly_count >= max_yearly {
            return Err(deny(RULE_YEARLY_CAP, json!({"max": max_yearly, "count": yearly_count})));
        }
    }

    if let Some(allowed) = &terms.allowed_facilities {
        let disallowed: Vec<&String> = requested_facilities.iter().filter(|f| !allowed.contains(f)).collect();
        if !disallowed.is_empty() {
            return Err(deny(RULE_FACILITIES, json!({"disallowed": disallowed})));
        }
    }

    Ok(())
}

fn deny(rule: &'static str, detail: serde_json::Value) -> AppError {
    AppError::forbidden("visit request denied by reciprocal agreement restrictions")
        .with_field("rule", rule)
        .with_field("detail", detail)
}

/// `[first, last]` day of the calendar month containing `date`, used to scope the
/// monthly-cap count. Shared with the infra layer's re-check-under-`SERIALIZABLE`
/// insert so both sides agree on the window.
pub fn month_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = date.with_day(1).expect("day 1 is always valid");
    let next_month_start = if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
    }
    .expect("next month's first day is always valid");
    (start, next_month_start.pred_opt().expect("day before a valid date is valid"))
}

/// `[Jan 1, Dec 31]` of the calendar year containing `date`, used to scope the
/// yearly-cap count.
pub fn year_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    (
        NaiveDate::from_ymd_opt(date.year(), 1, 1).expect("Jan 1 is always valid"),
        NaiveDate::from_ymd_opt(date.year(), 12, 31).expect("Dec 31 is always valid"),
    )
}
