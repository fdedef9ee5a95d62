//! PostgreSQL-backed `VisitRepository`.
//!
//! `create` re-validates the monthly/yearly caps inside a `SERIALIZABLE` transaction
//! before inserting, closing the race window between `evaluate_quota`'s
//! non-transactional read and the write (see DESIGN.md's Open Question resolution).

use async_trait::async_trait;
use reciprocal_service_core::quota::{month_bounds, year_bounds};
use reciprocal_service_core::{Visit, VisitRepository};
use shared_error::AppError;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct PgVisitRepository {
    pool: PgPool,
}

impl PgVisitRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VisitRepository for PgVisitRepository {
    async fn find_by_id(&self, visit_id: Uuid) -> Result<Option<Visit>, AppError> {
        let visit = sqlx::query_as::<_, Visit>("SELECT * FROM visits WHERE visit_id = $1")
            .bind(visit_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(visit)
    }

    async fn find_by_verification_code(&self, code: &str) -> Result<Option<Visit>, AppError> {
        let visit = sqlx::query_as::<_, Visit>("SELECT * FROM visits WHERE verification_code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        Ok(visit)
    }

    async fn verification_code_exists(&self, code: &str) -> Result<bool, AppError> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM visits WHERE verification_code = $1)")
                .bind(code)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    async fn count_non_cancelled_in_range(
        &self,
        member_id: Uuid,
        visiting_tenant_id: Uuid,
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    ) -> Result<u32, AppError> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT count(*) FROM visits
            WHERE member_id = $1 AND visiting_tenant_id = $2
              AND status <> 'cancelled'
              AND visit_date BETWEEN $3 AND $4
            "#,
        )
        .bind(member_id)
        .bind(visiting_tenant_id)
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        Ok(count as u32)
    }

    async fn create(&self, visit: &Visit) -> Result<Visit, AppError> {
        let (month_start, month_end) = month_bounds(visit.visit_date);
        let (year_start, year_end) = year_bounds(visit.visit_date);
        let visit = visit.clone();

        shared_db::transaction(&self.pool, move |mut tx| async move {
            sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE").execute(&mut *tx).await?;

            let terms: Option<(Json<reciprocal_service_core::AgreementTerms>,)> =
                sqlx::query_as("SELECT terms FROM agreements WHERE agreement_id = $1 FOR SHARE")
                    .bind(visit.agreement_id)
                    .fetch_optional(&mut *tx)
                    .await?;

            if let Some((Json(terms),)) = terms {
                if let Some(max_monthly) = terms.max_visits_per_month {
                    let (count,): (i64,) = sqlx::query_as(
                        r#"
                        SELECT count(*) FROM visits
                        WHERE member_id = $1 AND visiting_tenant_id = $2
                          AND status <> 'cancelled'
                          AND visit_date BETWEEN $3 AND $4
                        "#,
                    )
                    .bind(visit.member_id)
                    .bind(visit.visiting_tenant_id)
                    .bind(month_start)
                    .bind(month_end)
                    .fetch_one(&mut *tx)
                    .await?;

                    if count as u32 >= max_monthly {
                        return Err(AppError::conflict("monthly visit cap exceeded by a concurrent request")
                            .with_field("rule", reciprocal_service_core::quota::RULE_MONTHLY_CAP));
                    }
                }

                if let Some(max_yearly) = terms.max_visits_per_year {
                    let (count,): (i64,) = sqlx::query_as(
                        r#"
                        SELECT count(*) FROM visits
                        WHERE member_id = $1 AND visiting_tenant_id = $2
                          AND status <> 'cancelled'
                          AND visit_date BETWEEN $3 AND $4
                        "#,
                    )
                    .bind(visit.member_id)
                    .bind(visit.visiting_tenant_id)
                    .bind(year_start)
                    .bind(year_end)
                    .fetch_one(&mut *tx)
                    .await?;

                    if count as u32 >= max_yearly {
                        return Err(AppError::conflict("yearly visit cap exceeded by a concurrent request")
                            .with_field("rule", reciprocal_service_core::quota::RULE_YEARLY_CAP));
                    }
                }
            }

            let created = sqlx::query_as::<_, Visit>(
                r#"
                INSERT INTO visits (
                    visit_id, agreement_id, member_id, visiting_tenant_id, home_tenant_id,
                    visit_date, visit_time, purpose, guest_count, facilities_used, status, version,
                    verification_code, check_in_time, check_out_time, duration_minutes,
                    estimated_cost, actual_cost, discount_applied_percent, currency,
                    member_rating, member_feedback, club_rating, club_feedback,
                    external_anchor_id, verified_at, verified_by, created_at, updated_at
                )
                VALUES (
                    $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29
                )
                RETURNING *
                "#,
            )
            .bind(visit.visit_id)
            .bind(visit.agreement_id)
            .bind(visit.member_id)
            .bind(visit.visiting_tenant_id)
            .bind(visit.home_tenant_id)
            .bind(visit.visit_date)
            .bind(visit.visit_time)
            .bind(&visit.purpose)
            .bind(visit.guest_count)
            .bind(Json(&visit.facilities_used))
            .bind(visit.status)
            .bind(visit.version)
            .bind(&visit.verification_code)
            .bind(visit.check_in_time)
            .bind(visit.check_out_time)
            .bind(visit.duration_minutes)
            .bind(visit.estimated_cost)
            .bind(visit.actual_cost)
            .bind(visit.discount_applied_percent.map(|p| p as i16))
            .bind(&visit.currency)
            .bind(visit.member_rating)
            .bind(&visit.member_feedback)
            .bind(visit.club_rating)
            .bind(&visit.club_feedback)
            .bind(&visit.external_anchor_id)
            .bind(visit.verified_at)
            .bind(visit.verified_by)
            .bind(visit.created_at)
            .bind(visit.updated_at)
            .fetch_one(&mut *tx)
            .await?;

            Ok((created, tx))
        })
        .await
    }

    async fn update(&self, visit: &Visit) -> Result<Visit, AppError> {
        let updated = sqlx::query_as::<_, Visit>(
            r#"
            UPDATE visits
            SET status = $3,
                version = $4,
                check_in_time = $5,
                check_out_time = $6,
                duration_minutes = $7,
                actual_cost = $8,
                discount_applied_percent = $9,
                member_rating = $10,
                member_feedback = $11,
                club_rating = $12,
                club_feedback = $13,
                verified_at = $14,
                verified_by = $15,
                updated_at = $16
            WHERE visit_id = $1 AND version = $2
            RETURNING *
            "#,
        )
        .bind(visit.visit_id)
        .bind(visit.version - 1)
        .bind(visit.status)
        .bind(visit.version)
        .bind(visit.check_in_time)
        .bind(visit.check_out_time)
        .bind(visit.duration_minutes)
        .bind(visit.actual_cost)
        .bind(visit.discount_applied_percent.map(|p| p as i16))
        .bind(visit.member_rating)
        .bind(&visit.member_feedback)
        .bind(visit.club_rating)
        .bind(&visit.club_feedback)
        .bind(visit.verified_at)
        .bind(visit.verified_by)
        .bind(visit.updated_at)
        .fetch_optional(&self.pool)
        .await?;

        updated
            .ok_or_else(|| AppError::conflict("visit was modified concurrently").with_field("visit_id", visit.visit_id.to_string()))
    }

    async fn health_check(&self) -> Result<bool, AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(true)
    }
}
