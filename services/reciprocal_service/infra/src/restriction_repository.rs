//! PostgreSQL-backed `VisitRestrictionRepository`.

use async_trait::async_trait;
use reciprocal_service_core::{VisitRestriction, VisitRestrictionRepository};
use shared_error::AppError;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct PgVisitRestrictionRepository {
    pool: PgPool,
}

impl PgVisitRestrictionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VisitRestrictionRepository for PgVisitRestrictionRepository {
    async fn list_active_for_agreement(&self, agreement_id: Uuid) -> Result<Vec<VisitRestriction>, AppError> {
        let restrictions = sqlx::query_as::<_, VisitRestriction>(
            "SELECT * FROM visit_restrictions WHERE agreement_id = $1 AND active = true",
        )
        .bind(agreement_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(restrictions)
    }

    async fn create(&self, restriction: &VisitRestriction) -> Result<VisitRestriction, AppError> {
        let created = sqlx::query_as::<_, VisitRestriction>(
            r#"
            INSERT INTO visit_restrictions (
                restriction_id, agreement_id, member_id, restriction_type, start_date,
                end_date, active, reason, applied_by, applied_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(restriction.restriction_id)
        .bind(restriction.agreement_id)
        .bind(restriction.member_id)
        .bind(restriction.restriction_type)
        .bind(restriction.start_date)
        .bind(restriction.end_date)
        .bind(restriction.active)
        .bind(&restriction.reason)
        .bind(restriction.applied_by)
        .bind(restriction.applied_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }
}
