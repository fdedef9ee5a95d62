//! PostgreSQL-backed `AgreementRepository`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reciprocal_service_core::{Agreement, AgreementRepository};
use shared_error::AppError;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct PgAgreementRepository {
    pool: PgPool,
}

impl PgAgreementRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AgreementRepository for PgAgreementRepository {
    async fn find_by_id(&self, agreement_id: Uuid) -> Result<Option<Agreement>, AppError> {
        let agreement = sqlx::query_as::<_, Agreement>("SELECT * FROM agreements WHERE agreement_id = $1")
            .bind(agreement_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(agreement)
    }

    async fn find_non_terminal_between(
        &self,
        proposing_tenant_id: Uuid,
        target_tenant_id: Uuid,
    ) -> Result<Option<Agreement>, AppError> {
        let agreement = sqlx::query_as::<_, Agreement>(
            r#"
            SELECT * FROM agreements
            WHERE proposing_tenant_id = $1 AND target_tenant_id = $2
              AND status NOT IN ('rejected', 'expired', 'cancelled')
            "#,
        )
        .bind(proposing_tenant_id)
        .bind(target_tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(agreement)
    }

    async fn create(&self, agreement: &Agreement) -> Result<Agreement, AppError> {
        let created = sqlx::query_as::<_, Agreement>(
            r#"
            INSERT INTO agreements (
                agreement_id, proposing_tenant_id, target_tenant_id, title, description,
                terms, status, version, proposed_by, reviewed_by, proposed_at, reviewed_at,
                activated_at, expires_at, external_anchor_id, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING *
            "#,
        )
        .bind(agreement.agreement_id)
        .bind(agreement.proposing_tenant_id)
        .bind(agreement.target_tenant_id)
        .bind(&agreement.title)
        .bind(&agreement.description)
        .bind(sqlx::types::Json(&agreement.terms))
        .bind(agreement.status)
        .bind(agreement.version)
        .bind(agreement.proposed_by)
        .bind(agreement.reviewed_by)
        .bind(agreement.proposed_at)
        .bind(agreement.reviewed_at)
        .bind(agreement.activated_at)
        .bind(agreement.expires_at)
        .bind(&agreement.external_anchor_id)
        .bind(agreement.created_at)
        .bind(agreement.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn update(&self, agreement: &Agreement) -> Result<Agreement, AppError> {
        let updated = sqlx::query_as::<_, Agreement>(
            r#"
            UPDATE agreements
            SET status = $3,
                version = $4,
                reviewed_by = $5,
                reviewed_at = $6,
                activated_at = $7,
                expires_at = $8,
                updated_at = $9
            WHERE agreement_id = $1 AND version = $2
            RETURNING *
            "#,
        )
        .bind(agreement.agreement_id)
        .bind(agreement.version - 1)
        .bind(agreement.status)
        .bind(agreement.version)
        .bind(agreement.reviewed_by)
        .bind(agreement.reviewed_at)
        .bind(agreement.activated_at)
        .bind(agreement.expires_at)
        .bind(agreement.updated_at)
        .fetch_optional(&self.pool)
        .await?;

        updated.ok_or_else(|| {
            AppError::conflict("agreement was modified concurrently").with_field("agreement_id", agreement.agreement_id.to_string())
        })
    }

    async fn list_active_expired_as_of(&self, as_of: DateTime<Utc>) -> Result<Vec<Agreement>, AppError> {
        let agreements = sqlx::query_as::<_, Agreement>(
            "SELECT * FROM agreements WHERE status = 'active' AND expires_at IS NOT NULL AND expires_at <= $1",
        )
        .bind(as_of)
        .fetch_all(&self.pool)
        .await?;

        Ok(agreements)
    }

    async fn health_check(&self) -> Result<bool, AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(true)
    }
}
