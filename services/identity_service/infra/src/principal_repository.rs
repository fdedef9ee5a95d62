//! PostgreSQL-backed `PrincipalRepository`.

use async_trait::async_trait;
use identity_service_core::{Principal, PrincipalRepository};
use shared_error::AppError;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct PgPrincipalRepository {
    pool: PgPool,
}

impl PgPrincipalRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PrincipalRepository for PgPrincipalRepository {
    async fn find_by_email(&self, tenant_id: Uuid, email: &str) -> Result<Option<Principal>, AppError> {
        let principal = sqlx::query_as::<_, Principal>(
            "SELECT * FROM principals WHERE tenant_id = $1 AND email = $2",
        )
        .bind(tenant_id)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(principal)
    }

    async fn find_by_id(&self, tenant_id: Uuid, principal_id: Uuid) -> Result<Option<Principal>, AppError> {
        let principal = sqlx::query_as::<_, Principal>(
            "SELECT * FROM principals WHERE tenant_id = $1 AND principal_id = $2",
        )
        .bind(tenant_id)
        .bind(principal_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(principal)
    }

    async fn create(&self, principal: &Principal) -> Result<Principal, AppError> {
        let principal = sqlx::query_as::<_, Principal>(
            r#"
            INSERT INTO principals (
                principal_id, tenant_id, email, password_hash, status,
                failed_login_attempts, locked_until, authz_version, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(principal.principal_id)
        .bind(principal.tenant_id)
        .bind(&principal.email)
        .bind(&principal.password_hash)
        .bind(&principal.status)
        .bind(principal.failed_login_attempts)
        .bind(principal.locked_until)
        .bind(principal.authz_version)
        .bind(principal.created_at)
        .bind(principal.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(principal)
    }

    async fn update(&self, principal: &Principal) -> Result<Principal, AppError> {
        let principal = sqlx::query_as::<_, Principal>(
            r#"
            UPDATE principals
            SET email = $3,
                password_hash = $4,
                status = $5,
                failed_login_attempts = $6,
                locked_until = $7,
                updated_at = NOW()
            WHERE tenant_id = $1 AND principal_id = $2
            RETURNING *
            "#,
        )
        .bind(principal.tenant_id)
        .bind(principal.principal_id)
        .bind(&principal.email)
        .bind(&principal.password_hash)
        .bind(&principal.status)
        .bind(principal.failed_login_attempts)
        .bind(principal.locked_until)
        .fetch_one(&self.pool)
        .await?;

        Ok(principal)
    }

    async fn bump_authz_version(&self, tenant_id: Uuid, principal_id: Uuid) -> Result<i64, AppError> {
        let (authz_version,): (i64,) = sqlx::query_as(
            "UPDATE principals SET authz_version = authz_version + 1, updated_at = NOW()
             WHERE tenant_id = $1 AND principal_id = $2
             RETURNING authz_version",
        )
        .bind(tenant_id)
        .bind(principal_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(authz_version)
    }

    async fn health_check(&self) -> Result<bool, AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(true)
    }
}
