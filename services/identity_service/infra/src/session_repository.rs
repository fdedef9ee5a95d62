//! PostgreSQL-backed `SessionRepository`: records issued token pairs
//! for audit and supports revoking a session by id.

use async_trait::async_trait;
use identity_service_core::{Session, SessionRepository};
use shared_error::AppError;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct PgSessionRepository {
    pool: PgPool,
}

impl PgSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for PgSessionRepository {
    async fn record(&self, session: &Session) -> Result<Session, AppError> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (
                session_id, principal_id, tenant_id, access_jti, refresh_jti,
                issued_at, access_expires_at, refresh_expires_at, revoked_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(session.session_id)
        .bind(session.principal_id)
        .bind(session.tenant_id)
        .bind(session.access_jti)
        .bind(session.refresh_jti)
        .bind(session.issued_at)
        .bind(session.access_expires_at)
        .bind(session.refresh_expires_at)
        .bind(session.revoked_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(session)
    }

    async fn revoke(&self, session_id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE sessions SET revoked_at = NOW() WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn health_check(&self) -> Result<bool, AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(true)
    }
}
