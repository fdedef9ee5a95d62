//! PostgreSQL-backed `RoleGrantRepository`: resolves a principal's
//! effective roles and permissions through active, non-expired grants.

use async_trait::async_trait;
use identity_service_core::{AuthorizationSnapshot, RoleGrant, RoleGrantRepository};
use shared_error::AppError;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct PgRoleGrantRepository {
    pool: PgPool,
}

impl PgRoleGrantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleGrantRepository for PgRoleGrantRepository {
    async fn resolve_authorization(
        &self,
        tenant_id: Uuid,
        principal_id: Uuid,
    ) -> Result<AuthorizationSnapshot, AppError> {
        let roles: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT r.name
            FROM role_grants g
            JOIN roles r ON r.role_id = g.role_id
            WHERE g.tenant_id = $1
              AND g.principal_id = $2
              AND (g.expires_at IS NULL OR g.expires_at > NOW())
            "#,
        )
        .bind(tenant_id)
        .bind(principal_id)
        .fetch_all(&self.pool)
        .await?;

        let permissions: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT DISTINCT rp.resource, rp.action
            FROM role_grants g
            JOIN role_permissions rp ON rp.role_id = g.role_id
            WHERE g.tenant_id = $1
              AND g.principal_id = $2
              AND (g.expires_at IS NULL OR g.expires_at > NOW())
            "#,
        )
        .bind(tenant_id)
        .bind(principal_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(AuthorizationSnapshot {
            roles: roles.into_iter().map(|(name,)| name).collect(),
            permissions,
        })
    }

    async fn grant(&self, grant: &RoleGrant) -> Result<RoleGrant, AppError> {
        let grant = sqlx::query_as::<_, RoleGrant>(
            r#"
            INSERT INTO role_grants (grant_id, principal_id, tenant_id, role_id, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(grant.grant_id)
        .bind(grant.principal_id)
        .bind(grant.tenant_id)
        .bind(grant.role_id)
        .bind(grant.expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(grant)
    }

    async fn revoke(&self, grant_id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM role_grants WHERE grant_id = $1")
            .bind(grant_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
