//! Repository contracts for the identity service's aggregates.

use async_trait::async_trait;
use uuid::Uuid;

use shared_error::AppError;

use crate::model::{AuthorizationSnapshot, Principal, RoleGrant, Session, Tenant};

#[async_trait]
pub trait TenantRepository: Send + Sync {
    async fn find_by_id(&self, tenant_id: Uuid) -> Result<Option<Tenant>, AppError>;
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Tenant>, AppError>;
    async fn create(&self, tenant: &Tenant) -> Result<Tenant, AppError>;
    async fn bump_authz_version(&self, tenant_id: Uuid) -> Result<i64, AppError>;
    async fn health_check(&self) -> Result<bool, AppError>;
}

#[async_trait]
pub trait PrincipalRepository: Send + Sync {
    async fn find_by_email(&self, tenant_id: Uuid, email: &str) -> Result<Option<Principal>, AppError>;
    async fn find_by_id(&self, tenant_id: Uuid, principal_id: Uuid) -> Result<Option<Principal>, AppError>;
    async fn create(&self, principal: &Principal) -> Result<Principal, AppError>;
    async fn update(&self, principal: &Principal) -> Result<Principal, AppError>;
    async fn bump_authz_version(&self, tenant_id: Uuid, principal_id: Uuid) -> Result<i64, AppError>;
    async fn health_check(&self) -> Result<bool, AppError>;
}

#[async_trait]
pub trait RoleGrantRepository: Send + Sync {
    /// The resolved, flattened set of active role/permission grants for a principal.
    async fn resolve_authorization(
        &self,
        tenant_id: Uuid,
        principal_id: Uuid,
    ) -> Result<AuthorizationSnapshot, AppError>;

    async fn grant(&self, grant: &RoleGrant) -> Result<RoleGrant, AppError>;
    async fn revoke(&self, grant_id: Uuid) -> Result<(), AppError>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn record(&self, session: &Session) -> Result<Session, AppError>;
    async fn revoke(&self, session_id: Uuid) -> Result<(), AppError>;
    async fn health_check(&self) -> Result<bool, AppError>;
}
