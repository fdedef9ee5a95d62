//! Adapts the tenant/principal repositories to `shared_auth::AuthzVersionProvider`,
//! so the authz-version staleness middleware can look up current versions without
//! depending on the repository traits directly.

use async_trait::async_trait;
use identity_service_core::{PrincipalRepository, TenantRepository};
use shared_auth::AuthzVersionProvider;
use std::sync::Arc;
use uuid::Uuid;

pub struct RepositoryVersionProvider<Te, Pr> {
    pub tenants: Arc<Te>,
    pub principals: Arc<Pr>,
}

#[async_trait]
impl<Te, Pr> AuthzVersionProvider for RepositoryVersionProvider<Te, Pr>
where
    Te: TenantRepository,
    Pr: PrincipalRepository,
{
    async fn get_versions(&self, tenant_id: Uuid, user_id: Uuid) -> Result<(i64, i64), String> {
        let tenant = self
            .tenants
            .find_by_id(tenant_id)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| "tenant not found".to_string())?;
        let principal = self
            .principals
            .find_by_id(tenant_id, user_id)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| "principal not found".to_string())?;

        Ok((tenant.authz_version, principal.authz_version))
    }
}
