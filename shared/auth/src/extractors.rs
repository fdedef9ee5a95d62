//! Axum extractors implementing authentication and the C3 authorization primitives:
//! `RequireAuthenticated`, `RequireAnyRole`, `RequireAllPermissions`,
//! `RequireTenantMatch`.

use axum::{
    extract::{FromRequestParts, Path},
    http::{header, request::Parts, StatusCode},
};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_jwt::Claims;

use crate::context::TenantContext;

pub trait JwtSecretProvider {
    fn jwt_secret(&self) -> &str;
    fn jwt_issuer(&self) -> &str;
    fn jwt_audience(&self) -> &str;
}

/// An authenticated principal extracted and signature/expiry-validated from the
/// bearer token. Does not by itself check role or permission membership.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub jti: Uuid,
    pub roles: Vec<String>,
    pub permissions: Vec<(String, String)>,
}

impl AuthUser {
    pub fn from_claims(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            tenant_id: claims.tenant_id,
            jti: claims.jti,
            roles: claims.roles,
            permissions: claims.permissions,
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn has_any_role(&self, roles: &[&str]) -> bool {
        roles.iter().any(|r| self.has_role(r))
    }

    pub fn has_permission(&self, resource: &str, action: &str) -> bool {
        self.permissions.iter().any(|(r, a)| r == resource && a == action)
    }

    pub fn to_context(&self, correlation_id: Uuid) -> TenantContext {
        TenantContext::new(self.tenant_id, self.user_id, self.roles.clone(), correlation_id)
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, StatusCode> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
        .ok_or(StatusCode::UNAUTHORIZED)
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync + JwtSecretProvider,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;

        let claims = shared_jwt::decode_jwt(token, state.jwt_secret(), state.jwt_issuer(), state.jwt_audience())
            .map_err(|e| {
                warn!(error = %e, "token decode failed");
                StatusCode::UNAUTHORIZED
            })?;

        debug!(user_id = %claims.sub, tenant_id = %claims.tenant_id, "authenticated principal");
        Ok(AuthUser::from_claims(claims))
    }
}

/// Marker trait implemented by zero-sized types naming a fixed set of acceptable
/// roles, for use with `RequireAnyRole<R>`.
pub trait RoleSet {
    fn allowed() -> &'static [&'static str];
}

/// Passes if the principal holds at least one of `R::allowed()`.
#[derive(Debug, Clone)]
pub struct RequireAnyRole<R: RoleSet> {
    pub user: AuthUser,
    _role: PhantomData<R>,
}

impl<S, R> FromRequestParts<S> for RequireAnyRole<R>
where
    R: RoleSet + Send + Sync,
    S: Send + Sync + JwtSecretProvider,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.has_any_role(R::allowed()) {
            warn!(user_id = %user.user_id, roles = ?user.roles, "role check failed");
            return Err(StatusCode::FORBIDDEN);
        }
        Ok(RequireAnyRole { user, _role: PhantomData })
    }
}

/// Passes if the principal holds every `(resource, action)` pair in `P::required()`.
pub trait PermissionSet {
    fn required() -> &'static [(&'static str, &'static str)];
}

#[derive(Debug, Clone)]
pub struct RequireAllPermissions<P: PermissionSet> {
    pub user: AuthUser,
    _permission: PhantomData<P>,
}

impl<S, P> FromRequestParts<S> for RequireAllPermissions<P>
where
    P: PermissionSet + Send + Sync,
    S: Send + Sync + JwtSecretProvider,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        let missing = P::required()
            .iter()
            .any(|(resource, action)| !user.has_permission(resource, action));

        if missing {
            warn!(user_id = %user.user_id, "permission check failed");
            return Err(StatusCode::FORBIDDEN);
        }
        Ok(RequireAllPermissions { user, _permission: PhantomData })
    }
}

/// Requires the authenticated principal's tenant to match a `{tenant_id}` path
/// parameter, rejecting cross-tenant access at the extractor layer (C2/C11).
#[derive(Debug, Clone)]
pub struct RequireTenantMatch(pub AuthUser);

impl<S> FromRequestParts<S> for RequireTenantMatch
where
    S: Send + Sync + JwtSecretProvider,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        let Path(path_tenant_id) = Path::<Uuid>::from_request_parts(parts, state)
            .await
            .map_err(|_| StatusCode::BAD_REQUEST)?;

        if user.tenant_id != path_tenant_id {
            warn!(user_id = %user.user_id, path_tenant_id = %path_tenant_id, "cross-tenant access denied");
            return Err(StatusCode::FORBIDDEN);
        }
        Ok(RequireTenantMatch(user))
    }
}
