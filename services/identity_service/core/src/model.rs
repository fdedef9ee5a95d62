//! Domain entities for identity and access management.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct Tenant {
    pub tenant_id: Uuid,
    pub name: String,
    pub slug: String,
    pub status: String,
    pub authz_version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An authenticatable principal. `role` is denormalized per-tenant for quick display;
/// the authoritative grant set is `RoleGrant` rows resolved at login.
#[derive(Debug, Clone, FromRow)]
pub struct Principal {
    pub principal_id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub status: String,
    pub failed_login_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
    pub authz_version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Principal {
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }

    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Role {
    pub role_id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct RolePermission {
    pub role_id: Uuid,
    pub resource: String,
    pub action: String,
}

/// A principal's assignment to a role, optionally time-bounded.
#[derive(Debug, Clone, FromRow)]
pub struct RoleGrant {
    pub grant_id: Uuid,
    pub principal_id: Uuid,
    pub tenant_id: Uuid,
    pub role_id: Uuid,
    pub expires_at: Option<DateTime<Utc>>,
}

impl RoleGrant {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|exp| exp > now)
    }
}

/// Audit-only record of an issued token pair. Never consulted during token
/// validation; exists purely for session history/administration.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub session_id: Uuid,
    pub principal_id: Uuid,
    pub tenant_id: Uuid,
    pub access_jti: Uuid,
    pub refresh_jti: Uuid,
    pub issued_at: DateTime<Utc>,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

/// The resolved set of role names and flattened permission grants for a principal,
/// computed as the union of their active, non-expired role grants.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationSnapshot {
    pub roles: Vec<String>,
    pub permissions: Vec<(String, String)>,
}
