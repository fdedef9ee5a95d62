//! The per-request tenant/principal context threaded through the RPC interceptor
//! stack and consulted by every tenant-scoped repository query.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Everything a handler or repository needs to know about who is making a request
/// and under what tenant, plus bookkeeping for tracing and deadline propagation.
#[derive(Debug, Clone)]
pub struct TenantContext {
    pub tenant_id: Uuid,
    pub principal_id: Uuid,
    pub roles: Vec<String>,
    pub correlation_id: Uuid,
    /// Absolute deadline for this request, if the caller supplied one.
    pub deadline: Option<DateTime<Utc>>,
}

impl TenantContext {
    pub fn new(tenant_id: Uuid, principal_id: Uuid, roles: Vec<String>, correlation_id: Uuid) -> Self {
        Self {
            tenant_id,
            principal_id,
            roles,
            correlation_id,
            deadline: None,
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.deadline.is_some_and(|d| now > d)
    }
}
