//! Domain logic for identity, tenant context, and token lifecycle.

pub mod model;
pub mod repository;
pub mod token_service;

pub use model::{AuthorizationSnapshot, Principal, Role, RoleGrant, RolePermission, Session, Tenant};
pub use repository::{PrincipalRepository, RoleGrantRepository, SessionRepository, TenantRepository};
pub use token_service::{IssuedTokens, TokenConfig, TokenService, TokenServiceImpl};
