//! PostgreSQL repository implementations for the identity service.

pub mod principal_repository;
pub mod role_grant_repository;
pub mod session_repository;
pub mod tenant_repository;

pub use principal_repository::PgPrincipalRepository;
pub use role_grant_repository::PgRoleGrantRepository;
pub use session_repository::PgSessionRepository;
pub use tenant_repository::PgTenantRepository;
