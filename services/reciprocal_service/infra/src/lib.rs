//! PostgreSQL repository implementations for the reciprocal-club service.

pub mod agreement_repository;
pub mod outbox_repository;
pub mod restriction_repository;
pub mod visit_repository;

pub use agreement_repository::PgAgreementRepository;
pub use outbox_repository::PgOutboxRepository;
pub use restriction_repository::PgVisitRestrictionRepository;
pub use visit_repository::PgVisitRepository;
