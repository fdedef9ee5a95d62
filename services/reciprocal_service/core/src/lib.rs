//! Domain core for reciprocal-club agreements and visits.

pub mod agreement_service;
pub mod agreement_service_impl;
pub mod model;
pub mod quota;
pub mod repository;
pub mod verification;
pub mod visit_service;
pub mod visit_service_impl;

pub use agreement_service::{AgreementService, ReviewDecision};
pub use agreement_service_impl::AgreementServiceImpl;
pub use model::{Agreement, AgreementStatus, AgreementTerms, RestrictionType, Visit, VisitRestriction, VisitStatus};
pub use repository::{AgreementRepository, OutboxRepository, VisitRepository, VisitRestrictionRepository};
pub use visit_service::{RequestVisitInput, VisitService};
pub use visit_service_impl::VisitServiceImpl;
