//! The ordered RPC interceptor stack: every inbound request runs,
//! in order, through panic recovery, request validation, logging/correlation,
//! authentication, and authorization before it reaches a handler. Each stage is a
//! tower/axum middleware layered onto the router in that order.

pub mod correlation;
pub mod panic;
pub mod validation;

pub use correlation::{correlation_middleware, CorrelationId};
pub use panic::panic_response;
pub use validation::ValidatedJson;

use axum::middleware;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

/// Applies panic recovery, HTTP tracing, and correlation-id propagation to `router`,
/// in that order (outermost to innermost). Request validation happens per-handler
/// via `ValidatedJson`; authentication and authorization are applied per-route via
/// `shared_auth`'s extractors and `revocation_middleware`/`authz_version_middleware`,
/// which callers layer on after this function so the full order is preserved:
/// panic recovery -> validation -> logging/correlation -> authentication ->
/// authorization -> handler.
pub fn with_base_interceptors<S>(router: axum::Router<S>) -> axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(middleware::from_fn(correlation::correlation_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(panic::panic_response))
}
