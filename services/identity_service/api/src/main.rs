use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::{middleware, Extension, Router};

use identity_service_api::handlers::{self, AppState};
use identity_service_api::version_provider::RepositoryVersionProvider;
use identity_service_core::token_service::{TokenConfig, TokenServiceImpl};
use identity_service_infra::{PgPrincipalRepository, PgRoleGrantRepository, PgSessionRepository, PgTenantRepository};
use shared_auth::{authz_version_middleware, revocation_middleware, AuthzVersionState, InMemoryRevocationStore, RevocationState};
use shared_events::NatsBus;
use shared_rate_limit::{AccountLockout, SharedRateLimiter};

type AppTokenService =
    TokenServiceImpl<PgPrincipalRepository, PgTenantRepository, PgRoleGrantRepository, PgSessionRepository>;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = shared_config::Config::from_env().expect("failed to load configuration");
    tracing::info!("identity service configuration loaded");

    let db_pool = shared_db::init_pool(&config.database_url, 5)
        .await
        .expect("failed to connect to database");
    tracing::info!("database connected");

    let bus = NatsBus::connect(
        &config.nats_url,
        config.bus_max_retries,
        config.bus_base_backoff_seconds,
    )
    .await
    .expect("failed to connect to message bus");
    let bus = Arc::new(bus);

    let tenants = Arc::new(PgTenantRepository::new(db_pool.clone()));
    let principals = Arc::new(PgPrincipalRepository::new(db_pool.clone()));
    let role_grants = Arc::new(PgRoleGrantRepository::new(db_pool.clone()));
    let sessions = Arc::new(PgSessionRepository::new(db_pool.clone()));

    let revocation_store = Arc::new(InMemoryRevocationStore::new(
        config.jwt_expiration_seconds as u64,
        100_000,
    ));

    let rate_limiter = Arc::new(SharedRateLimiter::InMemory(Default::default()));
    let lockout = AccountLockout::new(
        rate_limiter,
        config.session_max_failed_attempts,
        config.session_lockout_minutes as u64 * 60,
    );

    let token_service = Arc::new(TokenServiceImpl {
        config: TokenConfig {
            secret: config.jwt_secret.clone(),
            issuer: config.jwt_issuer.clone(),
            audience: config.jwt_audience.clone(),
            access_ttl_seconds: config.jwt_expiration_seconds,
            refresh_ttl_seconds: config.jwt_refresh_expiration_seconds,
        },
        principals: principals.clone(),
        tenants: tenants.clone(),
        role_grants,
        sessions,
        revocation: revocation_store.clone(),
        lockout,
    });

    let authz_state = AuthzVersionState::new(
        config.jwt_secret.clone(),
        config.jwt_issuer.clone(),
        config.jwt_audience.clone(),
        Arc::new(RepositoryVersionProvider { tenants, principals }),
    );

    let state = AppState {
        token_service,
        bus,
        jwt_secret: config.jwt_secret.clone(),
        jwt_issuer: config.jwt_issuer.clone(),
        jwt_audience: config.jwt_audience.clone(),
    };

    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/v1/auth/login", post(handlers::login::<AppTokenService, NatsBus>))
        .route("/api/v1/auth/refresh", post(handlers::refresh::<AppTokenService, NatsBus>))
        .route("/api/v1/auth/revoke", post(handlers::revoke::<AppTokenService, NatsBus>));

    let revocation_state = RevocationState {
        jwt_secret: config.jwt_secret.clone(),
        jwt_issuer: config.jwt_issuer.clone(),
        jwt_audience: config.jwt_audience.clone(),
        store: revocation_store,
    };

    let protected_routes = Router::new()
        .route("/api/v1/auth/me", get(handlers::whoami))
        .route_layer(middleware::from_fn(authz_version_middleware))
        .route_layer(middleware::from_fn_with_state(revocation_state, revocation_middleware))
        .layer(Extension(authz_state));

    let app = public_routes.merge(protected_routes).with_state(state);
    let app = shared_rpc::with_base_interceptors(app);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "identity service listening");

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app.into_make_service())
        .await
        .unwrap();
}
