use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, patch, post};
use axum::{middleware, Router};

use reciprocal_service_api::handlers::{self, AppState};
use reciprocal_service_core::{AgreementServiceImpl, VisitServiceImpl};
use reciprocal_service_infra::{
    PgAgreementRepository, PgOutboxRepository, PgVisitRepository, PgVisitRestrictionRepository,
};
use shared_auth::{revocation_middleware, InMemoryRevocationStore, RevocationState};
use shared_events::{EventEnvelope, MessageBus, NatsBus, TokenRevokedEvent};

type AppAgreementService = AgreementServiceImpl<PgAgreementRepository, PgOutboxRepository>;
type AppVisitService =
    VisitServiceImpl<PgVisitRepository, PgAgreementRepository, PgVisitRestrictionRepository, PgOutboxRepository>;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = shared_config::Config::from_env().expect("failed to load configuration");
    tracing::info!("reciprocal service configuration loaded");

    let db_pool = shared_db::init_pool(&config.database_url, 5)
        .await
        .expect("failed to connect to database");
    tracing::info!("database connected");

    let bus = NatsBus::connect(&config.nats_url, config.bus_max_retries, config.bus_base_backoff_seconds)
        .await
        .expect("failed to connect to message bus");
    let bus = Arc::new(bus);

    let revocation_store = Arc::new(InMemoryRevocationStore::new(
        config.jwt_expiration_seconds as u64,
        100_000,
    ));

    bus.subscribe_queue::<TokenRevokedEvent, _, _>(
        "token.revoked",
        "reciprocal_service",
        {
            let revocation_store = revocation_store.clone();
            move |envelope: EventEnvelope<TokenRevokedEvent>| {
                let revocation_store = revocation_store.clone();
                async move {
                    revocation_store.revoke(envelope.data.jti).await;
                    Ok(())
                }
            }
        },
    )
    .await
    .expect("failed to subscribe to token revocations");

    let agreements_repo = Arc::new(PgAgreementRepository::new(db_pool.clone()));
    let visits_repo = Arc::new(PgVisitRepository::new(db_pool.clone()));
    let restrictions_repo = Arc::new(PgVisitRestrictionRepository::new(db_pool.clone()));
    let outbox_repo = Arc::new(PgOutboxRepository::new(db_pool.clone()));

    let agreement_service =
        Arc::new(AgreementServiceImpl::new(agreements_repo.clone(), outbox_repo.clone()));
    let visit_service = Arc::new(VisitServiceImpl::new(
        visits_repo,
        agreements_repo,
        restrictions_repo,
        outbox_repo,
    ));

    tokio::spawn({
        let pool = db_pool.clone();
        let bus = (*bus).clone();
        let worker_config = reciprocal_service_api::worker::OutboxWorkerConfig {
            poll_interval_seconds: config.outbox_poll_interval_seconds,
            batch_size: config.outbox_batch_size,
            max_retries: config.outbox_max_retries,
        };
        async move {
            if let Err(e) = reciprocal_service_api::worker::start_outbox_worker(pool, bus, worker_config).await {
                tracing::error!(error = %e.message, "outbox worker exited");
            }
        }
    });

    tokio::spawn({
        let agreement_service = agreement_service.clone();
        let interval_seconds = config.agreement_expiry_sweep_interval_seconds;
        async move {
            reciprocal_service_api::worker::start_expiry_sweep(agreement_service, interval_seconds).await;
        }
    });

    let state = AppState {
        agreements: agreement_service,
        visits: visit_service,
        no_show_threshold_hours: config.no_show_threshold_hours,
        allow_direct_check_in: config.allow_direct_check_in,
        jwt_secret: config.jwt_secret.clone(),
        jwt_issuer: config.jwt_issuer.clone(),
        jwt_audience: config.jwt_audience.clone(),
    };

    let revocation_state = RevocationState {
        jwt_secret: config.jwt_secret.clone(),
        jwt_issuer: config.jwt_issuer.clone(),
        jwt_audience: config.jwt_audience.clone(),
        store: revocation_store,
    };

    let public_routes = Router::new().route("/health", get(handlers::health_check));

    let protected_routes = Router::new()
        .route("/api/v1/agreements", post(handlers::propose::<AppAgreementService, AppVisitService>))
        .route(
            "/api/v1/agreements/{agreement_id}/review",
            patch(handlers::review::<AppAgreementService, AppVisitService>),
        )
        .route(
            "/api/v1/agreements/{agreement_id}/activate",
            patch(handlers::activate::<AppAgreementService, AppVisitService>),
        )
        .route(
            "/api/v1/agreements/expire-sweep",
            post(handlers::expire_sweep::<AppAgreementService, AppVisitService>),
        )
        .route(
            "/api/v1/agreements/{agreement_id}/visits",
            post(handlers::request_visit::<AppAgreementService, AppVisitService>),
        )
        .route(
            "/api/v1/visits/{visit_id}/confirm",
            patch(handlers::confirm::<AppAgreementService, AppVisitService>),
        )
        .route(
            "/api/v1/visits/check-in",
            post(handlers::check_in::<AppAgreementService, AppVisitService>),
        )
        .route(
            "/api/v1/visits/check-out",
            post(handlers::check_out::<AppAgreementService, AppVisitService>),
        )
        .route(
            "/api/v1/visits/{visit_id}/cancel",
            post(handlers::cancel::<AppAgreementService, AppVisitService>),
        )
        .route(
            "/api/v1/visits/{visit_id}/no-show",
            patch(handlers::mark_no_show::<AppAgreementService, AppVisitService>),
        )
        .route_layer(middleware::from_fn_with_state(revocation_state, revocation_middleware));

    let app = public_routes.merge(protected_routes).with_state(state);
    let app = shared_rpc::with_base_interceptors(app);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "reciprocal service listening");

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app.into_make_service()).await.unwrap();
}
