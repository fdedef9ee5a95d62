//! Background tasks: the outbox drain loop and the agreement expiry sweep.

use std::sync::Arc;
use std::time::Duration;

use reciprocal_service_core::AgreementService;
use shared_error::AppError;
use shared_events::{EventEnvelope, MessageBus};
use sqlx::PgPool;
use tokio::time;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct OutboxWorkerConfig {
    pub poll_interval_seconds: u64,
    pub batch_size: i64,
    pub max_retries: i32,
}

#[derive(sqlx::FromRow)]
struct OutboxRow {
    id: Uuid,
    subject: String,
    correlation_id: Uuid,
    payload: serde_json::Value,
    retry_count: i32,
}

/// Polls `outbox_events` for `pending` rows and publishes each to `bus`, looping
/// forever. Spawned once from `main` with `tokio::spawn`.
pub async fn start_outbox_worker(
    pool: PgPool,
    bus: impl MessageBus + 'static,
    config: OutboxWorkerConfig,
) -> Result<(), AppError> {
    info!(?config, "starting outbox worker");
    let mut interval = time::interval(Duration::from_secs(config.poll_interval_seconds));

    loop {
        interval.tick().await;
        if let Err(e) = process_pending_events(&pool, &bus, &config).await {
            error!(error = %e.message, "error processing pending outbox events");
        }
    }
}

async fn process_pending_events(
    pool: &PgPool,
    bus: &impl MessageBus,
    config: &OutboxWorkerConfig,
) -> Result<(), AppError> {
    let events = sqlx::query_as::<_, OutboxRow>(
        r#"
        SELECT id, subject, correlation_id, payload, retry_count
        FROM outbox_events
        WHERE status = 'pending'
        ORDER BY created_at ASC
        LIMIT $1
        FOR UPDATE SKIP LOCKED
        "#,
    )
    .bind(config.batch_size)
    .fetch_all(pool)
    .await?;

    if events.is_empty() {
        return Ok(());
    }

    info!(count = events.len(), "processing pending outbox events");
    for event in events {
        if let Err(e) = process_event(pool, bus, config, &event).await {
            error!(event_id = %event.id, error = %e.message, "failed to process outbox event");
        }
    }

    Ok(())
}

async fn process_event(
    pool: &PgPool,
    bus: &impl MessageBus,
    config: &OutboxWorkerConfig,
    event: &OutboxRow,
) -> Result<(), AppError> {
    let envelope = EventEnvelope::new(&event.subject, event.id, event.correlation_id, event.payload.clone());

    match bus.publish(&event.subject, envelope).await {
        Ok(()) => {
            sqlx::query(
                "UPDATE outbox_events SET status = 'published', published_at = NOW(), updated_at = NOW() WHERE id = $1",
            )
            .bind(event.id)
            .execute(pool)
            .await?;
            info!(event_id = %event.id, subject = %event.subject, "published outbox event");
        },
        Err(e) => {
            let new_retry_count = event.retry_count + 1;
            if new_retry_count >= config.max_retries {
                sqlx::query(
                    "UPDATE outbox_events SET status = 'failed', retry_count = $2, error_message = $3, updated_at = NOW() WHERE id = $1",
                )
                .bind(event.id)
                .bind(new_retry_count)
                .bind(format!("failed to publish after {} retries: {}", config.max_retries, e.message))
                .execute(pool)
                .await?;
                error!(event_id = %event.id, "outbox event failed permanently");
            } else {
                sqlx::query(
                    "UPDATE outbox_events SET retry_count = $2, error_message = $3, updated_at = NOW() WHERE id = $1",
                )
                .bind(event.id)
                .bind(new_retry_count)
                .bind(format!("publish attempt {} failed: {}", new_retry_count, e.message))
                .execute(pool)
                .await?;
                warn!(event_id = %event.id, new_retry_count, "outbox event publish failed, will retry");
            }
        },
    }

    Ok(())
}

/// Runs `expire_sweep` on a fixed interval, each iteration minting its own
/// correlation id since there is no inbound request to inherit one from.
pub async fn start_expiry_sweep<Ag: AgreementService + 'static>(agreements: Arc<Ag>, interval_seconds: u64) {
    let mut interval = time::interval(Duration::from_secs(interval_seconds));
    loop {
        interval.tick().await;
        let correlation_id = Uuid::new_v4();
        match agreements.expire_sweep(chrono::Utc::now(), correlation_id).await {
            Ok(count) if count > 0 => info!(count, "agreement expiry sweep transitioned agreements"),
            Ok(_) => {},
            Err(e) => error!(error = %e.message, "agreement expiry sweep failed"),
        }
    }
}
