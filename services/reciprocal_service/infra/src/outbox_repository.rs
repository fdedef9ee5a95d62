//! PostgreSQL-backed `OutboxRepository`: the transactional outbox
//! insert. The background drain loop that publishes these rows to NATS lives in the
//! api crate's `worker` module, keeping insert and drain as separate concerns.

use async_trait::async_trait;
use reciprocal_service_core::OutboxRepository;
use shared_error::AppError;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct PgOutboxRepository {
    pool: PgPool,
}

impl PgOutboxRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OutboxRepository for PgOutboxRepository {
    async fn enqueue(
        &self,
        tenant_id: Uuid,
        subject: &str,
        correlation_id: Uuid,
        payload: serde_json::Value,
    ) -> Result<Uuid, AppError> {
        let event_id = Uuid::now_v7();

        sqlx::query(
            r#"
            INSERT INTO outbox_events (
                id, tenant_id, subject, correlation_id, payload, status, retry_count, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, 'pending', 0, NOW(), NOW())
            "#,
        )
        .bind(event_id)
        .bind(tenant_id)
        .bind(subject)
        .bind(correlation_id)
        .bind(payload)
        .execute(&self.pool)
        .await?;

        Ok(event_id)
    }
}
