//! Transport-agnostic message bus abstraction. `NatsBus` is the only
//! implementation today; the trait exists so domain services depend on bus semantics
//! rather than on NATS directly.

use crate::events::EventEnvelope;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use shared_error::AppError;
use std::time::Duration;

#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publishes with retry; returns once the broker has accepted the message or
    /// retries are exhausted (`Unavailable`).
    async fn publish<T>(&self, subject: &str, envelope: EventEnvelope<T>) -> Result<(), AppError>
    where
        T: Serialize + Send + Sync + 'static;

    /// Like `publish`, but blocks until the broker has flushed the write. Used where
    /// the caller needs delivery ordering guarantees before returning to its client.
    async fn publish_sync<T>(&self, subject: &str, envelope: EventEnvelope<T>) -> Result<(), AppError>
    where
        T: Serialize + Send + Sync + 'static;

    /// Subscribes, spawning a background task that invokes `handler` per message.
    /// Deserialization failures are logged and skipped; they never kill the
    /// subscription. A handler that returns `Err` is retried with linear backoff up
    /// to `max_retries`; once exhausted the message is logged as failed and dropped.
    /// Handlers should be idempotent on `(subject, envelope.message_id)`, since a
    /// retried or redelivered message may run the handler more than once.
    async fn subscribe<T, F, Fut>(&self, subject: &str, handler: F) -> Result<(), AppError>
    where
        T: DeserializeOwned + Send + 'static,
        F: FnMut(EventEnvelope<T>) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<(), AppError>> + Send + 'static;

    /// Subscribes as part of a queue group, so that only one subscriber in the group
    /// receives any given message (competing-consumers). Same retry/idempotency
    /// contract as `subscribe`.
    async fn subscribe_queue<T, F, Fut>(
        &self,
        subject: &str,
        queue: &str,
        handler: F,
    ) -> Result<(), AppError>
    where
        T: DeserializeOwned + Send + 'static,
        F: FnMut(EventEnvelope<T>) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<(), AppError>> + Send + 'static;

    /// Request/reply with a timeout; maps a broker timeout to `AppError::timeout`.
    async fn request(
        &self,
        subject: &str,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> Result<Vec<u8>, AppError>;
}
