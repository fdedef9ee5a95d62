//! NATS-backed `MessageBus` implementation: connection management, automatic
//! reconnection, and publish retry with linear backoff.

use async_nats::Client;
use async_trait::async_trait;
use futures_util::stream::StreamExt;
use serde::{de::DeserializeOwned, Serialize};
use shared_error::AppError;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::bus::MessageBus;
use crate::events::EventEnvelope;

#[derive(Clone)]
pub struct NatsBus {
    client: Client,
    max_retries: u32,
    base_backoff: Duration,
}

impl NatsBus {
    pub async fn connect(
        nats_url: &str,
        max_retries: u32,
        base_backoff_seconds: u64,
    ) -> Result<Self, AppError> {
        info!(nats_url, "connecting to message bus");

        let client = async_nats::ConnectOptions::new()
            .retry_on_initial_connect()
            .reconnect_delay_callback(|attempt| {
                let delay = Duration::from_millis(2u64.pow(attempt.min(6) as u32) * 100);
                warn!(?delay, attempt, "reconnecting to message bus");
                delay
            })
            .connect(nats_url)
            .await
            .map_err(|e| AppError::unavailable("message bus connection failed").with_cause(e))?;

        info!("connected to message bus");
        Ok(Self {
            client,
            max_retries,
            base_backoff: Duration::from_secs(base_backoff_seconds),
        })
    }

    async fn publish_with_retry(&self, subject: &str, payload: Vec<u8>) -> Result<(), AppError> {
        let mut attempt = 0;
        loop {
            let result = self
                .client
                .publish(subject.to_string(), payload.clone().into())
                .await;

            match result {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.max_retries => {
                    let delay = self.base_backoff * (attempt + 1);
                    warn!(subject, attempt, ?delay, error = %e, "publish failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                },
                Err(e) => {
                    error!(subject, error = %e, "publish exhausted retries");
                    return Err(AppError::unavailable("message bus publish failed").with_cause(e));
                },
            }
        }
    }
}

/// Runs `handler` against `event`, retrying on `Err` with linear backoff
/// (`(attempt + 1) * base_backoff`) up to `max_retries`. Once retries are exhausted
/// the message is logged as failed and dropped — handlers are expected to be
/// idempotent on `(subject, message_id)` so a redelivery is harmless.
async fn run_handler_with_retry<T, F, Fut>(
    subject: &str,
    event: EventEnvelope<T>,
    handler: &mut F,
    max_retries: u32,
    base_backoff: Duration,
) where
    T: Clone,
    F: FnMut(EventEnvelope<T>) -> Fut,
    Fut: std::future::Future<Output = Result<(), AppError>>,
{
    let message_id = event.message_id;
    let mut attempt = 0;
    loop {
        match handler(event.clone()).await {
            Ok(()) => return,
            Err(e) if attempt < max_retries => {
                let delay = base_backoff * (attempt + 1);
                warn!(subject, %message_id, attempt, ?delay, error = %e.message, "event handler failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            },
            Err(e) => {
                error!(subject, %message_id, error = %e.message, "event handler exhausted retries, dropping message");
                return;
            },
        }
    }
}

#[async_trait]
impl MessageBus for NatsBus {
    async fn publish<T>(&self, subject: &str, envelope: EventEnvelope<T>) -> Result<(), AppError>
    where
        T: Serialize + Send + Sync + 'static,
    {
        let payload = serde_json::to_vec(&envelope)
            .map_err(|e| AppError::internal("event serialization failed").with_cause(e))?;
        self.publish_with_retry(subject, payload).await?;
        info!(subject, event_type = %envelope.event_type, "published event");
        Ok(())
    }

    async fn publish_sync<T>(&self, subject: &str, envelope: EventEnvelope<T>) -> Result<(), AppError>
    where
        T: Serialize + Send + Sync + 'static,
    {
        self.publish(subject, envelope).await?;
        self.client
            .flush()
            .await
            .map_err(|e| AppError::unavailable("message bus flush failed").with_cause(e))
    }

    async fn subscribe<T, F, Fut>(&self, subject: &str, mut handler: F) -> Result<(), AppError>
    where
        T: DeserializeOwned + Send + 'static,
        F: FnMut(EventEnvelope<T>) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<(), AppError>> + Send + 'static,
    {
        let subject_owned = subject.to_string();
        let mut subscriber = self.client.subscribe(subject_owned.clone()).await.map_err(|e| {
            AppError::unavailable("message bus subscribe failed").with_cause(e)
        })?;

        let max_retries = self.max_retries;
        let base_backoff = self.base_backoff;
        info!(subject = %subject_owned, "subscribed");
        tokio::spawn(async move {
            while let Some(message) = subscriber.next().await {
                match serde_json::from_slice::<EventEnvelope<T>>(&message.payload) {
                    Ok(event) => run_handler_with_retry(&subject_owned, event, &mut handler, max_retries, base_backoff).await,
                    Err(e) => error!(subject = %subject_owned, error = %e, "failed to deserialize event"),
                }
            }
            warn!(subject = %subject_owned, "subscriber stream ended");
        });

        Ok(())
    }

    async fn subscribe_queue<T, F, Fut>(
        &self,
        subject: &str,
        queue: &str,
        mut handler: F,
    ) -> Result<(), AppError>
    where
        T: DeserializeOwned + Send + 'static,
        F: FnMut(EventEnvelope<T>) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<(), AppError>> + Send + 'static,
    {
        let subject_owned = subject.to_string();
        let mut subscriber = self
            .client
            .queue_subscribe(subject_owned.clone(), queue.to_string())
            .await
            .map_err(|e| AppError::unavailable("message bus queue subscribe failed").with_cause(e))?;

        let max_retries = self.max_retries;
        let base_backoff = self.base_backoff;
        info!(subject = %subject_owned, queue, "queue subscribed");
        tokio::spawn(async move {
            while let Some(message) = subscriber.next().await {
                match serde_json::from_slice::<EventEnvelope<T>>(&message.payload) {
                    Ok(event) => run_handler_with_retry(&subject_owned, event, &mut handler, max_retries, base_backoff).await,
                    Err(e) => error!(subject = %subject_owned, error = %e, "failed to deserialize event"),
                }
            }
            warn!(subject = %subject_owned, "queue subscriber stream ended");
        });

        Ok(())
    }

    async fn request(
        &self,
        subject: &str,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> Result<Vec<u8>, AppError> {
        let fut = self.client.request(subject.to_string(), payload.into());
        match tokio::time::timeout(timeout, fut).await {
            Ok(Ok(message)) => Ok(message.payload.to_vec()),
            Ok(Err(e)) => Err(AppError::unavailable("message bus request failed").with_cause(e)),
            Err(_) => Err(AppError::timeout("message bus request timed out")),
        }
    }
}
