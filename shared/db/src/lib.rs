//! Postgres pool construction and a transactional-closure helper shared by both
//! services' repository implementations.

use shared_error::AppError;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use std::future::Future;

/// Builds the connection pool. Called once, from each service's composition root.
pub async fn init_pool(database_url: &str, max_connections: u32) -> Result<PgPool, AppError> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .map_err(|e| AppError::internal("failed to connect to database").with_cause(e))
}

/// Runs `f` inside a transaction, committing on `Ok` and rolling back on `Err`. Used
/// by repositories that must make multiple writes appear atomic, e.g. the quota
/// engine's cap checks or the outbox insert alongside the write it accompanies.
pub async fn transaction<T, F, Fut>(pool: &PgPool, f: F) -> Result<T, AppError>
where
    F: FnOnce(Transaction<'static, Postgres>) -> Fut,
    Fut: Future<Output = Result<(T, Transaction<'static, Postgres>), AppError>>,
{
    let tx = pool
        .begin()
        .await
        .map_err(|e| AppError::internal("failed to start transaction").with_cause(e))?;

    let (value, tx) = f(tx).await?;

    tx.commit()
        .await
        .map_err(|e| AppError::internal("failed to commit transaction").with_cause(e))?;

    Ok(value)
}
