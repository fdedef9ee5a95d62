//! Request-validation stage: `ValidatedJson<T>` deserializes the body and runs
//! `validator::Validate` before the handler ever sees it, so malformed input is
//! rejected as `InvalidInput` ahead of authentication and authorization.

use axum::extract::{FromRequest, Request};
use axum::Json;
use serde::de::DeserializeOwned;
use shared_error::AppError;
use validator::Validate;

pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::invalid_input(e.to_string()))?;

        value
            .validate()
            .map_err(|e| AppError::invalid_input("request validation failed").with_field("details", e.to_string()))?;

        Ok(ValidatedJson(value))
    }
}
