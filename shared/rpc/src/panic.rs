//! Panic-recovery stage: converts a handler panic into an `Internal` response
//! instead of tearing down the connection.

use axum::response::{IntoResponse, Response};
use shared_error::AppError;
use std::any::Any;

pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    };

    tracing::error!(panic = %message, "request handler panicked");
    AppError::internal("internal server error").into_response()
}
