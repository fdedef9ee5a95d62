//! Correlation-id stage: every request gets a correlation id (reused from the
//! `x-correlation-id` request header if the caller supplied one), threaded into
//! the tracing span, request extensions, and the response headers.

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use tracing::Instrument;
use uuid::Uuid;

pub const HEADER_NAME: &str = "x-correlation-id";

#[derive(Debug, Clone, Copy)]
pub struct CorrelationId(pub Uuid);

pub async fn correlation_middleware(mut request: Request, next: Next) -> Response {
    let correlation_id = request
        .headers()
        .get(HEADER_NAME)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);

    request.extensions_mut().insert(CorrelationId(correlation_id));

    let span = tracing::info_span!("request", correlation_id = %correlation_id);
    let mut response = next.run(request).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&correlation_id.to_string()) {
        response.headers_mut().insert(HEADER_NAME, value);
    }
    response
}
