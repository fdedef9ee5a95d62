//! Revocation-check middleware: rejects requests bearing a token whose `jti` has
//! been explicitly revoked (e.g. on logout, or an administrator force-revoking a
//! compromised session).

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::revocation::RevocationStore;

#[derive(Clone)]
pub struct RevocationState {
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub store: Arc<dyn RevocationStore>,
}

#[derive(Debug)]
pub enum RevocationError {
    MissingToken,
    InvalidToken,
    Revoked,
}

impl IntoResponse for RevocationError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            RevocationError::MissingToken => {
                (StatusCode::UNAUTHORIZED, "MISSING_TOKEN", "missing authorization token")
            },
            RevocationError::InvalidToken => {
                (StatusCode::UNAUTHORIZED, "INVALID_TOKEN", "invalid authorization token")
            },
            RevocationError::Revoked => {
                (StatusCode::UNAUTHORIZED, "TOKEN_REVOKED", "token has been revoked")
            },
        };
        (status, axum::Json(serde_json::json!({ "error": message, "code": code }))).into_response()
    }
}

pub async fn revocation_middleware(
    State(state): State<RevocationState>,
    request: Request,
    next: Next,
) -> Result<Response, RevocationError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(RevocationError::MissingToken)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(RevocationError::InvalidToken)?;

    let claims = shared_jwt::decode_jwt(token, &state.jwt_secret, &state.jwt_issuer, &state.jwt_audience)
        .map_err(|_| RevocationError::InvalidToken)?;

    if state.store.is_revoked(claims.jti).await {
        warn!(jti = %claims.jti, "rejected revoked token");
        return Err(RevocationError::Revoked);
    }

    debug!(jti = %claims.jti, "token not revoked");
    Ok(next.run(request).await)
}
