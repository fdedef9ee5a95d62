use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use identity_service_core::TokenService;
use shared_auth::{AuthUser, JwtSecretProvider};
use shared_error::AppError;
use shared_events::MessageBus;
use shared_rpc::ValidatedJson;

use crate::dto::{HealthResponse, LoginRequest, RefreshRequest, RevokeRequest, TokenResponse, WhoAmIResponse};

pub struct AppState<S, B> {
    pub token_service: Arc<S>,
    pub bus: Arc<B>,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
}

impl<S, B> Clone for AppState<S, B> {
    fn clone(&self) -> Self {
        Self {
            token_service: Arc::clone(&self.token_service),
            bus: Arc::clone(&self.bus),
            jwt_secret: self.jwt_secret.clone(),
            jwt_issuer: self.jwt_issuer.clone(),
            jwt_audience: self.jwt_audience.clone(),
        }
    }
}

impl<S, B> JwtSecretProvider for AppState<S, B> {
    fn jwt_secret(&self) -> &str {
        &self.jwt_secret
    }

    fn jwt_issuer(&self) -> &str {
        &self.jwt_issuer
    }

    fn jwt_audience(&self) -> &str {
        &self.jwt_audience
    }
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn login<S: TokenService, B: MessageBus>(
    State(state): State<AppState<S, B>>,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let tokens = state
        .token_service
        .login(payload.tenant_id, &payload.email, &payload.password)
        .await?;

    Ok(Json(TokenResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        access_expires_at: tokens.access_expires_at,
        refresh_expires_at: tokens.refresh_expires_at,
    }))
}

pub async fn refresh<S: TokenService, B: MessageBus>(
    State(state): State<AppState<S, B>>,
    ValidatedJson(payload): ValidatedJson<RefreshRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let tokens = state.token_service.refresh_token(&payload.refresh_token).await?;

    Ok(Json(TokenResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        access_expires_at: tokens.access_expires_at,
        refresh_expires_at: tokens.refresh_expires_at,
    }))
}

pub async fn revoke<S: TokenService, B: MessageBus>(
    State(state): State<AppState<S, B>>,
    ValidatedJson(payload): ValidatedJson<RevokeRequest>,
) -> Result<StatusCode, AppError> {
    state.token_service.revoke_token(&payload.token, state.bus.as_ref()).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn whoami(user: AuthUser) -> Json<WhoAmIResponse> {
    Json(WhoAmIResponse {
        user_id: user.user_id,
        tenant_id: user.tenant_id,
        roles: user.roles,
        permissions: user.permissions,
    })
}
