//! Bearer-token issuance and validation.
//!
//! Tokens are self-contained: role and permission grants are embedded directly in the
//! claims so that validating a token never requires a database round trip. The only
//! state a validator consults beyond the signature is the revocation overlay (carried
//! by `shared_auth`), keyed off `tenant_v`/`user_v`.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared_error::AppError;
use uuid::Uuid;

/// A `(resource, action)` permission grant, e.g. `("visit", "check_in")`.
pub type Permission = (String, String);

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Claims carried by both access and refresh tokens.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Unique token id, used by the revocation overlay to deny a single token
    /// without bumping the principal's whole authorization version.
    #[serde(default = "Uuid::new_v4")]
    pub jti: Uuid,

    /// Principal id (subject).
    pub sub: Uuid,

    pub tenant_id: Uuid,

    pub roles: Vec<String>,

    /// Flattened permission grants, resolved at issuance time.
    pub permissions: Vec<Permission>,

    pub iat: i64,
    pub exp: i64,

    pub token_type: TokenType,

    pub iss: String,
    pub aud: String,

    /// Tenant authorization version at issuance, for the revocation overlay.
    #[serde(default)]
    pub tenant_v: i64,

    /// Principal authorization version at issuance, for the revocation overlay.
    #[serde(default)]
    pub user_v: i64,
}

impl Claims {
    #[allow(clippy::too_many_arguments)]
    fn new(
        token_type: TokenType,
        sub: Uuid,
        tenant_id: Uuid,
        roles: Vec<String>,
        permissions: Vec<Permission>,
        expiration_seconds: i64,
        issuer: &str,
        audience: &str,
        tenant_v: i64,
        user_v: i64,
    ) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            jti: Uuid::new_v4(),
            sub,
            tenant_id,
            roles,
            permissions,
            iat: now,
            exp: now + expiration_seconds,
            token_type,
            iss: issuer.to_string(),
            aud: audience.to_string(),
            tenant_v,
            user_v,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn new_access(
        sub: Uuid,
        tenant_id: Uuid,
        roles: Vec<String>,
        permissions: Vec<Permission>,
        expiration_seconds: i64,
        issuer: &str,
        audience: &str,
        tenant_v: i64,
        user_v: i64,
    ) -> Self {
        Self::new(
            TokenType::Access,
            sub,
            tenant_id,
            roles,
            permissions,
            expiration_seconds,
            issuer,
            audience,
            tenant_v,
            user_v,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn new_refresh(
        sub: Uuid,
        tenant_id: Uuid,
        roles: Vec<String>,
        permissions: Vec<Permission>,
        expiration_seconds: i64,
        issuer: &str,
        audience: &str,
        tenant_v: i64,
        user_v: i64,
    ) -> Self {
        Self::new(
            TokenType::Refresh,
            sub,
            tenant_id,
            roles,
            permissions,
            expiration_seconds,
            issuer,
            audience,
            tenant_v,
            user_v,
        )
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn has_permission(&self, resource: &str, action: &str) -> bool {
        self.permissions
            .iter()
            .any(|(r, a)| r == resource && a == action)
    }
}

/// Signs `claims` with HS256.
pub fn encode_jwt(claims: &Claims, secret: &str) -> Result<String, AppError> {
    let key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::new(Algorithm::HS256), claims, &key)
        .map_err(|e| AppError::internal("failed to encode token").with_cause(e))
}

/// Verifies signature, expiry, issuer and audience. Only HS256 is accepted regardless
/// of the token's own header.
pub fn decode_jwt(token: &str, secret: &str, issuer: &str, audience: &str) -> Result<Claims, AppError> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[issuer]);
    validation.set_audience(&[audience]);

    decode::<Claims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| AppError::unauthorized("invalid token").with_cause(e))
}
