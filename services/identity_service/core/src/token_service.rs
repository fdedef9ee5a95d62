//! Token issuance, validation, refresh and revocation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use shared_auth::RevocationStore;
use shared_error::AppError;
use shared_events::{EventEnvelope, MessageBus, TokenRevokedEvent};
use shared_jwt::{decode_jwt, encode_jwt, Claims, TokenType};
use shared_rate_limit::AccountLockout;
use uuid::Uuid;

use crate::repository::{PrincipalRepository, RoleGrantRepository, SessionRepository, TenantRepository};

pub struct TokenConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
}

pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: chrono::DateTime<Utc>,
    pub refresh_expires_at: chrono::DateTime<Utc>,
}

#[async_trait]
pub trait TokenService: Send + Sync {
    async fn login(&self, tenant_id: Uuid, email: &str, password: &str) -> Result<IssuedTokens, AppError>;
    async fn validate_token(&self, token: &str) -> Result<Claims, AppError>;
    async fn refresh_token(&self, refresh_token: &str) -> Result<IssuedTokens, AppError>;
    async fn revoke_token<B: MessageBus>(&self, token: &str, bus: &B) -> Result<(), AppError>;
}

pub struct TokenServiceImpl<Pr, Te, Rg, Se> {
    pub config: TokenConfig,
    pub principals: Arc<Pr>,
    pub tenants: Arc<Te>,
    pub role_grants: Arc<Rg>,
    pub sessions: Arc<Se>,
    pub revocation: Arc<dyn RevocationStore>,
    pub lockout: AccountLockout,
}

impl<Pr, Te, Rg, Se> TokenServiceImpl<Pr, Te, Rg, Se>
where
    Pr: PrincipalRepository,
    Te: TenantRepository,
    Rg: RoleGrantRepository,
    Se: SessionRepository,
{
    fn issue_pair(
        &self,
        principal_id: Uuid,
        tenant_id: Uuid,
        roles: Vec<String>,
        permissions: Vec<(String, String)>,
        tenant_v: i64,
        user_v: i64,
    ) -> Result<IssuedTokens, AppError> {
        let access = Claims::new_access(
            principal_id,
            tenant_id,
            roles.clone(),
            permissions.clone(),
            self.config.access_ttl_seconds,
            &self.config.issuer,
            &self.config.audience,
            tenant_v,
            user_v,
        );
        let refresh = Claims::new_refresh(
            principal_id,
            tenant_id,
            roles,
            permissions,
            self.config.refresh_ttl_seconds,
            &self.config.issuer,
            &self.config.audience,
            tenant_v,
            user_v,
        );

        let access_expires_at = chrono::DateTime::from_timestamp(access.exp, 0).unwrap_or_else(Utc::now);
        let refresh_expires_at = chrono::DateTime::from_timestamp(refresh.exp, 0).unwrap_or_else(Utc::now);

        let access_token = encode_jwt(&access, &self.config.secret)?;
        let refresh_token = encode_jwt(&refresh, &self.config.secret)?;

        Ok(IssuedTokens {
            access_token,
            refresh_token,
            access_expires_at,
            refresh_expires_at,
        })
    }
}

#[async_trait]
impl<Pr, Te, Rg, Se> TokenService for TokenServiceImpl<Pr, Te, Rg, Se>
where
    Pr: PrincipalRepository,
    Te: TenantRepository,
    Rg: RoleGrantRepository,
    Se: SessionRepository,
{
    async fn login(&self, tenant_id: Uuid, email: &str, password: &str) -> Result<IssuedTokens, AppError> {
        let principal = self
            .principals
            .find_by_email(tenant_id, email)
            .await?
            .ok_or_else(|| AppError::unauthorized("invalid credentials"))?;

        let lockout_key = principal.principal_id.to_string();
        let status = self.lockout.check_lockout(&lockout_key).await.map_err(|e| {
            AppError::internal("lockout check failed").with_cause(std::io::Error::other(e.to_string()))
        })?;
        if status.is_locked {
            return Err(AppError::forbidden("account temporarily locked")
                .with_field("remaining_seconds", status.remaining_seconds.unwrap_or(0)));
        }

        if principal.is_locked(Utc::now()) {
            return Err(AppError::forbidden("account locked").with_field("locked_until", principal.locked_until.unwrap().to_rfc3339()));
        }

        if !principal.is_active() || !verify_password(password, &principal.password_hash) {
            self.lockout.record_failed_attempt(&lockout_key).await.map_err(|e| {
                AppError::internal("lockout record failed").with_cause(std::io::Error::other(e.to_string()))
            })?;
            return Err(AppError::unauthorized("invalid credentials"));
        }

        self.lockout.record_success(&lockout_key).await.map_err(|e| {
            AppError::internal("lockout reset failed").with_cause(std::io::Error::other(e.to_string()))
        })?;

        let tenant = self
            .tenants
            .find_by_id(tenant_id)
            .await?
            .ok_or_else(|| AppError::not_found("tenant not found"))?;

        let snapshot = self.role_grants.resolve_authorization(tenant_id, principal.principal_id).await?;

        let tokens = self.issue_pair(
            principal.principal_id,
            tenant_id,
            snapshot.roles,
            snapshot.permissions,
            tenant.authz_version,
            principal.authz_version,
        )?;

        Ok(tokens)
    }

    async fn validate_token(&self, token: &str) -> Result<Claims, AppError> {
        let claims = decode_jwt(token, &self.config.secret, &self.config.issuer, &self.config.audience)?;
        if claims.token_type != TokenType::Access {
            return Err(AppError::unauthorized("not an access token"));
        }
        if self.revocation.is_revoked(claims.jti).await {
            return Err(AppError::unauthorized("token has been revoked"));
        }
        Ok(claims)
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<IssuedTokens, AppError> {
        let claims = decode_jwt(refresh_token, &self.config.secret, &self.config.issuer, &self.config.audience)?;
        if claims.token_type != TokenType::Refresh {
            return Err(AppError::unauthorized("not a refresh token"));
        }
        if self.revocation.is_revoked(claims.jti).await {
            return Err(AppError::unauthorized("token has been revoked"));
        }

        // Roles/permissions are carried forward from the validated refresh claims,
        // not re-resolved: a fresh login is required to pick up grant changes.
        self.issue_pair(
            claims.sub,
            claims.tenant_id,
            claims.roles,
            claims.permissions,
            claims.tenant_v,
            claims.user_v,
        )
    }

    async fn revoke_token<B: MessageBus>(&self, token: &str, bus: &B) -> Result<(), AppError> {
        let claims = decode_jwt(token, &self.config.secret, &self.config.issuer, &self.config.audience)?;
        self.revocation.revoke(claims.jti).await;

        let event = EventEnvelope::new(
            "token.revoked",
            Uuid::now_v7(),
            Uuid::new_v4(),
            TokenRevokedEvent {
                tenant_id: claims.tenant_id,
                principal_id: Some(claims.sub),
                jti: claims.jti,
                revoked_at: Utc::now(),
            },
        );
        bus.publish("token.revoked", event).await
    }
}

/// Verifies a plaintext password against a bcrypt hash stored on the principal row.
fn verify_password(password: &str, hash: &str) -> bool {
    !password.is_empty() && bcrypt::verify(password, hash).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AuthorizationSnapshot, Principal, Session, Tenant};
    use shared_auth::InMemoryRevocationStore;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[test]
    fn issued_tokens_carry_distinct_expirations() {
        // access_ttl < refresh_ttl is an invariant of every config we construct.
        let cfg = TokenConfig {
            secret: "s".into(),
            issuer: "iss".into(),
            audience: "aud".into(),
            access_ttl_seconds: 900,
            refresh_ttl_seconds: 604_800,
        };
        assert!(cfg.access_ttl_seconds < cfg.refresh_ttl_seconds);
    }

    struct FakeTenants(Mutex<HashMap<Uuid, Tenant>>);
    struct FakePrincipals(Mutex<HashMap<(Uuid, Uuid), Principal>>);
    struct FakeRoleGrants(AuthorizationSnapshot);
    struct FakeSessions(Mutex<Vec<Session>>);

    #[async_trait]
    impl TenantRepository for FakeTenants {
        async fn find_by_id(&self, tenant_id: Uuid) -> Result<Option<Tenant>, AppError> {
            Ok(self.0.lock().unwrap().get(&tenant_id).cloned())
        }
        async fn find_by_slug(&self, _slug: &str) -> Result<Option<Tenant>, AppError> {
            unimplemented!("not exercised by these tests")
        }
        async fn create(&self, tenant: &Tenant) -> Result<Tenant, AppError> {
            self.0.lock().unwrap().insert(tenant.tenant_id, tenant.clone());
            Ok(tenant.clone())
        }
        async fn bump_authz_version(&self, tenant_id: Uuid) -> Result<i64, AppError> {
            let mut guard = self.0.lock().unwrap();
            let tenant = guard.get_mut(&tenant_id).expect("tenant exists");
            tenant.authz_version += 1;
            Ok(tenant.authz_version)
        }
        async fn health_check(&self) -> Result<bool, AppError> {
            Ok(true)
        }
    }

    #[async_trait]
    impl PrincipalRepository for FakePrincipals {
        async fn find_by_email(&self, tenant_id: Uuid, email: &str) -> Result<Option<Principal>, AppError> {
            Ok(self
                .0
                .lock()
                .unwrap()
                .values()
                .find(|p| p.tenant_id == tenant_id && p.email == email)
                .cloned())
        }
        async fn find_by_id(&self, tenant_id: Uuid, principal_id: Uuid) -> Result<Option<Principal>, AppError> {
            Ok(self.0.lock().unwrap().get(&(tenant_id, principal_id)).cloned())
        }
        async fn create(&self, principal: &Principal) -> Result<Principal, AppError> {
            self.0
                .lock()
                .unwrap()
                .insert((principal.tenant_id, principal.principal_id), principal.clone());
            Ok(principal.clone())
        }
        async fn update(&self, principal: &Principal) -> Result<Principal, AppError> {
            self.0
                .lock()
                .unwrap()
                .insert((principal.tenant_id, principal.principal_id), principal.clone());
            Ok(principal.clone())
        }
        async fn bump_authz_version(&self, tenant_id: Uuid, principal_id: Uuid) -> Result<i64, AppError> {
            let mut guard = self.0.lock().unwrap();
            let principal = guard.get_mut(&(tenant_id, principal_id)).expect("principal exists");
            principal.authz_version += 1;
            Ok(principal.authz_version)
        }
        async fn health_check(&self) -> Result<bool, AppError> {
            Ok(true)
        }
    }

    #[async_trait]
    impl RoleGrantRepository for FakeRoleGrants {
        async fn resolve_authorization(
            &self,
            _tenant_id: Uuid,
            _principal_id: Uuid,
        ) -> Result<AuthorizationSnapshot, AppError> {
            Ok(self.0.clone())
        }
        async fn grant(&self, _grant: &crate::model::RoleGrant) -> Result<crate::model::RoleGrant, AppError> {
            unimplemented!("not exercised by these tests")
        }
        async fn revoke(&self, _grant_id: Uuid) -> Result<(), AppError> {
            unimplemented!("not exercised by these tests")
        }
    }

    #[async_trait]
    impl SessionRepository for FakeSessions {
        async fn record(&self, session: &Session) -> Result<Session, AppError> {
            self.0.lock().unwrap().push(session.clone());
            Ok(session.clone())
        }
        async fn revoke(&self, _session_id: Uuid) -> Result<(), AppError> {
            Ok(())
        }
        async fn health_check(&self) -> Result<bool, AppError> {
            Ok(true)
        }
    }

    fn make_service(
        password_hash: String,
        tenant_id: Uuid,
        principal_id: Uuid,
        email: &str,
    ) -> TokenServiceImpl<FakePrincipals, FakeTenants, FakeRoleGrants, FakeSessions> {
        let now = Utc::now();
        let mut tenants = HashMap::new();
        tenants.insert(
            tenant_id,
            Tenant {
                tenant_id,
                name: "Acme".into(),
                slug: "acme".into(),
                status: "active".into(),
                authz_version: 1,
                created_at: now,
                updated_at: now,
            },
        );

        let mut principals = HashMap::new();
        principals.insert(
            (tenant_id, principal_id),
            Principal {
                principal_id,
                tenant_id,
                email: email.to_string(),
                password_hash,
                status: "active".into(),
                failed_login_attempts: 0,
                locked_until: None,
                authz_version: 1,
                created_at: now,
                updated_at: now,
            },
        );

        TokenServiceImpl {
            config: TokenConfig {
                secret: "test-secret".into(),
                issuer: "reciprocal-clubs".into(),
                audience: "reciprocal-clubs-api".into(),
                access_ttl_seconds: 900,
                refresh_ttl_seconds: 604_800,
            },
            principals: Arc::new(FakePrincipals(Mutex::new(principals))),
            tenants: Arc::new(FakeTenants(Mutex::new(tenants))),
            role_grants: Arc::new(FakeRoleGrants(AuthorizationSnapshot {
                roles: vec!["member".to_string()],
                permissions: vec![("visit".to_string(), "request".to_string())],
            })),
            sessions: Arc::new(FakeSessions(Mutex::new(Vec::new()))),
            revocation: Arc::new(InMemoryRevocationStore::new(900, 1_000)),
            lockout: shared_rate_limit::AccountLockout::in_memory(5, 900),
        }
    }

    #[tokio::test]
    async fn login_succeeds_and_embeds_resolved_permissions() {
        let tenant_id = Uuid::new_v4();
        let principal_id = Uuid::new_v4();
        let hash = bcrypt::hash("correct horse", bcrypt::DEFAULT_COST).unwrap();
        let service = make_service(hash, tenant_id, principal_id, "member@acme.test");

        let tokens = service
            .login(tenant_id, "member@acme.test", "correct horse")
            .await
            .expect("login succeeds");

        let claims = shared_jwt::decode_jwt(
            &tokens.access_token,
            &service.config.secret,
            &service.config.issuer,
            &service.config.audience,
        )
        .unwrap();
        assert_eq!(claims.sub, principal_id);
        assert!(claims.has_permission("visit", "request"));
        assert_eq!(claims.tenant_v, 1);
    }

    #[tokio::test]
    async fn login_with_wrong_password_is_rejected_and_counts_as_a_failed_attempt() {
        let tenant_id = Uuid::new_v4();
        let principal_id = Uuid::new_v4();
        let hash = bcrypt::hash("correct horse", bcrypt::DEFAULT_COST).unwrap();
        let service = make_service(hash, tenant_id, principal_id, "member@acme.test");

        let err = service
            .login(tenant_id, "member@acme.test", "wrong password")
            .await
            .unwrap_err();
        assert_eq!(err.kind, shared_error::ErrorKind::Unauthorized);

        let status = service.lockout.check_lockout(&principal_id.to_string()).await.unwrap();
        assert_eq!(status.failed_attempts, 1);
    }

    #[tokio::test]
    async fn login_locks_account_after_threshold_failed_attempts() {
        let tenant_id = Uuid::new_v4();
        let principal_id = Uuid::new_v4();
        let hash = bcrypt::hash("correct horse", bcrypt::DEFAULT_COST).unwrap();
        let service = make_service(hash, tenant_id, principal_id, "member@acme.test");

        for _ in 0..5 {
            let _ = service.login(tenant_id, "member@acme.test", "wrong").await;
        }

        let err = service
            .login(tenant_id, "member@acme.test", "correct horse")
            .await
            .unwrap_err();
        assert_eq!(err.kind, shared_error::ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn login_rejects_a_principal_with_locked_until_in_the_future() {
        let tenant_id = Uuid::new_v4();
        let principal_id = Uuid::new_v4();
        let hash = bcrypt::hash("correct horse", bcrypt::DEFAULT_COST).unwrap();
        let service = make_service(hash, tenant_id, principal_id, "member@acme.test");

        let mut principal = service.principals.find_by_id(tenant_id, principal_id).await.unwrap().unwrap();
        principal.locked_until = Some(Utc::now() + chrono::Duration::minutes(5));
        service.principals.update(&principal).await.unwrap();

        let err = service
            .login(tenant_id, "member@acme.test", "correct horse")
            .await
            .unwrap_err();
        assert_eq!(err.kind, shared_error::ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn refresh_carries_forward_claims_without_re_resolving_grants() {
        let tenant_id = Uuid::new_v4();
        let principal_id = Uuid::new_v4();
        let hash = bcrypt::hash("correct horse", bcrypt::DEFAULT_COST).unwrap();
        let service = make_service(hash, tenant_id, principal_id, "member@acme.test");

        let tokens = service
            .login(tenant_id, "member@acme.test", "correct horse")
            .await
            .unwrap();
        let refreshed = service.refresh_token(&tokens.refresh_token).await.unwrap();
        assert_ne!(tokens.access_token, refreshed.access_token);

        // An access token must never be accepted where a refresh token is required.
        let err = service.refresh_token(&tokens.access_token).await.unwrap_err();
        assert_eq!(err.kind, shared_error::ErrorKind::Unauthorized);
    }

    #[tokio::test]
    async fn revoked_access_token_is_rejected_by_validate_token() {
        let tenant_id = Uuid::new_v4();
        let principal_id = Uuid::new_v4();
        let hash = bcrypt::hash("correct horse", bcrypt::DEFAULT_COST).unwrap();
        let service = make_service(hash, tenant_id, principal_id, "member@acme.test");

        let tokens = service
            .login(tenant_id, "member@acme.test", "correct horse")
            .await
            .unwrap();
        service.validate_token(&tokens.access_token).await.expect("valid before revocation");

        service.revoke_token(&tokens.access_token, &NoopBus).await.unwrap();

        let err = service.validate_token(&tokens.access_token).await.unwrap_err();
        assert_eq!(err.kind, shared_error::ErrorKind::Unauthorized);
    }

    /// A `MessageBus` that never talks to a broker: `revoke_token` only needs one to
    /// publish an audit event, which these tests don't assert on.
    struct NoopBus;

    #[async_trait]
    impl MessageBus for NoopBus {
        async fn publish<T>(&self, _subject: &str, _envelope: EventEnvelope<T>) -> Result<(), AppError>
        where
            T: serde::Serialize + Send + Sync + 'static,
        {
            Ok(())
        }
        async fn publish_sync<T>(&self, _subject: &str, _envelope: EventEnvelope<T>) -> Result<(), AppError>
        where
            T: serde::Serialize + Send + Sync + 'static,
        {
            Ok(())
        }
        async fn subscribe<T, F, Fut>(&self, _subject: &str, _handler: F) -> Result<(), AppError>
        where
            T: serde::de::DeserializeOwned + Send + 'static,
            F: FnMut(EventEnvelope<T>) -> Fut + Send + 'static,
            Fut: std::future::Future<Output = ()> + Send + 'static,
        {
            Ok(())
        }
        async fn subscribe_queue<T, F, Fut>(
            &self,
            _subject: &str,
            _queue: &str,
            _handler: F,
        ) -> Result<(), AppError>
        where
            T: serde::de::DeserializeOwned + Send + 'static,
            F: FnMut(EventEnvelope<T>) -> Fut + Send + 'static,
            Fut: std::future::Future<Output = ()> + Send + 'static,
        {
            Ok(())
        }
        async fn request(
            &self,
            _subject: &str,
            _payload: Vec<u8>,
            _timeout: std::time::Duration,
        ) -> Result<Vec<u8>, AppError> {
            Ok(Vec::new())
        }
    }
}
