//! Per-token revocation overlay. Individual tokens can be revoked by
//! `jti` without bumping the principal's whole `user_v`/`tenant_v`, which would also
//! invalidate every other still-valid token the principal holds.

use async_trait::async_trait;
use moka::future::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct RevocationStats {
    pub hits: u64,
    pub misses: u64,
}

#[async_trait]
pub trait RevocationStore: Send + Sync {
    async fn is_revoked(&self, jti: Uuid) -> bool;
    async fn revoke(&self, jti: Uuid);
    fn stats(&self) -> RevocationStats;
}

/// In-memory revocation set, sized and TTL'd to outlive the longest-lived access
/// token so a revoked entry is never evicted while the token it denies could still
/// pass signature/expiry checks.
pub struct InMemoryRevocationStore {
    revoked: Cache<Uuid, ()>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl InMemoryRevocationStore {
    pub fn new(access_token_ttl_seconds: u64, max_entries: u64) -> Self {
        Self {
            revoked: Cache::builder()
                .max_capacity(max_entries)
                .time_to_live(Duration::from_secs(access_token_ttl_seconds))
                .build(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl RevocationStore for InMemoryRevocationStore {
    async fn is_revoked(&self, jti: Uuid) -> bool {
        let revoked = self.revoked.get(&jti).await.is_some();
        if revoked {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        revoked
    }

    async fn revoke(&self, jti: Uuid) {
        self.revoked.insert(jti, ()).await;
    }

    fn stats(&self) -> RevocationStats {
        RevocationStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unrevoked_token_passes() {
        let store = InMemoryRevocationStore::new(900, 1000);
        assert!(!store.is_revoked(Uuid::new_v4()).await);
    }

    #[tokio::test]
    async fn revoked_token_is_flagged() {
        let store = InMemoryRevocationStore::new(900, 1000);
        let jti = Uuid::new_v4();
        store.revoke(jti).await;
        assert!(store.is_revoked(jti).await);
        assert_eq!(store.stats().hits, 1);
    }
}
