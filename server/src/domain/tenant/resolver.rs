//! Bearer key to tenant resolution with a TTL cache
//!
//! Raw keys are hashed (SHA-256) before any lookup; only digests are cached
//! or compared. A cached entry is trusted strictly before its expiry and is
//! otherwise treated as a miss and refreshed from the key store.
//!
//! Revocation is not pushed into the cache: a revoked key keeps resolving
//! until its entry expires, so the cache TTL is the upper bound on how long
//! a revocation takes to apply.

use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use thiserror::Error;
use tokio::time::Instant;

use crate::core::constants::{
    KEY_TOUCH_TIMEOUT_SECS, TENANT_CACHE_MAX_ENTRIES, TENANT_CACHE_TTL_SECS,
};
use crate::data::types::KeyStatus;
use crate::data::{DataError, TenantKeyStore};
use crate::utils::api_key::hash_api_key;

#[derive(Error, Debug)]
pub enum ResolveError {
    /// Unknown key, revoked key or inactive tenant; deliberately indistinct
    #[error("unauthorized")]
    Unauthorized,

    #[error("tenant lookup failed: {0}")]
    Store(#[from] DataError),
}

#[derive(Debug, Clone)]
struct CacheEntry {
    tenant_id: String,
    expires_at: Instant,
}

pub struct TenantResolver {
    store: Arc<dyn TenantKeyStore>,
    ttl: Duration,
    /// Keyed by key digest. moka evicts by age and size in the background;
    /// `expires_at` is still checked on every read.
    cache: Cache<String, CacheEntry>,
}

impl TenantResolver {
    pub fn new(store: Arc<dyn TenantKeyStore>) -> Self {
        Self::with_ttl(store, Duration::from_secs(TENANT_CACHE_TTL_SECS))
    }

    pub fn with_ttl(store: Arc<dyn TenantKeyStore>, ttl: Duration) -> Self {
        Self::with_limits(store, ttl, TENANT_CACHE_MAX_ENTRIES)
    }

    pub fn with_limits(store: Arc<dyn TenantKeyStore>, ttl: Duration, max_entries: u64) -> Self {
        Self {
            store,
            ttl,
            cache: Cache::builder()
                .max_capacity(max_entries)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Map a raw bearer key to its tenant id
    pub async fn resolve(&self, raw_key: &str) -> Result<String, ResolveError> {
        let key_hash = hash_api_key(raw_key);

        if let Some(tenant_id) = self.cached(&key_hash) {
            return Ok(tenant_id);
        }

        let resolved = self
            .store
            .lookup_key(&key_hash)
            .await?
            .ok_or(ResolveError::Unauthorized)?;
        if resolved.key_status != KeyStatus::Active {
            return Err(ResolveError::Unauthorized);
        }

        self.cache.insert(
            key_hash.clone(),
            CacheEntry {
                tenant_id: resolved.tenant_id.clone(),
                expires_at: Instant::now() + self.ttl,
            },
        );

        self.touch_in_background(key_hash);

        Ok(resolved.tenant_id)
    }

    fn cached(&self, key_hash: &str) -> Option<String> {
        self.cache
            .get(key_hash)
            .filter(|entry| Instant::now() < entry.expires_at)
            .map(|entry| entry.tenant_id)
    }

    /// Fire-and-forget last-used update; never affects the resolution result
    fn touch_in_background(&self, key_hash: String) {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            let timeout = Duration::from_secs(KEY_TOUCH_TIMEOUT_SECS);
            match tokio::time::timeout(timeout, store.touch_key(&key_hash)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::debug!(error = %e, "Failed to update key last_used_at"),
                Err(_) => tracing::debug!("Timed out updating key last_used_at"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::data::types::ResolvedKey;

    #[derive(Default)]
    struct FakeKeyStore {
        keys: Mutex<HashMap<String, ResolvedKey>>,
        lookups: AtomicUsize,
        touches: AtomicUsize,
        fail: bool,
        hang_touch: bool,
    }

    impl FakeKeyStore {
        fn with_key(raw: &str, tenant_id: &str, status: KeyStatus) -> Self {
            let store = Self::default();
            store.keys.lock().insert(
                hash_api_key(raw),
                ResolvedKey {
                    tenant_id: tenant_id.to_string(),
                    key_status: status,
                },
            );
            store
        }
    }

    #[async_trait]
    impl TenantKeyStore for FakeKeyStore {
        async fn lookup_key(&self, key_hash: &str) -> Result<Option<ResolvedKey>, DataError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(DataError::backend_unavailable("postgres", "down"));
            }
            Ok(self.keys.lock().get(key_hash).cloned())
        }

        async fn touch_key(&self, _key_hash: &str) -> Result<(), DataError> {
            if self.hang_touch {
                std::future::pending::<()>().await;
            }
            self.touches.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_hit_within_ttl() {
        let store = Arc::new(FakeKeyStore::with_key("ax_live_k", "tn_a", KeyStatus::Active));
        let resolver = TenantResolver::with_ttl(store.clone(), Duration::from_secs(300));

        assert_eq!(resolver.resolve("ax_live_k").await.unwrap(), "tn_a");
        tokio::time::advance(Duration::from_secs(299)).await;
        assert_eq!(resolver.resolve("ax_live_k").await.unwrap(), "tn_a");

        assert_eq!(store.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_requeries_store() {
        let store = Arc::new(FakeKeyStore::with_key("ax_live_k", "tn_a", KeyStatus::Active));
        let resolver = TenantResolver::with_ttl(store.clone(), Duration::from_secs(300));

        resolver.resolve("ax_live_k").await.unwrap();
        tokio::time::advance(Duration::from_secs(300)).await;
        assert_eq!(resolver.resolve("ax_live_k").await.unwrap(), "tn_a");

        assert_eq!(store.lookups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_revoked_key_served_until_expiry() {
        let store = Arc::new(FakeKeyStore::with_key("ax_live_k", "tn_a", KeyStatus::Active));
        let resolver = TenantResolver::with_ttl(store.clone(), Duration::from_secs(300));
        resolver.resolve("ax_live_k").await.unwrap();

        store
            .keys
            .lock()
            .get_mut(&hash_api_key("ax_live_k"))
            .unwrap()
            .key_status = KeyStatus::Revoked;

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(resolver.resolve("ax_live_k").await.is_ok());

        tokio::time::advance(Duration::from_secs(240)).await;
        assert!(matches!(
            resolver.resolve("ax_live_k").await,
            Err(ResolveError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_cache_size_is_bounded() {
        let store = FakeKeyStore::default();
        for i in 0..50 {
            store.keys.lock().insert(
                hash_api_key(&format!("ax_live_{i}")),
                ResolvedKey {
                    tenant_id: format!("tn_{i}"),
                    key_status: KeyStatus::Active,
                },
            );
        }
        let resolver = TenantResolver::with_limits(Arc::new(store), Duration::from_secs(300), 10);

        for i in 0..50 {
            assert_eq!(
                resolver.resolve(&format!("ax_live_{i}")).await.unwrap(),
                format!("tn_{i}")
            );
        }
        resolver.cache.run_pending_tasks();
        assert!(resolver.cache.entry_count() <= 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_after_expiry_replaces_entry() {
        let store = Arc::new(FakeKeyStore::with_key("ax_live_k", "tn_a", KeyStatus::Active));
        let resolver = TenantResolver::with_ttl(store.clone(), Duration::from_secs(300));
        resolver.resolve("ax_live_k").await.unwrap();

        tokio::time::advance(Duration::from_secs(301)).await;
        resolver.resolve("ax_live_k").await.unwrap();
        resolver.cache.run_pending_tasks();
        assert_eq!(resolver.cache.entry_count(), 1);

        // Served from the refreshed entry
        resolver.resolve("ax_live_k").await.unwrap();
        assert_eq!(store.lookups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unknown_key_unauthorized_and_not_cached() {
        let store = Arc::new(FakeKeyStore::default());
        let resolver = TenantResolver::new(store.clone());

        for _ in 0..2 {
            assert!(matches!(
                resolver.resolve("nope").await,
                Err(ResolveError::Unauthorized)
            ));
        }
        assert_eq!(store.lookups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_store_failure_surfaces_as_store_error() {
        let store = Arc::new(FakeKeyStore {
            fail: true,
            ..Default::default()
        });
        let resolver = TenantResolver::new(store);

        assert!(matches!(
            resolver.resolve("ax_live_k").await,
            Err(ResolveError::Store(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_touch_runs_detached() {
        let store = Arc::new(FakeKeyStore::with_key("ax_live_k", "tn_a", KeyStatus::Active));
        let resolver = TenantResolver::new(store.clone());

        resolver.resolve("ax_live_k").await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(store.touches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_touch_does_not_block_resolution() {
        let mut store = FakeKeyStore::with_key("ax_live_k", "tn_a", KeyStatus::Active);
        store.hang_touch = true;
        let resolver = TenantResolver::new(Arc::new(store));

        let resolved = tokio::time::timeout(
            Duration::from_millis(100),
            resolver.resolve("ax_live_k"),
        )
        .await;
        assert_eq!(resolved.unwrap().unwrap(), "tn_a");
    }
}
