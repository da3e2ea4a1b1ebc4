// src/cache/store.rs
//! Named response store backed by moka, with an optional byte quota.
//!
//! Stored bytes are tracked incrementally: inserts add, the eviction listener
//! subtracts for replaced, expired and evicted entries. Puts are serialized per
//! store so the quota check and the insert cannot interleave.

use metrics::counter;
use moka::future::Cache;
use moka::policy::EvictionPolicy;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;

use super::policy::Expiration;
use super::{CacheError, CachedResponse};

/// One cache instance with its own byte counter. A purge swaps in a fresh one,
/// so late eviction notices from the old instance never touch the new counter.
struct Generation {
    cache: Cache<String, CachedResponse>,
    bytes: Arc<AtomicU64>,
}

impl Generation {
    fn new(name: &str, expiration: &Expiration) -> Self {
        let bytes = Arc::new(AtomicU64::new(0));
        let on_evict = Arc::clone(&bytes);
        // LRU: a new entry always displaces the oldest one once the store is full
        let mut builder = Cache::<String, CachedResponse>::builder()
            .name(name)
            .eviction_policy(EvictionPolicy::lru())
            .eviction_listener(move |_key, resp: CachedResponse, _cause| {
                let len = resp.body.len() as u64;
                // never fails: the update closure always returns Some
                let _ = on_evict.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |b| {
                    Some(b.saturating_sub(len))
                });
            });
        if let Some(max) = expiration.max_entries {
            builder = builder.max_capacity(max);
        }
        if let Some(age) = expiration.max_age {
            builder = builder.time_to_live(age);
        }
        Self {
            cache: builder.build(),
            bytes,
        }
    }
}

#[derive(Clone)]
pub struct CacheStore {
    name: String,
    expiration: Expiration,
    quota_bytes: Option<u64>,
    current: Arc<RwLock<Arc<Generation>>>,
    writes: Arc<Mutex<()>>,
}

impl CacheStore {
    pub fn new(name: &str, expiration: &Expiration, quota_bytes: Option<u64>) -> Self {
        Self {
            name: name.to_string(),
            expiration: expiration.clone(),
            quota_bytes,
            current: Arc::new(RwLock::new(Arc::new(Generation::new(name, expiration)))),
            writes: Arc::new(Mutex::new(())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn generation(&self) -> Arc<Generation> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    pub async fn get(&self, key: &str) -> Option<CachedResponse> {
        self.generation().cache.get(key).await
    }

    /// Sum of stored body sizes. Evictions still pending in moka are counted
    /// until its maintenance runs.
    pub fn stored_bytes(&self) -> u64 {
        self.generation().bytes.load(Ordering::SeqCst)
    }

    pub async fn entry_count(&self) -> u64 {
        let generation = self.generation();
        generation.cache.run_pending_tasks().await;
        generation.cache.entry_count()
    }

    /// Store `resp` under `key`. Fails when the quota would be exceeded; the
    /// store is then emptied if the policy asks for it.
    pub async fn put(&self, key: String, resp: CachedResponse) -> Result<(), CacheError> {
        let _write = self.writes.lock().await;
        let generation = self.generation();
        let len = resp.body.len() as u64;

        if let Some(quota) = self.quota_bytes {
            // settle pending evictions so the counter is current
            generation.cache.run_pending_tasks().await;
            let replaced = generation
                .cache
                .get(&key)
                .await
                .map(|r| r.body.len() as u64)
                .unwrap_or(0);
            let stored = generation.bytes.load(Ordering::SeqCst);
            let needed = stored.saturating_sub(replaced) + len;
            if needed > quota {
                if self.expiration.purge_on_quota_error {
                    self.purge();
                }
                return Err(CacheError::QuotaExceeded {
                    cache: self.name.clone(),
                    needed,
                    quota,
                });
            }
        }

        generation.bytes.fetch_add(len, Ordering::SeqCst);
        generation.cache.insert(key, resp).await;
        Ok(())
    }

    /// Drop every entry.
    pub fn purge(&self) {
        tracing::warn!(target: "cache", cache = %self.name, "purging cache");
        let fresh = Arc::new(Generation::new(&self.name, &self.expiration));
        let old = {
            let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
            std::mem::replace(&mut *guard, fresh)
        };
        old.cache.invalidate_all();
        counter!("cache_purges_total", "cache" => self.name.clone()).increment(1);
    }
}
