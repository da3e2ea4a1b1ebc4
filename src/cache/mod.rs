// src/cache/mod.rs
//! Offline cache controller.
//!
//! Requests are checked against route policies in registration order; the first
//! match decides the cache and strategy. Unmatched requests go straight to the
//! network.

pub mod fetcher;
pub mod policy;
pub mod store;

use metrics::counter;
use reqwest::Url;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub use fetcher::{Fetcher, HttpFetcher};
pub use policy::{default_policies, Expiration, Matcher, RoutePolicy, Strategy, TILE_HOSTS};
pub use store::CacheStore;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("network error: {0}")]
    Network(String),

    #[error("cache '{cache}' quota exceeded ({needed} > {quota} bytes)")]
    QuotaExceeded { cache: String, needed: u64, quota: u64 },
}

/// `Sec-Fetch-Mode` of the original request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    Navigate,
    SameOrigin,
    NoCors,
    Cors,
}

impl RequestMode {
    /// Unknown or missing values are treated as `no-cors`.
    pub fn from_sec_fetch_mode(v: Option<&str>) -> Self {
        match v.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("navigate") => RequestMode::Navigate,
            Some("same-origin") => RequestMode::SameOrigin,
            Some("cors") => RequestMode::Cors,
            _ => RequestMode::NoCors,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheRequest {
    pub url: Url,
    pub mode: RequestMode,
}

impl CacheRequest {
    pub fn new(url: Url, mode: RequestMode) -> Self {
        Self { url, mode }
    }

    fn key(&self) -> String {
        self.url.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    /// 0 for opaque responses.
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Arc<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
    Cache,
    Network,
}

#[derive(Debug, Clone)]
pub struct CacheOutcome {
    pub response: CachedResponse,
    pub source: CacheSource,
    /// Cache name of the matched policy, `None` for pass-through.
    pub policy: Option<String>,
}

struct Route {
    policy: RoutePolicy,
    store: CacheStore,
}

pub struct CacheController {
    routes: Vec<Route>,
    stores: HashMap<String, CacheStore>,
    fetcher: Arc<dyn Fetcher>,
    quota_bytes: Option<u64>,
}

impl CacheController {
    pub fn new(fetcher: Arc<dyn Fetcher>, quota_bytes: Option<u64>) -> Self {
        Self {
            routes: Vec::new(),
            stores: HashMap::new(),
            fetcher,
            quota_bytes,
        }
    }

    /// Controller with the static, tiles and navigation policies.
    pub fn with_default_policies(
        site_origin: &Url,
        fetcher: Arc<dyn Fetcher>,
        quota_bytes: Option<u64>,
    ) -> Self {
        let mut controller = Self::new(fetcher, quota_bytes);
        for p in default_policies(site_origin) {
            controller.register(p);
        }
        controller
    }

    /// Append a policy. Policies sharing a cache name share the store.
    pub fn register(&mut self, policy: RoutePolicy) {
        let quota = self.quota_bytes;
        let store = self
            .stores
            .entry(policy.cache_name.clone())
            .or_insert_with(|| CacheStore::new(&policy.cache_name, &policy.expiration, quota))
            .clone();
        self.routes.push(Route { policy, store });
    }

    pub fn policies(&self) -> impl Iterator<Item = &RoutePolicy> {
        self.routes.iter().map(|r| &r.policy)
    }

    pub fn store(&self, cache_name: &str) -> Option<&CacheStore> {
        self.stores.get(cache_name)
    }

    fn route_for(&self, req: &CacheRequest) -> Option<&Route> {
        self.routes.iter().find(|r| r.policy.matcher.matches(req))
    }

    pub fn matching_policy(&self, req: &CacheRequest) -> Option<&RoutePolicy> {
        self.route_for(req).map(|r| &r.policy)
    }

    pub async fn handle(&self, req: &CacheRequest) -> Result<CacheOutcome, CacheError> {
        let Some(Route { policy, store }) = self.route_for(req) else {
            let response = self.fetcher.fetch(req).await?;
            return Ok(CacheOutcome {
                response,
                source: CacheSource::Network,
                policy: None,
            });
        };

        let (response, source) = match policy.strategy {
            Strategy::StaleWhileRevalidate => {
                self.stale_while_revalidate(policy, store, req).await?
            }
            Strategy::CacheFirst => self.cache_first(policy, store, req).await?,
            Strategy::NetworkFirst => self.network_first(policy, store, req).await?,
        };

        let name = policy.cache_name.clone();
        match source {
            CacheSource::Cache => {
                counter!("cache_hits_total", "cache" => name.clone()).increment(1)
            }
            CacheSource::Network => {
                counter!("cache_misses_total", "cache" => name.clone()).increment(1)
            }
        }
        Ok(CacheOutcome {
            response,
            source,
            policy: Some(name),
        })
    }

    async fn cache_first(
        &self,
        policy: &RoutePolicy,
        store: &CacheStore,
        req: &CacheRequest,
    ) -> Result<(CachedResponse, CacheSource), CacheError> {
        if let Some(hit) = store.get(&req.key()).await {
            return Ok((hit, CacheSource::Cache));
        }
        let fresh = self.fetcher.fetch(req).await?;
        store_if_cacheable(policy, store, req.key(), &fresh).await;
        Ok((fresh, CacheSource::Network))
    }

    async fn network_first(
        &self,
        policy: &RoutePolicy,
        store: &CacheStore,
        req: &CacheRequest,
    ) -> Result<(CachedResponse, CacheSource), CacheError> {
        match self.fetcher.fetch(req).await {
            Ok(fresh) => {
                store_if_cacheable(policy, store, req.key(), &fresh).await;
                Ok((fresh, CacheSource::Network))
            }
            Err(e) => match store.get(&req.key()).await {
                Some(hit) => {
                    tracing::debug!(
                        target: "cache",
                        url = %req.url,
                        error = %e,
                        "network failed, serving cached"
                    );
                    Ok((hit, CacheSource::Cache))
                }
                None => Err(e),
            },
        }
    }

    async fn stale_while_revalidate(
        &self,
        policy: &RoutePolicy,
        store: &CacheStore,
        req: &CacheRequest,
    ) -> Result<(CachedResponse, CacheSource), CacheError> {
        let Some(hit) = store.get(&req.key()).await else {
            let fresh = self.fetcher.fetch(req).await?;
            store_if_cacheable(policy, store, req.key(), &fresh).await;
            return Ok((fresh, CacheSource::Network));
        };

        let fetcher = Arc::clone(&self.fetcher);
        let policy = policy.clone();
        let store = store.clone();
        let req = req.clone();
        tokio::spawn(async move {
            match fetcher.fetch(&req).await {
                Ok(fresh) => store_if_cacheable(&policy, &store, req.key(), &fresh).await,
                Err(e) => {
                    tracing::warn!(
                        target: "cache",
                        url = %req.url,
                        error = %e,
                        "background revalidation failed"
                    )
                }
            }
        });
        Ok((hit, CacheSource::Cache))
    }
}

/// Write-through that never fails the request: quota errors are logged.
async fn store_if_cacheable(
    policy: &RoutePolicy,
    store: &CacheStore,
    key: String,
    resp: &CachedResponse,
) {
    if !policy.is_cacheable(resp.status) {
        return;
    }
    if let Err(e) = store.put(key, resp.clone()).await {
        tracing::warn!(target: "cache", cache = store.name(), error = %e, "cache write failed");
    }
}
