// src/cache/fetcher.rs
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::sync::Arc;
use std::time::Duration;

use super::{CacheError, CacheRequest, CachedResponse};

/// Network side of the cache controller. Any HTTP status is a response; only
/// transport failures are errors.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, req: &CacheRequest) -> Result<CachedResponse, CacheError>;
}

#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, req: &CacheRequest) -> Result<CachedResponse, CacheError> {
        let resp = self
            .client
            .get(req.url.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| CacheError::Network(e.to_string()))?;
        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp
            .bytes()
            .await
            .map_err(|e| CacheError::Network(e.to_string()))?;
        Ok(CachedResponse {
            status,
            content_type,
            body: Arc::new(body.to_vec()),
        })
    }
}
