//! # Proxy Handler
//!
//! Per-request orchestration: fingerprint the request, consult the cache, and on a
//! miss forward upstream and store what came back.
//!
//! ```text
//! received -> key computed -> hit  -> served from cache
//!                          -> miss -> forwarding -> ok    -> stored -> served from upstream
//!                                                -> error -> served error
//! ```
//!
//! The cache lock is never held across the upstream call. Two concurrent misses for
//! the same key may both forward and both store; the last write wins. Responses whose
//! body exceeds the entry size limit are relayed without being stored.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::caching::{CacheEntry, CacheStore, DefaultKeyGenerator, KeyGenerator};
use crate::core::types::{CacheStatus, ProxyRequest, ProxyResponse};
use crate::observability::metrics;
use crate::proxy::upstream::UpstreamClient;

/// Caching reverse proxy for a single upstream
pub struct ProxyHandler {
    cache: Arc<CacheStore>,
    upstream: Arc<dyn UpstreamClient>,
    key_generator: Arc<dyn KeyGenerator>,
    default_ttl: Duration,
    max_entry_size: usize,
}

impl ProxyHandler {
    /// Create a handler using the default key generator
    pub fn new(
        cache: Arc<CacheStore>,
        upstream: Arc<dyn UpstreamClient>,
        default_ttl: Duration,
    ) -> Self {
        Self {
            cache,
            upstream,
            key_generator: Arc::new(DefaultKeyGenerator::new()),
            default_ttl,
            max_entry_size: usize::MAX,
        }
    }

    /// Only store responses whose body is at most `bytes` long
    pub fn with_max_entry_size(mut self, bytes: usize) -> Self {
        self.max_entry_size = bytes;
        self
    }

    /// Replace the key generator
    pub fn with_key_generator(mut self, key_generator: Arc<dyn KeyGenerator>) -> Self {
        self.key_generator = key_generator;
        self
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    /// Serve one request, from the cache when possible
    pub async fn handle(&self, request: ProxyRequest) -> ProxyResponse {
        let key = self.key_generator.generate_key(&request);

        if let Some(entry) = self.cache.get(&key) {
            metrics::record_lookup(CacheStatus::Hit);
            info!(
                request_id = %request.id,
                method = %request.method,
                uri = %request.uri,
                age_ms = entry.age().as_millis() as u64,
                "Cache hit"
            );
            let headers = entry.headers().clone();
            return ProxyResponse::new(entry.status(), headers, entry.body().clone())
                .with_cache_status(CacheStatus::Hit);
        }

        metrics::record_lookup(CacheStatus::Miss);
        debug!(
            request_id = %request.id,
            method = %request.method,
            uri = %request.uri,
            "Cache miss, forwarding to {}",
            self.upstream.target()
        );

        let started = std::time::Instant::now();
        let forwarded = self.upstream.forward(&request).await;
        metrics::record_upstream_duration(started.elapsed());

        let upstream = match forwarded {
            Ok(upstream) => upstream,
            Err(err) => {
                metrics::record_upstream_error(&err);
                warn!(
                    request_id = %request.id,
                    method = %request.method,
                    uri = %request.uri,
                    error = %err,
                    "Upstream forward failed"
                );
                return ProxyResponse::from_forward_error(&err)
                    .with_cache_status(CacheStatus::Miss);
            }
        };

        if upstream.body.len() <= self.max_entry_size {
            self.cache.set(
                key,
                CacheEntry::new(
                    upstream.status,
                    upstream.headers.clone(),
                    upstream.body.clone(),
                    self.default_ttl,
                ),
            );
        } else {
            debug!(
                request_id = %request.id,
                body_size = upstream.body.len(),
                max_entry_size = self.max_entry_size,
                "Response too large to cache"
            );
        }

        info!(
            request_id = %request.id,
            method = %request.method,
            uri = %request.uri,
            status = upstream.status.as_u16(),
            elapsed_ms = request.received_at.elapsed().as_millis() as u64,
            "Served from upstream"
        );

        ProxyResponse::new(upstream.status, upstream.headers, upstream.body)
            .with_cache_status(CacheStatus::Miss)
    }
}
