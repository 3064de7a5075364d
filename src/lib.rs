//! # Cache Proxy Library
//!
//! A caching reverse proxy for a single upstream origin. Responses are cached in
//! memory, keyed by request method and URL, for a fixed TTL with a bounded number of
//! entries. Every proxied response reports `X-Cache: HIT` or `X-Cache: MISS`.
//!
//! ## Request Flow
//! ```text
//! request -> KeyGenerator -> CacheStore::get -> hit:  replay stored response
//!                                            -> miss: UpstreamClient::forward
//!                                                     -> CacheStore::set -> respond
//! ```
//!
//! ## Wiring It Together
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use cache_proxy::{CacheStore, HttpUpstreamClient, ProxyHandler, ProxyServer, ServerState};
//!
//! # async fn run() -> cache_proxy::ProxyResult<()> {
//! let cache = Arc::new(CacheStore::new(100));
//! let upstream = HttpUpstreamClient::new("http://localhost:3000", Duration::from_secs(10))?;
//! let upstream = Arc::new(upstream);
//! let proxy = Arc::new(ProxyHandler::new(cache, upstream, Duration::from_secs(300)));
//!
//! let state = ServerState::new(proxy, 16 * 1024 * 1024);
//! let server = ProxyServer::new(state, "0.0.0.0:8080".parse().unwrap());
//! server.start(async { let _ = tokio::signal::ctrl_c().await; }).await
//! # }
//! ```

/// Error types, configuration, and the request/response shapes of the core
pub mod core;

/// Response cache: fingerprints, bounded store, statistics, admin routes
pub mod caching;

/// Upstream forwarding and the cache-aware request handler
pub mod proxy;

/// axum server and routing
pub mod gateway;

/// Logging and metrics
pub mod observability;

pub use caching::{CacheEntry, CacheStats, CacheStore, DefaultKeyGenerator, KeyGenerator};
pub use core::config::ProxyConfig;
pub use core::error::{ForwardError, ProxyError, ProxyResult};
pub use core::types::{CacheStatus, ProxyRequest, ProxyResponse};
pub use gateway::server::{build_app, ProxyServer, ServerState};
pub use proxy::{HttpUpstreamClient, ProxyHandler, UpstreamClient, UpstreamResponse};
