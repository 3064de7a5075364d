//! # Caching System Module
//!
//! The response cache behind the proxy.
//!
//! ## Features
//! - Deterministic request fingerprints (method + path + query)
//! - Bounded in-memory store with insertion-order eviction
//! - Per-entry TTL with lazy expiry and an optional background sweep
//! - Hit/miss/eviction statistics
//! - Admin routes for clearing the cache and reading statistics
//!
//! ## Usage Example
//! ```rust,no_run
//! use std::time::Duration;
//! use axum::http::{HeaderMap, Method, StatusCode};
//! use bytes::Bytes;
//! use cache_proxy::caching::{fingerprint, CacheEntry, CacheStore};
//!
//! let store = CacheStore::new(100);
//! let key = fingerprint(&Method::GET, "/api/users?page=1");
//! store.set(
//!     key.clone(),
//!     CacheEntry::new(
//!         StatusCode::OK,
//!         HeaderMap::new(),
//!         Bytes::from_static(b"[]"),
//!         Duration::from_secs(300),
//!     ),
//! );
//!
//! if let Some(entry) = store.get(&key) {
//!     assert_eq!(entry.body().as_ref(), b"[]");
//! }
//! ```

pub mod admin;
pub mod key_generator;
pub mod stats;
pub mod store;

pub use admin::{get_cache_stats, CacheAdminRouter, CLEAR_CACHE_PATH};
pub use key_generator::{fingerprint, DefaultKeyGenerator, KeyGenerator};
pub use stats::CacheStats;
pub use store::{CacheEntry, CacheStore};
