//! # Cache Key Generator
//!
//! Derives the cache key ("fingerprint") of a request. A request's identity is its
//! method plus its full URL (path and query string); headers and body are not part
//! of it. The key is a SHA-256 digest so keys have a fixed length regardless of URL
//! size. It is used for identity only, never for anything security-sensitive.

use crate::core::types::ProxyRequest;
use axum::http::Method;
use sha2::{Digest, Sha256};

/// Cache key generator trait
pub trait KeyGenerator: Send + Sync {
    /// Fingerprint a method and a path-and-query string
    fn fingerprint(&self, method: &Method, url: &str) -> String;

    /// Generate the cache key for a request
    fn generate_key(&self, request: &ProxyRequest) -> String {
        self.fingerprint(&request.method, request.path_and_query())
    }
}

/// SHA-256 over `METHOD SP path?query`, hex encoded
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultKeyGenerator;

impl DefaultKeyGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl KeyGenerator for DefaultKeyGenerator {
    fn fingerprint(&self, method: &Method, url: &str) -> String {
        fingerprint(method, url)
    }
}

/// Fingerprint a method and URL with the default strategy
pub fn fingerprint(method: &Method, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_str());
    // separator keeps ("GE", "T/x") apart from ("GET", "/x")
    hasher.update(b" ");
    hasher.update(url);
    format!("{:x}", hasher.finalize())
}
