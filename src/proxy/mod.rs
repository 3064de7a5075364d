//! # Proxy Module
//!
//! Forwarding to the upstream origin and the cache-aware request handler.

pub mod handler;
pub mod upstream;

pub use handler::ProxyHandler;
pub use upstream::{HttpUpstreamClient, UpstreamClient, UpstreamResponse};
