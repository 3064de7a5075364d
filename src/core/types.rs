//! # Core Types Module
//!
//! The request and response shapes the proxy core works with. The transport layer
//! (axum) converts into [`ProxyRequest`] on the way in and out of [`ProxyResponse`]
//! on the way back, so the caching and forwarding logic never touches the listener.
//!
//! Headers use [`HeaderMap`], which gives case-insensitive names and keeps every
//! value of a repeated header in the order it was received.

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use std::fmt;
use std::time::Instant;
use uuid::Uuid;

use crate::core::error::{error_body, ForwardError};

/// Header carrying the cache outcome on every proxied response
pub const CACHE_STATUS_HEADER: &str = "x-cache";

/// Outcome of the cache lookup for a proxied request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Served from the cache without contacting the upstream
    Hit,
    /// Not in the cache (or expired); the upstream was consulted
    Miss,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }

    pub fn header_value(&self) -> HeaderValue {
        HeaderValue::from_static(self.as_str())
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An inbound request as seen by the proxy core
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    /// Unique identifier for this request (for log correlation only)
    pub id: String,

    /// HTTP method
    pub method: Method,

    /// Request target: path plus optional query string
    pub uri: Uri,

    /// Client-supplied headers
    pub headers: HeaderMap,

    /// Fully buffered request body
    pub body: Bytes,

    /// When the request was received
    pub received_at: Instant,
}

impl ProxyRequest {
    /// Create a new request with a generated ID
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            method,
            uri,
            headers,
            body,
            received_at: Instant::now(),
        }
    }

    /// Get the request path without query parameters
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Get the raw query string, if any
    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    /// Path and query exactly as received, e.g. `/items?page=2`
    pub fn path_and_query(&self) -> &str {
        self.uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| self.uri.path())
    }
}

/// A response produced by the proxy core
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ProxyResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Create a JSON error response
    pub fn error(status: StatusCode, message: &str, error_type: &str) -> Self {
        let body = error_body(status, message, error_type);
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Self::new(status, headers, Bytes::from(body.to_string()))
    }

    /// Error response for a failed forward attempt
    pub fn from_forward_error(err: &ForwardError) -> Self {
        Self::error(err.status_code(), &err.to_string(), err.error_type())
    }

    /// Set the cache outcome header, replacing any value copied from upstream
    pub fn with_cache_status(mut self, status: CacheStatus) -> Self {
        self.headers
            .insert(HeaderName::from_static(CACHE_STATUS_HEADER), status.header_value());
        self
    }

    /// Cache outcome recorded on this response, if any
    pub fn cache_status(&self) -> Option<&str> {
        self.headers
            .get(CACHE_STATUS_HEADER)
            .and_then(|value| value.to_str().ok())
    }
}

impl IntoResponse for ProxyResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_and_query() {
        let request = ProxyRequest::new(
            Method::GET,
            "/items?page=2&sort=asc".parse().unwrap(),
            HeaderMap::new(),
            Bytes::new(),
        );
        assert_eq!(request.path(), "/items");
        assert_eq!(request.query(), Some("page=2&sort=asc"));
        assert_eq!(request.path_and_query(), "/items?page=2&sort=asc");
    }

    #[test]
    fn test_request_ids_are_unique() {
        let root =
            || ProxyRequest::new(Method::GET, "/".parse().unwrap(), HeaderMap::new(), Bytes::new());
        let (a, b) = (root(), root());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_cache_status_overrides_upstream_value() {
        let mut headers = HeaderMap::new();
        headers.insert("x-cache", HeaderValue::from_static("HIT from upstream-cdn"));
        let response = ProxyResponse::new(StatusCode::OK, headers, Bytes::from_static(b"ok"))
            .with_cache_status(CacheStatus::Miss);

        assert_eq!(response.cache_status(), Some("MISS"));
        assert_eq!(response.headers.get_all("x-cache").iter().count(), 1);
    }

    #[test]
    fn test_forward_error_response() {
        let err = ForwardError::dispatch("http://upstream", "connection refused");
        let response = ProxyResponse::from_forward_error(&err);
        assert_eq!(response.status, StatusCode::BAD_GATEWAY);

        let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(body["error"]["type"], "upstream_dispatch_error");
    }
}
