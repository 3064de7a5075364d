//! # Upstream Client
//!
//! Forwards a request to the single configured upstream origin and buffers the
//! complete response. The method, path, query, headers and body of the inbound
//! request are carried over. Hop-by-hop headers are dropped in both directions.
//! Upstream redirects are returned to the client as-is rather than followed.
//! Paths with `.`/`..` segments (plain or percent-encoded) are refused so a
//! request can never climb above the target's base path.

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use bytes::Bytes;
use std::time::Duration;
use tracing::debug;

use crate::core::error::{ForwardError, ProxyError, ProxyResult};
use crate::core::types::ProxyRequest;

/// Connection-scoped headers that never cross the proxy
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Inbound headers recomputed by the HTTP client for the upstream hop
const CLIENT_MANAGED_HEADERS: &[&str] = &["host", "content-length"];

/// A fully buffered upstream response
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Something that can answer a request on behalf of the origin
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Forward the request and return the origin's complete response
    async fn forward(&self, request: &ProxyRequest) -> Result<UpstreamResponse, ForwardError>;

    /// Base URL of the origin
    fn target(&self) -> &str;
}

/// reqwest-backed upstream client
#[derive(Debug, Clone)]
pub struct HttpUpstreamClient {
    client: reqwest::Client,
    target: String,
}

impl HttpUpstreamClient {
    /// Create a client for `target` with a per-request timeout
    pub fn new(target: impl Into<String>, timeout: Duration) -> ProxyResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ProxyError::server(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            target: target.into().trim_end_matches('/').to_string(),
        })
    }

    /// Absolute upstream URL for a request: target base plus the raw path and query
    pub fn target_url(&self, request: &ProxyRequest) -> String {
        format!("{}{}", self.target, request.path_and_query())
    }

    fn build_request(&self, request: &ProxyRequest) -> Result<reqwest::Request, ForwardError> {
        let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|e| ForwardError::construction(format!("Invalid method: {}", e)))?;

        let path = request.uri.path();
        if has_dot_segment(path) {
            return Err(ForwardError::construction(format!(
                "Refusing path with dot segments: {}",
                path
            )));
        }

        let url = reqwest::Url::parse(&self.target_url(request))
            .map_err(|e| ForwardError::construction(format!("Invalid upstream URL: {}", e)))?;

        let headers = outbound_headers(&request.headers)?;

        self.client
            .request(method, url)
            .headers(headers)
            .body(request.body.clone())
            .build()
            .map_err(|e| ForwardError::construction(e.to_string()))
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstreamClient {
    async fn forward(&self, request: &ProxyRequest) -> Result<UpstreamResponse, ForwardError> {
        let outbound = self.build_request(request)?;
        debug!(
            request_id = %request.id,
            method = %request.method,
            url = %outbound.url(),
            "Forwarding request upstream"
        );

        let response = self
            .client
            .execute(outbound)
            .await
            .map_err(|e| ForwardError::dispatch(&self.target, e.to_string()))?;

        let status = StatusCode::from_u16(response.status().as_u16())
            .map_err(|e| ForwardError::read(format!("Invalid upstream status: {}", e)))?;
        let headers = inbound_headers(response.headers());

        let body = response
            .bytes()
            .await
            .map_err(|e| ForwardError::read(format!("Failed to read upstream body: {}", e)))?;

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }

    fn target(&self) -> &str {
        &self.target
    }
}

/// True if any segment is `.` or `..`, also as `%2e`, or the path holds a backslash
fn has_dot_segment(path: &str) -> bool {
    if path.contains('\\') {
        return true;
    }
    path.split('/').any(|segment| {
        let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
        decoded == "." || decoded == ".."
    })
}

/// Header names listed in `Connection`, lowercased
fn connection_tokens<'a, I>(values: I) -> Vec<String>
where
    I: Iterator<Item = &'a [u8]>,
{
    values
        .filter_map(|value| std::str::from_utf8(value).ok())
        .flat_map(|value| value.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect()
}

fn is_hop_by_hop(name: &str, connection: &[String]) -> bool {
    HOP_BY_HOP_HEADERS.contains(&name) || connection.iter().any(|token| token == name)
}

/// Client headers as sent to the upstream
fn outbound_headers(headers: &HeaderMap) -> Result<reqwest::header::HeaderMap, ForwardError> {
    let connection = connection_tokens(
        headers
            .get_all(axum::http::header::CONNECTION)
            .iter()
            .map(|value| value.as_bytes()),
    );

    let mut outbound = reqwest::header::HeaderMap::with_capacity(headers.len());
    for (name, value) in headers.iter() {
        let key = name.as_str();
        if is_hop_by_hop(key, &connection) || CLIENT_MANAGED_HEADERS.contains(&key) {
            continue;
        }

        let name = reqwest::header::HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
            ForwardError::construction(format!("Invalid header name {}: {}", key, e))
        })?;
        let value = reqwest::header::HeaderValue::from_bytes(value.as_bytes()).map_err(|e| {
            ForwardError::construction(format!("Invalid value for header {}: {}", key, e))
        })?;
        // append keeps every value of a repeated header
        outbound.append(name, value);
    }

    Ok(outbound)
}

/// Upstream headers as returned to the client
fn inbound_headers(headers: &reqwest::header::HeaderMap) -> HeaderMap {
    let connection = connection_tokens(
        headers
            .get_all(reqwest::header::CONNECTION)
            .iter()
            .map(|value| value.as_bytes()),
    );

    let mut inbound = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers.iter() {
        let key = name.as_str();
        if is_hop_by_hop(key, &connection) {
            continue;
        }

        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_bytes(value.as_bytes()),
        ) {
            inbound.append(name, value);
        }
    }

    inbound
}
