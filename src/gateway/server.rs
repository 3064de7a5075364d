//! # HTTP Server Module
//!
//! The axum front end of the proxy. Control routes are matched first; every other
//! method and path falls through to the cache-aware proxy handler.
//!
//! ## Routes
//! - `/clear-cache` (any method): empty the cache, 200 `Cache cleared`
//! - `GET <stats_path>` (only when configured): cache statistics as JSON; other
//!   methods on that path are still proxied
//! - anything else: proxied to the upstream, tagged `X-Cache: HIT|MISS`

use crate::caching::{get_cache_stats, CacheAdminRouter, CacheStore, CLEAR_CACHE_PATH};
use crate::core::error::{ProxyError, ProxyResult};
use crate::core::types::{CacheStatus, ProxyRequest, ProxyResponse};
use crate::proxy::ProxyHandler;
use axum::{
    extract::{FromRef, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared state handed to every route
#[derive(Clone)]
pub struct ServerState {
    pub proxy: Arc<ProxyHandler>,
    pub max_body_size: usize,
    pub stats_path: Option<String>,
}

impl ServerState {
    pub fn new(proxy: Arc<ProxyHandler>, max_body_size: usize) -> Self {
        Self {
            proxy,
            max_body_size,
            stats_path: None,
        }
    }

    /// Serve cache statistics on `path`
    pub fn with_stats_path(mut self, path: Option<String>) -> Self {
        self.stats_path = path;
        self
    }
}

impl FromRef<ServerState> for Arc<CacheStore> {
    fn from_ref(state: &ServerState) -> Self {
        state.proxy.cache().clone()
    }
}

/// Build the application router
pub fn build_app(state: ServerState) -> Router {
    let mut app = Router::new().merge(CacheAdminRouter::routes::<ServerState>());

    match state.stats_path.as_deref() {
        Some(path) if path.starts_with('/') && path != CLEAR_CACHE_PATH => {
            // methods other than GET/HEAD on the stats path still go upstream
            app = app.route(path, get(get_cache_stats).fallback(handle_proxy));
        }
        Some(path) => warn!("Ignoring unusable stats path: {}", path),
        None => {}
    }

    app.fallback(handle_proxy)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// Catch-all handler: buffer the request and hand it to the proxy core
async fn handle_proxy(State(state): State<ServerState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    let body = match axum::body::to_bytes(body, state.max_body_size).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(
                method = %parts.method,
                uri = %parts.uri,
                max_size = state.max_body_size,
                "Failed to read request body: {}",
                e
            );
            return ProxyResponse::error(
                StatusCode::PAYLOAD_TOO_LARGE,
                &format!(
                    "Request body could not be read within the {} byte limit",
                    state.max_body_size
                ),
                "payload_too_large",
            )
            .with_cache_status(CacheStatus::Miss)
            .into_response();
        }
    };

    let request = ProxyRequest::new(parts.method, parts.uri, parts.headers, body);
    state.proxy.handle(request).await.into_response()
}

/// Proxy HTTP server
pub struct ProxyServer {
    app: Router,
    bind_addr: SocketAddr,
}

impl ProxyServer {
    pub fn new(state: ServerState, bind_addr: SocketAddr) -> Self {
        Self {
            app: build_app(state),
            bind_addr,
        }
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests
    pub async fn start<F>(self, shutdown: F) -> ProxyResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.bind_addr;
        let listener = TcpListener::bind(bind_addr).await.map_err(|e| {
            ProxyError::server(format!("Failed to bind proxy server to {}: {}", bind_addr, e))
        })?;

        info!("Proxy HTTP server listening on {}", self.bind_addr);

        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ProxyError::server(format!("Proxy server error: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ForwardError;
    use crate::proxy::{UpstreamClient, UpstreamResponse};
    use async_trait::async_trait;
    use axum::http::HeaderMap;
    use axum_test::TestServer;
    use bytes::Bytes;
    use std::time::Duration;

    struct EchoUpstream;

    #[async_trait]
    impl UpstreamClient for EchoUpstream {
        async fn forward(&self, request: &ProxyRequest) -> Result<UpstreamResponse, ForwardError> {
            Ok(UpstreamResponse {
                status: StatusCode::OK,
                headers: HeaderMap::new(),
                body: Bytes::from(format!("{} {}", request.method, request.path_and_query())),
            })
        }

        fn target(&self) -> &str {
            "http://echo"
        }
    }

    fn server_with(max_body_size: usize, stats_path: Option<&str>) -> TestServer {
        let proxy = ProxyHandler::new(
            Arc::new(CacheStore::new(10)),
            Arc::new(EchoUpstream),
            Duration::from_secs(60),
        );
        let state = ServerState::new(Arc::new(proxy), max_body_size)
            .with_stats_path(stats_path.map(str::to_string));
        TestServer::new(build_app(state)).unwrap()
    }

    fn server(max_body_size: usize) -> TestServer {
        server_with(max_body_size, None)
    }

    #[tokio::test]
    async fn test_catch_all_route_proxies() {
        let server = server(1024);
        let response = server.get("/deep/nested/path").add_query_param("q", "1").await;
        response.assert_status_ok();
        assert_eq!(response.text(), "GET /deep/nested/path?q=1");
        assert_eq!(response.header("x-cache"), "MISS");
    }

    #[tokio::test]
    async fn test_clear_cache_route_accepts_any_method() {
        let server = server(1024);
        server.get("/cached").await;
        assert_eq!(server.get("/cached").await.header("x-cache"), "HIT");

        let cleared = server.post("/clear-cache").await;
        cleared.assert_status_ok();
        assert_eq!(cleared.text(), "Cache cleared");

        assert_eq!(server.get("/cached").await.header("x-cache"), "MISS");
        server.get("/clear-cache").await.assert_status_ok();
    }

    #[tokio::test]
    async fn test_cache_stats_route_when_configured() {
        let server = server_with(1024, Some("/_proxy/stats"));
        server.get("/a").await;
        server.get("/a").await;

        let stats: serde_json::Value = server.get("/_proxy/stats").await.json();
        assert_eq!(stats["stats"]["entries"], 1);
        assert_eq!(stats["stats"]["hits"], 1);
        assert_eq!(stats["stats"]["misses"], 1);
    }

    #[tokio::test]
    async fn test_stats_path_is_proxied_by_default() {
        let server = server(1024);
        let response = server.get("/cache-stats").await;
        response.assert_status_ok();
        assert_eq!(response.text(), "GET /cache-stats");
        assert_eq!(response.header("x-cache"), "MISS");
    }

    #[tokio::test]
    async fn test_other_methods_on_stats_path_reach_upstream() {
        let server = server_with(1024, Some("/cache-stats"));
        let response = server.post("/cache-stats").await;
        response.assert_status_ok();
        assert_eq!(response.text(), "POST /cache-stats");
        assert_eq!(response.header("x-cache"), "MISS");
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let server = server(8);
        let response = server
            .post("/upload")
            .bytes(Bytes::from_static(b"far more than eight bytes"))
            .await;
        response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(response.header("x-cache"), "MISS");
    }
}
