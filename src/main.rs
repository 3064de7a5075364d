//! # Cache Proxy - Main Entry Point
//!
//! Startup sequence:
//! 1. Load configuration (YAML file, then `CACHE_PROXY_*` environment overrides)
//! 2. Initialize logging and, when enabled, the Prometheus exporter
//! 3. Build the cache, upstream client, and proxy handler
//! 4. Serve until SIGTERM or SIGINT, then drain in-flight requests

use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

use cache_proxy::observability::{init_logging, install_prometheus};
use cache_proxy::{
    CacheStore, HttpUpstreamClient, ProxyConfig, ProxyHandler, ProxyResult, ProxyServer,
    ServerState,
};

#[tokio::main]
async fn main() -> ProxyResult<()> {
    let config = match ProxyConfig::load().await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config.logging)?;

    info!("🚀 Starting cache proxy");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(config).await {
        error!(error_type = e.error_type(), "Cache proxy failed: {}", e);
        std::process::exit(1);
    }

    info!("✅ Cache proxy shutdown complete");
    Ok(())
}

async fn run(config: ProxyConfig) -> ProxyResult<()> {
    if config.metrics.enabled {
        install_prometheus(&config.metrics)?;
        info!("📊 Prometheus metrics listening on {}", config.metrics.listen_address);
    }

    let cache = Arc::new(CacheStore::new(config.cache.max_entries));
    let sweeper = config
        .cache
        .sweep_interval
        .map(|every| {
            info!("🧹 Expired entries swept every {:?}", every);
            cache.spawn_sweeper(every)
        });

    let upstream = Arc::new(HttpUpstreamClient::new(
        config.upstream.target.clone(),
        config.upstream.timeout,
    )?);
    let proxy = Arc::new(
        ProxyHandler::new(cache, upstream, config.cache.default_ttl)
            .with_max_entry_size(config.cache.max_entry_size),
    );

    info!(
        target_host = %config.upstream.target,
        ttl = ?config.cache.default_ttl,
        max_entries = config.cache.max_entries,
        max_entry_size = config.cache.max_entry_size,
        "🔧 Proxy configured"
    );

    let server = ProxyServer::new(
        ServerState::new(proxy, config.server.max_body_size)
            .with_stats_path(config.server.stats_path.clone()),
        config.bind_addr()?,
    );
    let result = server.start(shutdown_signal()).await;

    if let Some(handle) = sweeper {
        handle.abort();
    }

    result
}

/// Resolves on SIGTERM or SIGINT
async fn shutdown_signal() {
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = terminate => {
            info!("📡 Received SIGTERM, initiating graceful shutdown...");
        }
        result = signal::ctrl_c() => {
            if let Err(e) = result {
                warn!("Failed to listen for SIGINT: {}", e);
            }
            info!("📡 Received SIGINT (Ctrl+C), initiating graceful shutdown...");
        }
    }
}
