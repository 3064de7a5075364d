//! # Metrics
//!
//! Counters and histograms emitted through the `metrics` facade. Without an installed
//! recorder every call is a no-op, so the cache and proxy record unconditionally.
//! [`install_prometheus`] wires up the Prometheus exporter and its scrape listener.

use ::metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

use crate::core::config::MetricsConfig;
use crate::core::error::{ForwardError, ProxyError, ProxyResult};
use crate::core::types::CacheStatus;

pub const CACHE_HITS_TOTAL: &str = "cache_proxy_cache_hits_total";
pub const CACHE_MISSES_TOTAL: &str = "cache_proxy_cache_misses_total";
pub const CACHE_EVICTIONS_TOTAL: &str = "cache_proxy_cache_evictions_total";
pub const CACHE_EXPIRATIONS_TOTAL: &str = "cache_proxy_cache_expirations_total";
pub const UPSTREAM_ERRORS_TOTAL: &str = "cache_proxy_upstream_errors_total";
pub const UPSTREAM_DURATION_SECONDS: &str = "cache_proxy_upstream_duration_seconds";

/// Record the outcome of a proxied lookup
pub fn record_lookup(status: CacheStatus) {
    match status {
        CacheStatus::Hit => counter!(CACHE_HITS_TOTAL).increment(1),
        CacheStatus::Miss => counter!(CACHE_MISSES_TOTAL).increment(1),
    }
}

pub fn record_eviction() {
    counter!(CACHE_EVICTIONS_TOTAL).increment(1);
}

pub fn record_expirations(count: u64) {
    if count > 0 {
        counter!(CACHE_EXPIRATIONS_TOTAL).increment(count);
    }
}

pub fn record_upstream_error(err: &ForwardError) {
    counter!(UPSTREAM_ERRORS_TOTAL, "kind" => err.error_type()).increment(1);
}

pub fn record_upstream_duration(elapsed: Duration) {
    histogram!(UPSTREAM_DURATION_SECONDS).record(elapsed.as_secs_f64());
}

fn describe_metrics() {
    describe_counter!(CACHE_HITS_TOTAL, "Requests answered from the cache");
    describe_counter!(CACHE_MISSES_TOTAL, "Requests forwarded to the upstream");
    describe_counter!(CACHE_EVICTIONS_TOTAL, "Entries evicted to respect the capacity");
    describe_counter!(CACHE_EXPIRATIONS_TOTAL, "Entries removed after their TTL elapsed");
    describe_counter!(UPSTREAM_ERRORS_TOTAL, "Failed forward attempts by kind");
    describe_histogram!(UPSTREAM_DURATION_SECONDS, "Upstream round-trip time in seconds");
}

/// Install the Prometheus recorder and its HTTP scrape listener.
///
/// Must be called from inside a Tokio runtime.
pub fn install_prometheus(config: &MetricsConfig) -> ProxyResult<()> {
    let addr: SocketAddr = config.listen_address.parse().map_err(|e| {
        ProxyError::observability(format!(
            "Invalid metrics listen address {}: {}",
            config.listen_address, e
        ))
    })?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| {
            ProxyError::observability(format!("Failed to install Prometheus exporter: {}", e))
        })?;

    describe_metrics();
    Ok(())
}
