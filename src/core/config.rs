//! # Configuration Module
//!
//! Configuration for the cache proxy: where to listen, which upstream to forward
//! to, how long responses stay cached and how many of them are kept.
//!
//! ## Loading order
//! 1. YAML file (path from `CACHE_PROXY_CONFIG`, default `config/cache-proxy.yaml`);
//!    a missing file means "start from defaults"
//! 2. Environment variable overrides (`CACHE_PROXY_*`)
//! 3. Validation, which reports every problem at once
//!
//! Durations are written in human-readable form (`5m`, `10s`, `250ms`).

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::caching::CLEAR_CACHE_PATH;
use crate::core::error::{ProxyError, ProxyResult};

/// Environment variable naming the configuration file
pub const CONFIG_PATH_ENV: &str = "CACHE_PROXY_CONFIG";

/// Configuration file used when `CACHE_PROXY_CONFIG` is not set
pub const DEFAULT_CONFIG_PATH: &str = "config/cache-proxy.yaml";

/// Main proxy configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration
    pub server: ServerConfig,

    /// Upstream target configuration
    pub upstream: UpstreamConfig,

    /// Response cache configuration
    pub cache: CacheConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Prometheus metrics configuration
    pub metrics: MetricsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind the listener to
    pub bind_address: String,

    /// Port to listen on
    pub port: u16,

    /// Maximum inbound request body size in bytes
    pub max_body_size: usize,

    /// Path serving cache statistics as JSON. Off unless set, because a mounted
    /// path is answered locally for `GET` and never reaches the upstream.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats_path: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            max_body_size: 16 * 1024 * 1024, // 16MB
            stats_path: None,
        }
    }
}

/// Upstream configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL requests are forwarded to, e.g. `http://backend:9000`
    pub target: String,

    /// Upper bound on a single forward attempt, body read included
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            target: String::new(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL given to every entry stored after a successful forward
    #[serde(with = "humantime_serde")]
    pub default_ttl: Duration,

    /// Maximum number of cached responses
    pub max_entries: usize,

    /// Largest response body, in bytes, that is stored; bigger ones are relayed uncached
    pub max_entry_size: usize,

    /// Interval of the background expired-entry sweep (disabled when absent)
    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub sweep_interval: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(300), // 5 minutes
            max_entries: 100,
            max_entry_size: 8 * 1024 * 1024, // 8MB
            sweep_interval: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level used when `RUST_LOG` is not set
    pub level: String,

    /// Log format (json, text)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Install the Prometheus exporter
    pub enabled: bool,

    /// Address the scrape endpoint listens on
    pub listen_address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_address: "0.0.0.0:9090".to_string(),
        }
    }
}

impl ProxyConfig {
    /// Load configuration from the path named by `CACHE_PROXY_CONFIG`, then apply
    /// environment overrides and validate.
    pub async fn load() -> ProxyResult<Self> {
        let (path, explicit) = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => (path, true),
            Err(_) => (DEFAULT_CONFIG_PATH.to_string(), false),
        };

        let mut config = if Path::new(&path).exists() {
            Self::from_yaml_file(&path).await?
        } else if explicit {
            return Err(ProxyError::config(format!("Config file not found: {}", path)));
        } else {
            Self::default()
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML file without overrides or validation
    pub async fn from_yaml_file<P: AsRef<Path>>(path: P) -> ProxyResult<Self> {
        let content = tokio::fs::read_to_string(path.as_ref())
            .await
            .map_err(|e| ProxyError::config(format!("Failed to read config file: {}", e)))?;

        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> ProxyResult<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| ProxyError::config(format!("Failed to parse config: {}", e)))
    }

    /// Apply environment variable overrides to configuration
    ///
    /// Recognised variables: `CACHE_PROXY_PORT`, `CACHE_PROXY_BIND_ADDRESS`,
    /// `CACHE_PROXY_TARGET`, `CACHE_PROXY_TTL`, `CACHE_PROXY_CACHE_SIZE`,
    /// `CACHE_PROXY_MAX_ENTRY_SIZE`, `CACHE_PROXY_STATS_PATH`,
    /// `CACHE_PROXY_UPSTREAM_TIMEOUT`, `CACHE_PROXY_LOG_LEVEL`,
    /// `CACHE_PROXY_LOG_FORMAT`, `CACHE_PROXY_METRICS_ENABLED`.
    pub fn apply_env_overrides(&mut self) -> ProxyResult<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable source
    pub fn apply_overrides<F>(&mut self, lookup: F) -> ProxyResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("CACHE_PROXY_PORT") {
            self.server.port = port
                .parse()
                .map_err(|e| ProxyError::config(format!("Invalid CACHE_PROXY_PORT: {}", e)))?;
        }

        if let Some(addr) = lookup("CACHE_PROXY_BIND_ADDRESS") {
            self.server.bind_address = addr;
        }

        if let Some(target) = lookup("CACHE_PROXY_TARGET") {
            self.upstream.target = target;
        }

        if let Some(ttl) = lookup("CACHE_PROXY_TTL") {
            self.cache.default_ttl = humantime::parse_duration(&ttl)
                .map_err(|e| ProxyError::config(format!("Invalid CACHE_PROXY_TTL: {}", e)))?;
        }

        if let Some(size) = lookup("CACHE_PROXY_CACHE_SIZE") {
            self.cache.max_entries = size
                .parse()
                .map_err(|e| ProxyError::config(format!("Invalid CACHE_PROXY_CACHE_SIZE: {}", e)))?;
        }

        if let Some(size) = lookup("CACHE_PROXY_MAX_ENTRY_SIZE") {
            self.cache.max_entry_size = size.parse().map_err(|e| {
                ProxyError::config(format!("Invalid CACHE_PROXY_MAX_ENTRY_SIZE: {}", e))
            })?;
        }

        if let Some(path) = lookup("CACHE_PROXY_STATS_PATH") {
            self.server.stats_path = Some(path);
        }

        if let Some(timeout) = lookup("CACHE_PROXY_UPSTREAM_TIMEOUT") {
            self.upstream.timeout = humantime::parse_duration(&timeout).map_err(|e| {
                ProxyError::config(format!("Invalid CACHE_PROXY_UPSTREAM_TIMEOUT: {}", e))
            })?;
        }

        if let Some(level) = lookup("CACHE_PROXY_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Some(format) = lookup("CACHE_PROXY_LOG_FORMAT") {
            self.logging.format = format;
        }

        if let Some(enabled) = lookup("CACHE_PROXY_METRICS_ENABLED") {
            self.metrics.enabled = enabled.parse().map_err(|e| {
                ProxyError::config(format!("Invalid CACHE_PROXY_METRICS_ENABLED: {}", e))
            })?;
        }

        Ok(())
    }

    /// Validate the configuration, collecting every problem into one error
    pub fn validate(&self) -> ProxyResult<()> {
        let mut errors = Vec::new();

        if self.upstream.target.trim().is_empty() {
            errors.push("upstream.target is required".to_string());
        } else {
            match Url::parse(&self.upstream.target) {
                Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
                Ok(url) => errors.push(format!(
                    "upstream.target must use http or https, got: {}",
                    url.scheme()
                )),
                Err(e) => errors.push(format!("upstream.target is not a valid URL: {}", e)),
            }
        }

        if self.upstream.timeout.is_zero() {
            errors.push("upstream.timeout must be greater than 0".to_string());
        }

        if self.cache.default_ttl.is_zero() {
            errors.push("cache.default_ttl must be greater than 0".to_string());
        }

        if self.cache.max_entries == 0 {
            errors.push("cache.max_entries must be greater than 0".to_string());
        }

        if self.cache.max_entry_size == 0 {
            errors.push("cache.max_entry_size must be greater than 0".to_string());
        }

        if let Some(interval) = self.cache.sweep_interval {
            if interval.is_zero() {
                errors.push("cache.sweep_interval must be greater than 0".to_string());
            }
        }

        if self.server.bind_address.is_empty() {
            errors.push("server.bind_address cannot be empty".to_string());
        }

        if self.server.max_body_size == 0 {
            errors.push("server.max_body_size must be greater than 0".to_string());
        }

        if let Some(path) = &self.server.stats_path {
            if !path.starts_with('/') {
                errors.push(format!("server.stats_path must start with '/': {}", path));
            } else if path == CLEAR_CACHE_PATH {
                errors.push(format!("server.stats_path cannot be {}", CLEAR_CACHE_PATH));
            }
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => errors.push(format!("Invalid log level: {}", self.logging.level)),
        }

        match self.logging.format.to_lowercase().as_str() {
            "json" | "text" => {}
            _ => errors.push(format!("Invalid log format: {}", self.logging.format)),
        }

        if self.metrics.enabled && self.metrics.listen_address.parse::<SocketAddr>().is_err() {
            errors.push(format!(
                "metrics.listen_address is not a socket address: {}",
                self.metrics.listen_address
            ));
        }

        if !errors.is_empty() {
            return Err(ProxyError::config(format!(
                "Configuration validation failed:\n{}",
                errors.join("\n")
            )));
        }

        Ok(())
    }

    /// Socket address the proxy listens on
    pub fn bind_addr(&self) -> ProxyResult<SocketAddr> {
        format!("{}:{}", self.server.bind_address, self.server.port)
            .parse()
            .map_err(|e| ProxyError::config(format!("Invalid bind address: {}", e)))
    }
}
