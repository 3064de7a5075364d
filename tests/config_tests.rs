//! Configuration file loading tests.

use cache_proxy::ProxyConfig;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[tokio::test]
async fn test_load_full_config_file() {
    let file = write_config(
        r#"
server:
  bind_address: "127.0.0.1"
  port: 8181
  max_body_size: 2048
upstream:
  target: "http://origin.internal:3000"
  timeout: 3s
cache:
  default_ttl: 5s
  max_entries: 2
  sweep_interval: 1m
logging:
  level: debug
  format: json
metrics:
  enabled: true
  listen_address: "127.0.0.1:9191"
"#,
    );

    let config = ProxyConfig::from_yaml_file(file.path()).await.unwrap();
    config.validate().unwrap();

    assert_eq!(config.bind_addr().unwrap().to_string(), "127.0.0.1:8181");
    assert_eq!(config.server.max_body_size, 2048);
    assert_eq!(config.upstream.target, "http://origin.internal:3000");
    assert_eq!(config.upstream.timeout, Duration::from_secs(3));
    assert_eq!(config.cache.default_ttl, Duration::from_secs(5));
    assert_eq!(config.cache.max_entries, 2);
    assert_eq!(config.cache.sweep_interval, Some(Duration::from_secs(60)));
    assert_eq!(config.logging.format, "json");
    assert!(config.metrics.enabled);
}

#[tokio::test]
async fn test_partial_file_uses_defaults() {
    let file = write_config("upstream:\n  target: \"https://api.example.com\"\n");

    let config = ProxyConfig::from_yaml_file(file.path()).await.unwrap();
    config.validate().unwrap();

    assert_eq!(config.server.port, 8080);
    assert_eq!(config.upstream.timeout, Duration::from_secs(10));
    assert_eq!(config.cache.default_ttl, Duration::from_secs(300));
    assert_eq!(config.cache.max_entries, 100);
    assert_eq!(config.cache.sweep_interval, None);
}

#[tokio::test]
async fn test_invalid_file_is_rejected() {
    let file = write_config(
        r#"
upstream:
  target: "http://origin"
cache:
  max_entries: 0
  default_ttl: 0s
"#,
    );

    let config = ProxyConfig::from_yaml_file(file.path()).await.unwrap();
    let err = config.validate().unwrap_err().to_string();
    assert!(err.contains("cache.max_entries"));
    assert!(err.contains("cache.default_ttl"));
}

#[tokio::test]
async fn test_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.yaml");
    assert!(ProxyConfig::from_yaml_file(&missing).await.is_err());
}

#[tokio::test]
async fn test_malformed_yaml_is_an_error() {
    let file = write_config("server: [not, a, map");
    assert!(ProxyConfig::from_yaml_file(file.path()).await.is_err());
}
