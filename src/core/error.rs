//! # Error Handling Module
//!
//! This module defines the error types used by the cache proxy using the `thiserror` crate.
//!
//! There are two families of errors:
//!
//! - [`ProxyError`] covers everything outside a single request's forward attempt:
//!   configuration, startup, I/O and server failures. These are the errors `main`
//!   propagates with `?`.
//! - [`ForwardError`] covers the three ways forwarding a cache miss can fail. These
//!   never propagate past the proxy handler; each one is turned into a response with a
//!   status code and a diagnostic log line, and none of them creates a cache entry.
//!
//! ## Status mapping for forward failures
//! | Variant               | Status |
//! |-----------------------|--------|
//! | `RequestConstruction` | 400    |
//! | `UpstreamDispatch`    | 502    |
//! | `ResponseRead`        | 500    |

use axum::http::StatusCode;
use serde_json::json;
use thiserror::Error;

/// Main result type used throughout the proxy
pub type ProxyResult<T> = Result<T, ProxyError>;

/// Errors raised while configuring, starting or running the proxy
#[derive(Debug, Error, Clone)]
pub enum ProxyError {
    /// Configuration-related errors (invalid config, missing target, etc.)
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Listener and serving failures
    #[error("Server error: {message}")]
    Server { message: String },

    /// I/O errors (config file reads, socket binding, etc.)
    #[error("I/O error: {message}")]
    Io { message: String },

    /// YAML parsing errors for configuration files
    #[error("YAML error: {message}")]
    Yaml { message: String },

    /// Observability setup errors (subscriber or exporter installation)
    #[error("Observability error: {message}")]
    Observability { message: String },
}

impl ProxyError {
    /// Create a configuration error with a custom message
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a server error with a custom message
    pub fn server<S: Into<String>>(message: S) -> Self {
        Self::Server {
            message: message.into(),
        }
    }

    /// Create an observability error with a custom message
    pub fn observability<S: Into<String>>(message: S) -> Self {
        Self::Observability {
            message: message.into(),
        }
    }

    /// Stable identifier of the error kind, used as a log field
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration_error",
            Self::Server { .. } => "server_error",
            Self::Io { .. } => "io_error",
            Self::Yaml { .. } => "yaml_error",
            Self::Observability { .. } => "observability_error",
        }
    }
}

impl From<std::io::Error> for ProxyError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for ProxyError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Yaml {
            message: err.to_string(),
        }
    }
}

/// Failures of a single forward attempt to the upstream.
///
/// Each variant corresponds to one stage of forwarding: building the outbound
/// request, dispatching it, and reading the response body.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ForwardError {
    /// The outbound request could not be built (e.g. the target URL is invalid)
    #[error("Failed to create upstream request: {message}")]
    RequestConstruction { message: String },

    /// The upstream could not be reached or did not answer within the timeout
    #[error("Failed to forward request to {target}: {message}")]
    UpstreamDispatch { target: String, message: String },

    /// The upstream answered but its body could not be fully read
    #[error("Failed to read upstream response body: {message}")]
    ResponseRead { message: String },
}

impl ForwardError {
    pub fn construction<S: Into<String>>(message: S) -> Self {
        Self::RequestConstruction {
            message: message.into(),
        }
    }

    pub fn dispatch<T: Into<String>, S: Into<String>>(target: T, message: S) -> Self {
        Self::UpstreamDispatch {
            target: target.into(),
            message: message.into(),
        }
    }

    pub fn read<S: Into<String>>(message: S) -> Self {
        Self::ResponseRead {
            message: message.into(),
        }
    }

    /// Status code returned to the client for this failure
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::RequestConstruction { .. } => StatusCode::BAD_REQUEST,
            Self::UpstreamDispatch { .. } => StatusCode::BAD_GATEWAY,
            Self::ResponseRead { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable identifier used in logs, metric labels and error bodies
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::RequestConstruction { .. } => "request_construction_error",
            Self::UpstreamDispatch { .. } => "upstream_dispatch_error",
            Self::ResponseRead { .. } => "response_read_error",
        }
    }
}

/// JSON body shared by every error response the proxy generates itself
pub fn error_body(status: StatusCode, message: &str, error_type: &str) -> serde_json::Value {
    json!({
        "error": {
            "code": status.as_u16(),
            "message": message,
            "type": error_type,
        }
    })
}
