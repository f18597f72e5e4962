//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::mimic::form::DEFAULT_MAX_FORM_BYTES;

/// Root configuration for the middleware server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request mocking.
    pub mimic: MimicConfig,

    /// CORS origin matching.
    pub cors: CorsConfig,

    /// Host header allow-list.
    pub host: HostConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Process resource limits.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Profiling server.
    pub profiling: ProfilingConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Which catcher renders mocks.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CatcherKind {
    #[default]
    Json,
    Xml,
}

/// Request mocking configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MimicConfig {
    /// Enable the mock interceptor.
    pub enabled: bool,

    /// Path to the mock document (YAML, TOML or JSON).
    pub path: String,

    /// Reload the mock document when it changes on disk.
    pub watch: bool,

    /// Catcher implementation.
    pub catcher: CatcherKind,

    /// Maximum url-encoded body size buffered for matching.
    pub max_form_bytes: usize,
}

impl Default for MimicConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: "mocks.yml".to_string(),
            watch: true,
            catcher: CatcherKind::Json,
            max_form_bytes: DEFAULT_MAX_FORM_BYTES,
        }
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CorsConfig {
    /// Enable origin checking.
    pub enabled: bool,

    /// Allowed origins. `*` allows any origin.
    pub origins: Vec<String>,
}

/// Host allow-list configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HostConfig {
    /// Enable host checking.
    pub enabled: bool,

    /// Allowed hosts, compared exactly (port included).
    pub allowed: Vec<String>,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Maximum requests per second per client. Also the burst size.
    pub requests_per_second: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            requests_per_second: 100,
        }
    }
}

/// Process resource limits.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct LimitsConfig {
    /// Soft and hard open file limit to apply at startup.
    pub max_open_files: Option<u64>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Path the Prometheus scrape endpoint is served on.
    pub metrics_path: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_path: "/metrics".to_string(),
        }
    }
}

/// Profiling server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProfilingConfig {
    /// Enable the profiling server.
    pub enabled: bool,

    /// Profiling server bind address.
    pub bind_address: String,
}

impl Default for ProfilingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_address: "127.0.0.1:6060".to_string(),
        }
    }
}
