//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Root configuration for the caching proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (port, scheduling).
    pub listener: ListenerConfig,

    /// Origin server and how requests are forwarded to it.
    pub origin: OriginConfig,

    /// Cache storage backend.
    pub cache: CacheConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind (e.g., "0.0.0.0").
    pub bind_host: String,

    /// TCP port to listen on.
    pub port: u16,

    /// How accepted connections are scheduled.
    pub scheduling: Scheduling,

    /// Maximum connections handled at once in concurrent mode.
    pub max_connections: usize,

    /// Largest request head accepted before the connection is dropped.
    pub max_header_bytes: usize,
}

impl ListenerConfig {
    /// `host:port` string suitable for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port: 8080,
            scheduling: Scheduling::Sequential,
            max_connections: 64,
            max_header_bytes: 64 * 1024,
        }
    }
}

/// Connection scheduling strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scheduling {
    /// Handle one connection to completion before accepting the next.
    Sequential,
    /// One task per connection, bounded by `max_connections`.
    Concurrent,
}

impl FromStr for Scheduling {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sequential" => Ok(Scheduling::Sequential),
            "concurrent" => Ok(Scheduling::Concurrent),
            other => Err(format!("unknown scheduling '{}', expected sequential or concurrent", other)),
        }
    }
}

impl fmt::Display for Scheduling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheduling::Sequential => f.write_str("sequential"),
            Scheduling::Concurrent => f.write_str("concurrent"),
        }
    }
}

/// Origin configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OriginConfig {
    /// Scheme and host of the origin (e.g., "http://dummyjson.com").
    pub base_url: String,

    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Total time allowed for one origin request, body included, in seconds.
    pub request_timeout_secs: u64,

    /// Which client methods are cached and what is sent to the origin.
    pub method_policy: MethodPolicy,
}

impl OriginConfig {
    /// Base URL with any trailing slashes removed.
    pub fn normalized_base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            connect_timeout_secs: 5,
            request_timeout_secs: 30,
            method_policy: MethodPolicy::SafeOnly,
        }
    }
}

/// How the client's request method is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MethodPolicy {
    /// Only GET and HEAD are served; other methods get 405.
    SafeOnly,
    /// Every method is fetched from the origin as GET.
    ForceGet,
    /// The client's method is sent to the origin unchanged (without a body).
    Preserve,
}

impl FromStr for MethodPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "safe-only" => Ok(MethodPolicy::SafeOnly),
            "force-get" => Ok(MethodPolicy::ForceGet),
            "preserve" => Ok(MethodPolicy::Preserve),
            other => Err(format!(
                "unknown method policy '{}', expected safe-only, force-get or preserve",
                other
            )),
        }
    }
}

/// Cache storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Storage backend.
    pub backend: CacheBackend,

    /// Directory holding cache entries (disk backend).
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Disk,
            dir: PathBuf::from("cache"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheBackend {
    Disk,
    Memory,
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

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    Pretty,
    Json,
}
