//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate the origin URL shape (absolute http URL, host, no query)
//! - Validate value ranges (timeouts > 0, ports valid)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use url::Url;

use crate::config::schema::{CacheBackend, ProxyConfig};

const MIN_HEADER_BYTES: usize = 1024;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Check every semantic rule and report all failures.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = validate_origin_url(&config.origin.base_url) {
        errors.push(e);
    }
    if config.listener.port == 0 {
        errors.push(ValidationError::new("listener.port", "must be between 1 and 65535"));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be greater than 0"));
    }
    if config.listener.max_header_bytes < MIN_HEADER_BYTES {
        errors.push(ValidationError::new(
            "listener.max_header_bytes",
            format!("must be at least {}", MIN_HEADER_BYTES),
        ));
    }
    if config.origin.connect_timeout_secs == 0 {
        errors.push(ValidationError::new("origin.connect_timeout_secs", "must be greater than 0"));
    }
    if config.origin.request_timeout_secs == 0 {
        errors.push(ValidationError::new("origin.request_timeout_secs", "must be greater than 0"));
    }
    if config.cache.backend == CacheBackend::Disk && config.cache.dir.as_os_str().is_empty() {
        errors.push(ValidationError::new("cache.dir", "must not be empty for the disk backend"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// The origin must be an absolute plain-HTTP URL with a host and nothing
/// after the path.
pub fn validate_origin_url(raw: &str) -> Result<(), ValidationError> {
    const FIELD: &str = "origin.base_url";

    if raw.is_empty() {
        return Err(ValidationError::new(FIELD, "is required"));
    }
    let url = Url::parse(raw).map_err(|e| ValidationError::new(FIELD, format!("invalid URL: {}", e)))?;

    if url.scheme() != "http" {
        return Err(ValidationError::new(
            FIELD,
            format!("scheme '{}' is not supported, use http", url.scheme()),
        ));
    }
    if url.host_str().is_none() {
        return Err(ValidationError::new(FIELD, "must include a host"));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(ValidationError::new(FIELD, "must not contain a query or fragment"));
    }
    Ok(())
}
