//! Origin subsystem.
//!
//! # Data Flow
//! ```text
//! cache miss
//!     → join_url (origin base + request target)
//!     → Origin::fetch (one attempt, deadline-bounded)
//!     → ResponseRecord | OriginError (→ 502)
//! ```

pub mod client;

use std::future::Future;

use thiserror::Error;

use crate::http::ResponseRecord;
use crate::resilience::TimeoutError;

pub use client::OriginClient;

/// Reasons an origin fetch produced no response.
#[derive(Debug, Error)]
pub enum OriginError {
    #[error("invalid origin URL: {0}")]
    InvalidUrl(String),
    #[error("invalid request method: {0}")]
    InvalidMethod(String),
    #[error("origin request failed: {0}")]
    Transport(#[from] hyper_util::client::legacy::Error),
    #[error("failed to read origin response body: {0}")]
    Body(#[source] hyper::Error),
    #[error(transparent)]
    Timeout(#[from] TimeoutError),
}

impl OriginError {
    /// The request could not be expressed as an origin request at all, so
    /// the origin was never contacted.
    pub fn is_client_side(&self) -> bool {
        matches!(self, OriginError::InvalidUrl(_) | OriginError::InvalidMethod(_))
    }
}

/// Something that can answer a request for an absolute URL.
///
/// Implemented by [`OriginClient`]; tests substitute scripted origins.
pub trait Origin: Send + Sync + 'static {
    fn fetch(
        &self,
        method: &str,
        url: &str,
    ) -> impl Future<Output = Result<ResponseRecord, OriginError>> + Send;
}

/// Fully-qualified origin URL for a request target.
///
/// Trailing slashes on `base` are dropped; `target` already begins with `/`.
pub fn join_url(base: &str, target: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), target)
}
