//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap origin calls with a total deadline
//! - Cancel the wrapped future cleanly when the deadline passes
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from transport errors
//! - Timed-out origin calls surface to the client as 502 Bad Gateway

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// The wrapped operation did not finish in time.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("operation timed out after {0:?}")]
pub struct TimeoutError(pub Duration);

/// Run `fut` to completion or fail once `limit` has elapsed.
pub async fn with_timeout<F>(limit: Duration, fut: F) -> Result<F::Output, TimeoutError>
where
    F: Future,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| TimeoutError(limit))
}
