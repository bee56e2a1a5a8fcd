//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to origin:
//!     → timeouts.rs (connect deadline in the connector, total deadline here)
//!     → On failure: 502 to the client, no retry
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every origin call has a deadline
//! - No retries: one attempt per client request

pub mod timeouts;

pub use timeouts::{with_timeout, TimeoutError};
