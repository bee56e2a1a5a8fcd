//! Response cache subsystem.
//!
//! # Data Flow
//! ```text
//! (method, origin URL)
//!     → key.rs (SHA-256 digest)
//!     → CacheStore::get  → hit: stored ResponseRecord
//!                        → miss / corrupt: None
//! origin response
//!     → CacheStore::put  (whole-entry overwrite)
//! admin command
//!     → CacheStore::clear
//! ```
//!
//! # Design Decisions
//! - Stores are injected into the connection handler through [`CacheStore`]
//! - Corrupt entries read as misses and are replaced by the next put
//! - Entries never expire; only `clear` removes them

pub mod disk;
pub mod key;
pub mod memory;

use std::future::Future;

use thiserror::Error;

use crate::http::ResponseRecord;

pub use disk::DiskStore;
pub use key::CacheKey;
pub use memory::MemoryStore;

/// Errors raised by cache writes and clears.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode cache entry: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("cache worker failed: {0}")]
    Worker(String),
}

/// Key/value store for captured responses.
///
/// Implementations must tolerate concurrent calls: a `get` never observes a
/// partially written entry, and operations on different keys do not
/// interfere.
pub trait CacheStore: Send + Sync + 'static {
    /// Fetch the entry for `key`. Missing or unreadable entries yield `None`.
    fn get(&self, key: &CacheKey) -> impl Future<Output = Option<ResponseRecord>> + Send;

    /// Store `record` under `key`, replacing any existing entry.
    fn put(
        &self,
        key: &CacheKey,
        record: &ResponseRecord,
    ) -> impl Future<Output = Result<(), CacheError>> + Send;

    /// Remove every entry. Returns how many entries were removed.
    fn clear(&self) -> impl Future<Output = Result<usize, CacheError>> + Send;
}
