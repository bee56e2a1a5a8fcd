//! Caching proxy core.
//!
//! # Data Flow
//! ```text
//! accepted stream
//!     → handler.rs
//!         → http::parser   (request head)
//!         → cache::CacheKey (method + origin URL)
//!         → CacheStore::get ── hit ──────────────┐
//!         → Origin::fetch ── error → 502         │
//!         → CacheStore::put                      │
//!         → http::writer (X-Cache: MISS / HIT) ◀─┘
//! ```

pub mod handler;

pub use handler::{ConnectionHandler, Outcome};
