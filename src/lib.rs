//! Forward caching HTTP proxy.
//!
//! Accepts raw HTTP/1.x connections, forwards cache misses to a configured
//! origin and replays stored responses for repeated `(method, URL)` pairs.
//! Every response carries `X-Cache: HIT` or `X-Cache: MISS`.

// Core subsystems
pub mod cache;
pub mod config;
pub mod http;
pub mod net;
pub mod origin;
pub mod proxy;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use cache::{CacheKey, CacheStore, DiskStore, MemoryStore};
pub use config::ProxyConfig;
pub use lifecycle::Shutdown;
pub use net::Listener;
pub use origin::{Origin, OriginClient};
pub use proxy::{ConnectionHandler, Outcome};
