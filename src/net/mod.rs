//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, scheduling, connection limits)
//!     → connection.rs (id, lifetime tracking)
//!     → proxy::ConnectionHandler
//!     → stream shut down once the handler returns
//! ```
//!
//! # Design Decisions
//! - Scheduling is a configuration choice: sequential or bounded concurrent
//! - Each connection tracked for graceful shutdown
//! - One response per connection, no keep-alive

pub mod connection;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{Listener, ListenerError};
