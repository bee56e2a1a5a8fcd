//! HTTP/1.x wire handling.
//!
//! # Data Flow
//! ```text
//! client bytes
//!     → parser.rs (request line + header block → Request)
//!     → [proxy handler: cache / origin]
//!     → writer.rs (ResponseRecord → status line, headers, framing, body)
//!     → client socket
//! ```
//!
//! # Design Decisions
//! - Only the request head is read; request bodies are never consumed
//! - Header maps keep insertion order, last write wins on duplicate names
//! - Framing headers are always recomputed on the way out

pub mod message;
pub mod parser;
pub mod writer;

pub use message::{CacheStatus, Headers, Request, ResponseRecord, X_CACHE};
pub use parser::{parse_request_head, parse_response, read_request, ParseError};
pub use writer::{encode_response, write_response};
