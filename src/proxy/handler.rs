//! Per-connection request lifecycle.
//!
//! # Responsibilities
//! - Parse the request head; drop the connection silently if there is none
//! - Apply the method policy
//! - Derive the origin URL and cache key
//! - Serve hits from the store, fetch and store misses
//! - Annotate the outbound copy with `X-Cache` and write it
//!
//! # Design Decisions
//! - One attempt per connection, no retries
//! - Store failures are logged; the client still gets the origin response
//! - The stored record never carries `X-Cache`

use std::time::Instant;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::cache::{CacheKey, CacheStore};
use crate::config::{MethodPolicy, ProxyConfig};
use crate::http::{read_request, write_response, CacheStatus, Headers, ResponseRecord};
use crate::observability::metrics;
use crate::origin::{join_url, Origin};

const DEFAULT_MAX_HEADER_BYTES: usize = 64 * 1024;
const BAD_GATEWAY_BODY: &str = "Error fetching response from origin";

/// How a single connection was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Served from the cache.
    Hit,
    /// Fetched from the origin.
    Miss,
    /// Origin failed; a 502 was sent.
    BadGateway,
    /// Method rejected by the policy; a 405 was sent.
    MethodNotAllowed,
    /// No usable request; nothing was sent.
    Aborted,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Hit => "hit",
            Outcome::Miss => "miss",
            Outcome::BadGateway => "bad_gateway",
            Outcome::MethodNotAllowed => "method_not_allowed",
            Outcome::Aborted => "aborted",
        }
    }
}

/// Orchestrates parser, cache store, origin and writer for one connection.
pub struct ConnectionHandler<S, O> {
    store: S,
    origin: O,
    origin_base: String,
    method_policy: MethodPolicy,
    max_header_bytes: usize,
}

impl<S, O> ConnectionHandler<S, O>
where
    S: CacheStore,
    O: Origin,
{
    pub fn new(store: S, origin: O, origin_base: &str) -> Self {
        Self {
            store,
            origin,
            origin_base: origin_base.trim_end_matches('/').to_string(),
            method_policy: MethodPolicy::SafeOnly,
            max_header_bytes: DEFAULT_MAX_HEADER_BYTES,
        }
    }

    pub fn from_config(store: S, origin: O, config: &ProxyConfig) -> Self {
        Self::new(store, origin, config.origin.normalized_base())
            .with_method_policy(config.origin.method_policy)
            .with_max_header_bytes(config.listener.max_header_bytes)
    }

    pub fn with_method_policy(mut self, policy: MethodPolicy) -> Self {
        self.method_policy = policy;
        self
    }

    pub fn with_max_header_bytes(mut self, max: usize) -> Self {
        self.max_header_bytes = max;
        self
    }

    /// Handle one connection from request head to response.
    ///
    /// Only errors writing to the client are returned; every other failure
    /// is resolved into an [`Outcome`].
    pub async fn handle<T>(&self, stream: &mut T) -> std::io::Result<Outcome>
    where
        T: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let start = Instant::now();
        let outcome = self.serve(stream).await?;
        metrics::record_request(outcome.as_str(), start);
        Ok(outcome)
    }

    async fn serve<T>(&self, stream: &mut T) -> std::io::Result<Outcome>
    where
        T: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let request = match read_request(stream, self.max_header_bytes).await {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!(error = %e, "No request, closing connection");
                return Ok(Outcome::Aborted);
            }
        };

        let Some(upstream_method) = self.upstream_method(&request.method) else {
            tracing::info!(method = %request.method, target = %request.target, "Method not allowed");
            write_response(stream, &method_not_allowed()).await?;
            return Ok(Outcome::MethodNotAllowed);
        };

        let origin_url = join_url(&self.origin_base, &request.target);
        let key = CacheKey::new(&request.method, &origin_url);

        if let Some(record) = self.store.get(&key).await {
            tracing::info!(method = %request.method, url = %origin_url, key = %key, "Cache hit");
            metrics::record_cache_event("hit");
            write_response(stream, &record.annotated(CacheStatus::Hit)).await?;
            return Ok(Outcome::Hit);
        }
        metrics::record_cache_event("miss");

        let record = match self.origin.fetch(upstream_method, &origin_url).await {
            Ok(record) => {
                metrics::record_origin_request("ok");
                record
            }
            Err(e) if e.is_client_side() => {
                tracing::debug!(url = %origin_url, error = %e, "Request cannot be forwarded to origin");
                metrics::record_origin_request("rejected");
                write_response(stream, &bad_gateway()).await?;
                return Ok(Outcome::BadGateway);
            }
            Err(e) => {
                tracing::warn!(url = %origin_url, error = %e, "Origin request failed");
                metrics::record_origin_request("error");
                write_response(stream, &bad_gateway()).await?;
                return Ok(Outcome::BadGateway);
            }
        };

        if let Err(e) = self.store.put(&key, &record).await {
            tracing::warn!(key = %key, error = %e, "Failed to store cache entry");
            metrics::record_cache_event("store_error");
        }

        tracing::info!(
            method = %request.method,
            url = %origin_url,
            key = %key,
            status = %record.status_line,
            "Cache miss, fetched from origin"
        );
        write_response(stream, &record.annotated(CacheStatus::Miss)).await?;
        Ok(Outcome::Miss)
    }

    /// The method sent to the origin, or `None` if the policy rejects it.
    fn upstream_method<'a>(&self, method: &'a str) -> Option<&'a str> {
        match self.method_policy {
            MethodPolicy::SafeOnly => matches!(method, "GET" | "HEAD").then_some(method),
            MethodPolicy::ForceGet => Some("GET"),
            MethodPolicy::Preserve => Some(method),
        }
    }
}

fn bad_gateway() -> ResponseRecord {
    ResponseRecord::new("HTTP/1.1 502 Bad Gateway", Headers::new(), BAD_GATEWAY_BODY)
}

fn method_not_allowed() -> ResponseRecord {
    let headers: Headers = [("Allow", "GET, HEAD")].into_iter().collect();
    ResponseRecord::new("HTTP/1.1 405 Method Not Allowed", headers, "Method Not Allowed")
}
