//! TCP listener and accept loop.
//!
//! # Responsibilities
//! - Bind to the configured address
//! - Accept incoming TCP connections and hand them to the connection handler
//! - Schedule connections sequentially or as bounded concurrent tasks
//! - Treat failed accepts as transient unless the socket itself is unusable
//! - Stop accepting on shutdown and drain in-flight connections

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, Semaphore};
use tracing::Instrument;

use crate::cache::CacheStore;
use crate::config::{ListenerConfig, Scheduling};
use crate::net::connection::{ConnectionGuard, ConnectionTracker};
use crate::origin::Origin;
use crate::proxy::ConnectionHandler;

/// Pause after a transient accept failure (e.g. file descriptor exhaustion).
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("listening socket failed: {0}")]
    Accept(#[source] std::io::Error),
    #[error("connection limiter closed")]
    LimiterClosed,
}

/// Accepts connections and dispatches them to a [`ConnectionHandler`].
///
/// In [`Scheduling::Concurrent`] mode a semaphore bounds how many
/// connections are handled at once; when the limit is reached, accepting
/// waits until a slot is released.
pub struct Listener {
    inner: TcpListener,
    scheduling: Scheduling,
    connection_limit: Arc<Semaphore>,
    tracker: ConnectionTracker,
}

impl Listener {
    /// Bind to the configured address.
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let address = config.bind_address();
        let inner = TcpListener::bind(&address)
            .await
            .map_err(|source| ListenerError::Bind { address, source })?;
        Ok(Self::from_listener(inner, config))
    }

    /// Wrap an already bound listener.
    pub fn from_listener(inner: TcpListener, config: &ListenerConfig) -> Self {
        if let Ok(addr) = inner.local_addr() {
            tracing::info!(
                address = %addr,
                scheduling = %config.scheduling,
                max_connections = config.max_connections,
                "Listener bound"
            );
        }

        Self {
            inner,
            scheduling: config.scheduling,
            connection_limit: Arc::new(Semaphore::new(config.max_connections.max(1))),
            tracker: ConnectionTracker::new(),
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }

    /// Run the accept loop until `shutdown` fires.
    pub async fn run<S, O>(
        self,
        handler: Arc<ConnectionHandler<S, O>>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ListenerError>
    where
        S: CacheStore,
        O: Origin,
    {
        loop {
            // Acquire the slot first so the limit also throttles accepting.
            let permit = match self.scheduling {
                Scheduling::Sequential => None,
                Scheduling::Concurrent => {
                    let acquire = self.connection_limit.clone().acquire_owned();
                    tokio::select! {
                        permit = acquire => Some(permit.map_err(|_| ListenerError::LimiterClosed)?),
                        _ = shutdown.recv() => break,
                    }
                }
            };

            let accepted = tokio::select! {
                accepted = self.inner.accept() => accepted,
                _ = shutdown.recv() => break,
            };

            let (stream, peer) = match accepted {
                Ok(accepted) => accepted,
                Err(e) if is_fatal_accept_error(&e) => {
                    tracing::error!(error = %e, "Listening socket is no longer usable");
                    return Err(ListenerError::Accept(e));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to accept connection");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    continue;
                }
            };

            let guard = self.tracker.track();
            tracing::debug!(peer_addr = %peer, connection_id = %guard.id(), "Connection accepted");

            match self.scheduling {
                Scheduling::Sequential => serve_connection(&handler, stream, peer, guard).await,
                Scheduling::Concurrent => {
                    let handler = Arc::clone(&handler);
                    tokio::spawn(async move {
                        let _permit = permit;
                        serve_connection(&handler, stream, peer, guard).await;
                    });
                }
            }
        }

        tracing::info!(in_flight = self.tracker.active_count(), "Listener stopped accepting");
        self.tracker.wait_for_idle().await;
        Ok(())
    }
}

async fn serve_connection<S, O>(
    handler: &ConnectionHandler<S, O>,
    mut stream: TcpStream,
    peer: SocketAddr,
    guard: ConnectionGuard,
) where
    S: CacheStore,
    O: Origin,
{
    let span = tracing::info_span!("connection", id = %guard.id(), peer = %peer);
    async move {
        match handler.handle(&mut stream).await {
            Ok(outcome) => tracing::debug!(outcome = outcome.as_str(), "Connection handled"),
            Err(e) => tracing::debug!(error = %e, "Failed to write response"),
        }
        let _ = stream.shutdown().await;
        drop(guard);
    }
    .instrument(span)
    .await
}

/// Errors that mean the listening socket itself is broken, as opposed to a
/// single connection failing before it was accepted.
fn is_fatal_accept_error(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::InvalidInput | ErrorKind::NotConnected | ErrorKind::Unsupported
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::http::{parse_response, Headers, ResponseRecord};
    use crate::lifecycle::Shutdown;
    use crate::origin::OriginError;
    use tokio::io::AsyncReadExt;

    struct StaticOrigin;

    impl Origin for StaticOrigin {
        async fn fetch(&self, _method: &str, _url: &str) -> Result<ResponseRecord, OriginError> {
            Ok(ResponseRecord::new("HTTP/1.1 200 OK", Headers::new(), b"static".to_vec()))
        }
    }

    async fn start(scheduling: Scheduling) -> (SocketAddr, Shutdown, tokio::task::JoinHandle<Result<(), ListenerError>>) {
        let config = ListenerConfig {
            bind_host: "127.0.0.1".to_string(),
            port: 0,
            scheduling,
            max_connections: 4,
            ..ListenerConfig::default()
        };
        let listener = Listener::bind(&config).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handler = Arc::new(ConnectionHandler::new(MemoryStore::new(), StaticOrigin, "http://origin.test"));

        let shutdown = Shutdown::new();
        let rx = shutdown.subscribe();
        let task = tokio::spawn(listener.run(handler, rx));
        (addr, shutdown, task)
    }

    async fn roundtrip(addr: SocketAddr, request: &[u8]) -> Vec<u8> {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(request).await.unwrap();
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();
        response
    }

    #[test]
    fn accept_error_classification() {
        assert!(!is_fatal_accept_error(&std::io::Error::from(ErrorKind::ConnectionAborted)));
        assert!(!is_fatal_accept_error(&std::io::Error::from(ErrorKind::Interrupted)));
        assert!(is_fatal_accept_error(&std::io::Error::from(ErrorKind::InvalidInput)));
    }

    #[tokio::test]
    async fn sequential_serves_and_closes_connections() {
        let (addr, shutdown, task) = start(Scheduling::Sequential).await;

        let first = parse_response(&roundtrip(addr, b"GET /a HTTP/1.1\r\n\r\n").await).unwrap();
        assert_eq!(first.headers.get("X-Cache"), Some("MISS"));
        let second = parse_response(&roundtrip(addr, b"GET /a HTTP/1.1\r\n\r\n").await).unwrap();
        assert_eq!(second.headers.get("X-Cache"), Some("HIT"));
        assert_eq!(second.body, b"static");

        shutdown.trigger();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn concurrent_serves_parallel_clients() {
        let (addr, shutdown, task) = start(Scheduling::Concurrent).await;

        let clients: Vec<_> = (0..8)
            .map(|i| {
                tokio::spawn(async move {
                    let request = format!("GET /item/{} HTTP/1.1\r\n\r\n", i);
                    roundtrip(addr, request.as_bytes()).await
                })
            })
            .collect();
        for client in clients {
            let response = parse_response(&client.await.unwrap()).unwrap();
            assert_eq!(response.status_code(), Some(200));
        }

        shutdown.trigger();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn bind_failure_is_reported() {
        let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = ListenerConfig {
            bind_host: "127.0.0.1".to_string(),
            port: occupied.local_addr().unwrap().port(),
            ..ListenerConfig::default()
        };

        assert!(matches!(
            Listener::bind(&config).await,
            Err(ListenerError::Bind { .. })
        ));
    }
}
