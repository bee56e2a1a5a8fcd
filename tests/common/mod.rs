//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use caching_proxy::cache::CacheStore;
use caching_proxy::config::ProxyConfig;
use caching_proxy::net::{Listener, ListenerError};
use caching_proxy::origin::OriginClient;
use caching_proxy::proxy::ConnectionHandler;
use caching_proxy::Shutdown;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A scripted origin server listening on an ephemeral port.
pub struct MockOrigin {
    pub addr: SocketAddr,
    calls: Arc<AtomicUsize>,
}

impl MockOrigin {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Number of requests the origin has answered.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Start an origin that answers each request with the raw response
/// produced by `respond` for the request target.
pub async fn start_origin<F>(respond: F) -> MockOrigin
where
    F: Fn(&str) -> String + Send + Sync + 'static,
{
    start_slow_origin(Duration::ZERO, respond).await
}

/// Like [`start_origin`], but each answer is held back by `delay` without
/// blocking the runtime.
pub async fn start_slow_origin<F>(delay: Duration, respond: F) -> MockOrigin
where
    F: Fn(&str) -> String + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let respond = Arc::new(respond);

    let counter = calls.clone();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let respond = respond.clone();
            let counter = counter.clone();
            tokio::spawn(async move {
                let mut head = Vec::new();
                let mut buf = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => head.extend_from_slice(&buf[..n]),
                    }
                }
                let head = String::from_utf8_lossy(&head);
                let target = head.split_whitespace().nth(1).unwrap_or("/").to_string();

                counter.fetch_add(1, Ordering::SeqCst);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                let response = respond(&target);
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    MockOrigin { addr, calls }
}

/// A complete `200 OK` JSON response.
pub fn json_response(body: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    )
}

/// Address of a local port with nothing listening on it.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

pub struct RunningProxy {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub task: JoinHandle<Result<(), ListenerError>>,
}

impl RunningProxy {
    pub fn url(&self, target: &str) -> String {
        format!("http://{}{}", self.addr, target)
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        self.task.await.unwrap().unwrap();
    }
}

/// Start the proxy on an ephemeral port in front of `config.origin`.
pub async fn start_proxy<S: CacheStore>(mut config: ProxyConfig, store: S) -> RunningProxy {
    config.listener.bind_host = "127.0.0.1".to_string();
    config.listener.port = 0;
    config.origin.connect_timeout_secs = 1;
    config.origin.request_timeout_secs = 5;

    let listener = Listener::bind(&config.listener).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handler = ConnectionHandler::from_config(store, OriginClient::new(&config.origin), &config);

    let shutdown = Shutdown::new();
    let stop = shutdown.subscribe();
    let task = tokio::spawn(listener.run(Arc::new(handler), stop));

    RunningProxy { addr, shutdown, task }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
