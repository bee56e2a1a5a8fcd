//! HTTP client for the configured origin.
//!
//! # Responsibilities
//! - Issue one request per cache miss, no retries, no redirect following
//! - Capture status line, headers and the complete body
//! - Bound every call by connect and total deadlines
//!
//! Framing is handled by hyper, so the header block is separated from the
//! body by the transport rather than by searching the bytes for a blank line.
//!
//! The body and status code are kept byte for byte. Header values are stored
//! as text: bytes that are not valid UTF-8 (legal `obs-text` in HTTP/1.1) are
//! replaced with U+FFFD when the record is captured, and names come back in
//! Title-Case because hyper lowercases them.

use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper::{Method, Request, Response, Uri};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::config::OriginConfig;
use crate::http::{Headers, ResponseRecord};
use crate::origin::{Origin, OriginError};
use crate::resilience::with_timeout;

/// Origin client backed by a pooled hyper connection manager.
#[derive(Clone)]
pub struct OriginClient {
    client: Client<HttpConnector, Empty<Bytes>>,
    request_timeout: Duration,
}

impl OriginClient {
    pub fn new(config: &OriginConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.connect_timeout_secs)));

        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            client,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }

    async fn send(&self, request: Request<Empty<Bytes>>) -> Result<ResponseRecord, OriginError> {
        let response = self.client.request(request).await?;
        let status_line = status_line(&response);

        let (parts, body) = response.into_parts();
        let headers: Headers = parts
            .headers
            .iter()
            .map(|(name, value)| {
                (
                    canonical_name(name.as_str()),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        let body = body.collect().await.map_err(OriginError::Body)?.to_bytes();

        Ok(ResponseRecord::new(status_line, headers, body.to_vec()))
    }
}

impl Origin for OriginClient {
    async fn fetch(&self, method: &str, url: &str) -> Result<ResponseRecord, OriginError> {
        let uri: Uri = url
            .parse()
            .map_err(|e: hyper::http::uri::InvalidUri| OriginError::InvalidUrl(e.to_string()))?;
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|_| OriginError::InvalidMethod(method.to_string()))?;

        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Empty::<Bytes>::new())
            .map_err(|e| OriginError::InvalidUrl(e.to_string()))?;

        with_timeout(self.request_timeout, self.send(request)).await?
    }
}

/// Rebuild the status line, keeping the origin's own reason phrase.
fn status_line<B>(response: &Response<B>) -> String {
    let status = response.status();
    let reason = response
        .extensions()
        .get::<hyper::ext::ReasonPhrase>()
        .map(|reason| String::from_utf8_lossy(reason.as_bytes()).into_owned())
        .or_else(|| status.canonical_reason().map(str::to_string))
        .unwrap_or_default();

    let line = format!("{:?} {} {}", response.version(), status.as_u16(), reason);
    line.trim_end().to_string()
}

/// `content-type` → `Content-Type`.
fn canonical_name(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn one_shot_origin(raw_response: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 2048];
            let _ = socket.read(&mut buf).await;
            let _ = socket.write_all(raw_response).await;
            let _ = socket.shutdown().await;
        });
        format!("http://{}", addr)
    }

    fn config() -> OriginConfig {
        OriginConfig {
            base_url: String::new(),
            connect_timeout_secs: 1,
            request_timeout_secs: 2,
            ..OriginConfig::default()
        }
    }

    #[test]
    fn canonical_header_names() {
        assert_eq!(canonical_name("content-type"), "Content-Type");
        assert_eq!(canonical_name("x-request-id"), "X-Request-Id");
        assert_eq!(canonical_name("etag"), "Etag");
    }

    #[tokio::test]
    async fn captures_status_headers_and_body() {
        let base = one_shot_origin(
            b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 8\r\n\r\n{\"id\":5}",
        )
        .await;

        let record = OriginClient::new(&config())
            .fetch("GET", &format!("{}/items/5", base))
            .await
            .unwrap();

        assert_eq!(record.status_line, "HTTP/1.1 200 OK");
        assert_eq!(record.headers.get("Content-Type"), Some("application/json"));
        assert_eq!(record.body, br#"{"id":5}"#);
    }

    #[tokio::test]
    async fn body_containing_blank_line_is_not_truncated() {
        let base = one_shot_origin(
            b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n6\r\nab\r\n\r\n\r\n2\r\ncd\r\n0\r\n\r\n",
        )
        .await;

        let record = OriginClient::new(&config()).fetch("GET", &format!("{}/", base)).await.unwrap();
        assert_eq!(record.body, b"ab\r\n\r\ncd");
    }

    #[tokio::test]
    async fn keeps_custom_reason_phrase() {
        let base = one_shot_origin(b"HTTP/1.1 404 Nothing Here\r\nContent-Length: 0\r\n\r\n").await;

        let record = OriginClient::new(&config()).fetch("GET", &format!("{}/x", base)).await.unwrap();
        assert_eq!(record.status_line, "HTTP/1.1 404 Nothing Here");
    }

    #[tokio::test]
    async fn non_utf8_header_bytes_are_replaced() {
        let base = one_shot_origin(b"HTTP/1.1 200 OK\r\nX-Name: caf\xe9\r\nContent-Length: 2\r\n\r\nok").await;

        let record = OriginClient::new(&config()).fetch("GET", &format!("{}/", base)).await.unwrap();
        assert_eq!(record.headers.get("X-Name"), Some("caf\u{FFFD}"));
        assert_eq!(record.body, b"ok");
    }

    #[tokio::test]
    async fn target_rejected_by_uri_parser_never_connects() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());

        let result = OriginClient::new(&config())
            .fetch("GET", &crate::origin::join_url(&base, "/x?q=\"a\""))
            .await;
        assert!(matches!(result, Err(OriginError::InvalidUrl(_))));

        let accepted = tokio::time::timeout(Duration::from_millis(100), listener.accept()).await;
        assert!(accepted.is_err(), "origin must not be contacted");
    }

    #[tokio::test]
    async fn unreachable_origin_is_transport_error() {
        // Bind then drop to obtain a port with nothing listening.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = OriginClient::new(&config())
            .fetch("GET", &format!("http://{}/", addr))
            .await;
        assert!(matches!(result, Err(OriginError::Transport(_))));
    }

    #[tokio::test]
    async fn silent_origin_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
            drop(socket);
        });

        let result = OriginClient::new(&config())
            .fetch("GET", &format!("http://{}/", addr))
            .await;
        assert!(matches!(result, Err(OriginError::Timeout(_))));
    }
}
