//! Response serialization.
//!
//! Framing headers are always computed here: any `Content-Length`,
//! `Transfer-Encoding` or `Connection` header in the mapping is replaced by
//! an exact `Content-Length` and `Connection: close`.

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::http::message::{Headers, ResponseRecord};

const FRAMING_HEADERS: [&str; 3] = ["content-length", "transfer-encoding", "connection"];

/// Serialize a status line, headers and body into wire bytes.
pub fn encode_response(status_line: &str, headers: &Headers, body: &[u8]) -> Vec<u8> {
    let mut head = String::with_capacity(128 + headers.len() * 32);
    head.push_str(status_line);
    head.push_str("\r\n");

    for (name, value) in headers.iter() {
        if is_framing_header(name) {
            continue;
        }
        head.push_str(name);
        head.push_str(": ");
        head.push_str(value);
        head.push_str("\r\n");
    }

    head.push_str(&format!("Content-Length: {}\r\n", body.len()));
    head.push_str("Connection: close\r\n\r\n");

    let mut out = head.into_bytes();
    out.extend_from_slice(body);
    out
}

/// Encode `record` and write it to `writer`, flushing afterwards.
pub async fn write_response<W>(writer: &mut W, record: &ResponseRecord) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let bytes = encode_response(&record.status_line, &record.headers, &record.body);
    writer.write_all(&bytes).await?;
    writer.flush().await
}

fn is_framing_header(name: &str) -> bool {
    FRAMING_HEADERS
        .iter()
        .any(|framing| framing.eq_ignore_ascii_case(name))
}
