//! Line-oriented HTTP/1.x head parser.
//!
//! # Responsibilities
//! - Read a request head off a client stream until the blank line
//! - Split the request line into method, target and version
//! - Collect `Name: value` header lines into an ordered [`Headers`] map
//! - Parse a raw response (status line, headers, remaining bytes as body)
//!
//! The request body is never consumed.

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::http::message::{Headers, Request, ResponseRecord};

const READ_CHUNK: usize = 1024;

/// Reasons a byte stream did not yield a usable message.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("connection closed before any bytes were received")]
    Empty,
    #[error("request line is missing")]
    MissingRequestLine,
    #[error("malformed request line: {0:?}")]
    MalformedRequestLine(String),
    #[error("request target must be origin-form: {0:?}")]
    InvalidTarget(String),
    #[error("message head exceeds {0} bytes")]
    HeadTooLarge(usize),
    #[error("malformed status line: {0:?}")]
    MalformedStatusLine(String),
    #[error("header block is not terminated by an empty line")]
    UnterminatedHead,
}

/// Read a request head from `reader` and parse it.
///
/// Reading stops at the first empty line, at end of stream, or at the first
/// read error, whichever comes first. Whatever was received by then is
/// parsed. A head that grows past `max_head_bytes` without a terminating
/// empty line is rejected.
pub async fn read_request<R>(reader: &mut R, max_head_bytes: usize) -> Result<Request, ParseError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(READ_CHUNK);
    let mut chunk = [0u8; READ_CHUNK];

    while find_head_end(&buf).is_none() {
        if buf.len() > max_head_bytes {
            return Err(ParseError::HeadTooLarge(max_head_bytes));
        }
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(e) => {
                tracing::debug!(error = %e, received = buf.len(), "Read error while reading request head");
                break;
            }
        }
    }

    if buf.is_empty() {
        return Err(ParseError::Empty);
    }

    parse_request_head(&buf)
}

/// Parse a request head from raw bytes.
///
/// Bytes after the header block, if any, are ignored.
pub fn parse_request_head(raw: &[u8]) -> Result<Request, ParseError> {
    let head = match find_head_end(raw) {
        Some((end, _)) => &raw[..end],
        None => raw,
    };
    let text = String::from_utf8_lossy(head);
    let mut lines = split_lines(&text);

    let request_line = lines
        .next()
        .filter(|line| !line.trim().is_empty())
        .ok_or(ParseError::MissingRequestLine)?;

    let tokens: Vec<&str> = request_line.split_whitespace().collect();
    let [method, target, version] = tokens[..] else {
        return Err(ParseError::MalformedRequestLine(request_line.to_string()));
    };

    if !target.starts_with('/') {
        return Err(ParseError::InvalidTarget(target.to_string()));
    }

    Ok(Request {
        method: method.to_string(),
        target: target.to_string(),
        version: version.to_string(),
        headers: parse_header_lines(lines),
    })
}

/// Parse a complete raw HTTP response.
///
/// Everything after the header block is taken as the body; no framing
/// headers are consulted.
pub fn parse_response(raw: &[u8]) -> Result<ResponseRecord, ParseError> {
    let (head_end, delimiter_len) = find_head_end(raw).ok_or(ParseError::UnterminatedHead)?;
    let text = String::from_utf8_lossy(&raw[..head_end]);
    let mut lines = split_lines(&text);

    let status_line = lines.next().unwrap_or_default();
    if !status_line.starts_with("HTTP/") || status_line.split_whitespace().count() < 2 {
        return Err(ParseError::MalformedStatusLine(status_line.to_string()));
    }
    let status_line = status_line.to_string();
    let headers = parse_header_lines(lines);

    Ok(ResponseRecord::new(
        status_line,
        headers,
        raw[head_end + delimiter_len..].to_vec(),
    ))
}

/// Locate the end of the header block.
///
/// Returns the offset of the empty line and the length of the delimiter that
/// ends it. Both `\r\n\r\n` and bare `\n\n` are recognised.
pub fn find_head_end(buf: &[u8]) -> Option<(usize, usize)> {
    let crlf = find(buf, b"\r\n\r\n").map(|pos| (pos, 4));
    let lf = find(buf, b"\n\n").map(|pos| (pos, 2));
    match (crlf, lf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split('\n').map(|line| line.strip_suffix('\r').unwrap_or(line))
}

fn parse_header_lines<'a>(lines: impl Iterator<Item = &'a str>) -> Headers {
    let mut headers = Headers::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        headers.insert(name, value.trim());
    }
    headers
}
