//! Structured HTTP messages shared by the parser, cache, origin client and writer.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Name of the outbound-only header that tells the client whether the
/// response came from the cache.
pub const X_CACHE: &str = "X-Cache";

/// Insertion-ordered header mapping.
///
/// Names are matched ASCII case-insensitively. Inserting a name that already
/// exists replaces the earlier entry in place, so the last value wins while
/// the original position is preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name` to `value`, overwriting any earlier entry with the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(idx) => self.entries[idx] = (name, value),
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|idx| self.entries[idx].1.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Iterate over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

// Serialized as a JSON object; entry order follows insertion order.
impl Serialize for Headers {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Headers {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct HeadersVisitor;

        impl<'de> Visitor<'de> for HeadersVisitor {
            type Value = Headers;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of header names to values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Headers, A::Error> {
                let mut headers = Headers::new();
                while let Some((name, value)) = access.next_entry::<String, String>()? {
                    headers.insert(name, value);
                }
                Ok(headers)
            }
        }

        deserializer.deserialize_map(HeadersVisitor)
    }
}

/// A parsed client request head.
///
/// The body is never read off the wire; only the request line and the
/// header block are consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    /// Path and query exactly as received. Always starts with `/`.
    pub target: String,
    pub version: String,
    pub headers: Headers,
}

/// A captured HTTP response: status line, headers and raw body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseRecord {
    /// Full status line text, e.g. `HTTP/1.1 200 OK`.
    #[serde(rename = "status")]
    pub status_line: String,
    pub headers: Headers,
    #[serde(with = "base64_body")]
    pub body: Vec<u8>,
}

impl ResponseRecord {
    pub fn new(status_line: impl Into<String>, headers: Headers, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status_line: status_line.into(),
            headers,
            body: body.into(),
        }
    }

    /// The numeric status code from the status line, if it has one.
    pub fn status_code(&self) -> Option<u16> {
        self.status_line
            .split_whitespace()
            .nth(1)
            .and_then(|code| code.parse().ok())
    }

    /// Copy of this record annotated with the proxy-status header.
    pub fn annotated(&self, cache_status: CacheStatus) -> Self {
        let mut outbound = self.clone();
        outbound.headers.insert(X_CACHE, cache_status.as_str());
        outbound
    }
}

/// Value carried by the [`X_CACHE`] header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

mod base64_body {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_last_write_wins_in_original_position() {
        let mut headers = Headers::new();
        headers.insert("Accept", "*/*");
        headers.insert("Host", "example.test");
        headers.insert("accept", "application/json");

        let pairs: Vec<_> = headers.iter().collect();
        assert_eq!(pairs, vec![("accept", "application/json"), ("Host", "example.test")]);
        assert_eq!(headers.get("ACCEPT"), Some("application/json"));
    }

    #[test]
    fn annotation_does_not_touch_original() {
        let record = ResponseRecord::new("HTTP/1.1 200 OK", Headers::new(), b"ok".to_vec());
        let outbound = record.annotated(CacheStatus::Miss);

        assert_eq!(outbound.headers.get(X_CACHE), Some("MISS"));
        assert!(!record.headers.contains(X_CACHE));
    }

    #[test]
    fn annotation_overwrites_upstream_value() {
        let headers: Headers = [("x-cache", "HIT from upstream")].into_iter().collect();
        let record = ResponseRecord::new("HTTP/1.1 200 OK", headers, Vec::new());

        let outbound = record.annotated(CacheStatus::Miss);
        assert_eq!(outbound.headers.len(), 1);
        assert_eq!(outbound.headers.get("X-Cache"), Some("MISS"));
    }

    #[test]
    fn record_json_keeps_header_order_and_binary_body() {
        let headers: Headers = [("Content-Type", "image/png"), ("ETag", "\"abc\""), ("Age", "3")]
            .into_iter()
            .collect();
        let record = ResponseRecord::new("HTTP/1.1 200 OK", headers, vec![0x89, 0x50, 0x00, 0xff]);

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"status\":\"HTTP/1.1 200 OK\""));

        let decoded: ResponseRecord = serde_json::from_str(&json).unwrap();
        let names: Vec<_> = decoded.headers.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["Content-Type", "ETag", "Age"]);
        assert_eq!(decoded.body, vec![0x89, 0x50, 0x00, 0xff]);
    }

    #[test]
    fn status_code_from_status_line() {
        let record = ResponseRecord::new("HTTP/1.1 404 Not Found", Headers::new(), Vec::new());
        assert_eq!(record.status_code(), Some(404));

        let garbled = ResponseRecord::new("nonsense", Headers::new(), Vec::new());
        assert_eq!(garbled.status_code(), None);
    }
}
