//! Cache key derivation.

use std::fmt;

use sha2::{Digest, Sha256};

/// Digest identifying a `(method, origin URL)` pair.
///
/// Lowercase hex SHA-256 of `"<METHOD>:<URL>"`, stable across process runs
/// and safe to use as a file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(method: &str, origin_url: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(method.as_bytes());
        hasher.update(b":");
        hasher.update(origin_url.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Accept an already computed key, e.g. a file stem read back from disk.
    ///
    /// Returns `None` unless `raw` is 64 lowercase hex characters.
    pub fn parse(raw: &str) -> Option<Self> {
        let valid = raw.len() == 64 && raw.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        valid.then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
