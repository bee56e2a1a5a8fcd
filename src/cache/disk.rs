//! Filesystem-backed cache store.
//!
//! One JSON document per key at `<dir>/<key>.json`. Writes go to a temporary
//! file in the same directory and are renamed into place, so readers see
//! either the previous entry or the new one.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::cache::{CacheError, CacheKey, CacheStore};
use crate::http::ResponseRecord;
use crate::observability::metrics;

const ENTRY_EXTENSION: &str = "json";
const TEMP_PREFIX: &str = ".tmp-";

/// Cache entries stored as files under a single directory.
#[derive(Debug, Clone)]
pub struct DiskStore {
    dir: PathBuf,
}

impl DiskStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Location of the entry for `key`.
    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.{}", key, ENTRY_EXTENSION))
    }

    /// Keys of all entries currently on disk, sorted.
    pub async fn keys(&self) -> Result<Vec<CacheKey>, CacheError> {
        let mut keys = Vec::new();
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(keys),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            if let Some(key) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(CacheKey::parse)
            {
                keys.push(key);
            }
        }

        keys.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(keys)
    }
}

impl CacheStore for DiskStore {
    async fn get(&self, key: &CacheKey) -> Option<ResponseRecord> {
        let path = self.entry_path(key);
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to read cache entry");
                return None;
            }
        };

        match serde_json::from_slice(&data) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(key = %key, path = ?path, error = %e, "Corrupt cache entry, treating as miss");
                metrics::record_cache_event("corrupt");
                None
            }
        }
    }

    async fn put(&self, key: &CacheKey, record: &ResponseRecord) -> Result<(), CacheError> {
        let encoded = serde_json::to_vec(record)?;
        let dir = self.dir.clone();
        let target = self.entry_path(key);

        tokio::task::spawn_blocking(move || write_atomic(&dir, &target, &encoded))
            .await
            .map_err(|e| CacheError::Worker(e.to_string()))??;

        tracing::debug!(key = %key, "Cache entry stored");
        Ok(())
    }

    async fn clear(&self) -> Result<usize, CacheError> {
        let dir = self.dir.clone();
        let removed = tokio::task::spawn_blocking(move || remove_entries(&dir))
            .await
            .map_err(|e| CacheError::Worker(e.to_string()))??;

        tracing::info!(dir = ?self.dir, removed, "Cache cleared");
        Ok(removed)
    }
}

fn write_atomic(dir: &Path, target: &Path, contents: &[u8]) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let mut file = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(dir)?;
    file.write_all(contents)?;
    file.as_file().sync_data()?;
    persist(file, target)
}

fn persist(file: NamedTempFile, target: &Path) -> std::io::Result<()> {
    file.persist(target).map(|_| ()).map_err(|e| e.error)
}

fn remove_entries(dir: &Path) -> std::io::Result<usize> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let mut removed = 0;
    for entry in entries {
        let path = entry?.path();
        let is_entry = path.extension().and_then(|ext| ext.to_str()) == Some(ENTRY_EXTENSION);
        let is_stale_temp = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(TEMP_PREFIX));
        if !is_entry && !is_stale_temp {
            continue;
        }

        match std::fs::remove_file(&path) {
            Ok(()) if is_entry => removed += 1,
            Ok(()) => {}
            // Raced with another clear.
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    Ok(removed)
}
