//! Storage backend abstraction for backup artifacts.
//!
//! A backend is a byte-addressable blob store with atomic writes,
//! streaming publication from a local file, prefix listing and recursive
//! deletion. Paths are forward-slash-separated, relative, and may not
//! escape the backend root; violations are rejected before any I/O.

pub mod filesystem;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{StorageError, StorageResult};

pub use filesystem::FilesystemBackend;

/// Storage backend configuration.
///
/// Cloud backends (S3, GCS, ...) plug in behind the same contract; the
/// filesystem variant is the one that ships with the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StorageConfig {
    Filesystem { root: PathBuf },
}

/// Contract every artifact store must satisfy.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Atomically replace the object at `path` with `data`.
    async fn write(&self, path: &str, data: Bytes) -> StorageResult<()>;

    /// Publish the local file at `local` to `path`.
    ///
    /// Semantics are identical to [`write`](Self::write) but the payload
    /// is streamed from disk and never buffered in memory.
    async fn write_from_file(&self, path: &str, local: &Path) -> StorageResult<()>;

    /// Read the object at `path`.
    async fn read(&self, path: &str) -> StorageResult<Bytes>;

    /// Recursively delete `path`; removing a prefix removes every
    /// contained artifact. Deleting a missing path is a no-op.
    async fn delete(&self, path: &str) -> StorageResult<()>;

    /// List object paths under `prefix`, relative to the backend root and
    /// sorted lexicographically.
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Check whether an object or prefix exists at `path`.
    async fn exists(&self, path: &str) -> StorageResult<bool>;
}

/// Create a storage backend from configuration.
pub async fn create_storage_backend(
    config: StorageConfig,
) -> StorageResult<Arc<dyn StorageBackend>> {
    match config {
        StorageConfig::Filesystem { root } => Ok(Arc::new(FilesystemBackend::new(root).await?)),
    }
}

/// Reject absolute paths, parent traversal and backslash separators.
pub(crate) fn validate_path(path: &str) -> StorageResult<()> {
    let reject = |reason: &str| StorageError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    if path.is_empty() {
        return Err(reject("path is empty"));
    }
    if path.starts_with('/') {
        return Err(reject("absolute paths are not allowed"));
    }
    if path.contains('\\') {
        return Err(reject("backslash separators are not allowed"));
    }
    if path.split('/').any(|segment| segment == "..") {
        return Err(reject("parent traversal is not allowed"));
    }
    if path.split('/').any(|segment| segment.is_empty()) {
        return Err(reject("empty path segments are not allowed"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_discipline() {
        assert!(validate_path("jobs/rec/archive.tar.gz").is_ok());
        assert!(validate_path("a").is_ok());

        assert!(validate_path("").is_err());
        assert!(validate_path("/etc/passwd").is_err());
        assert!(validate_path("a/../b").is_err());
        assert!(validate_path("..").is_err());
        assert!(validate_path("a//b").is_err());
        assert!(validate_path("a\\b").is_err());
    }
}
