//! Local-filesystem storage backend.
//!
//! Objects are plain files under a root directory. Writes go through a
//! temp file in the destination directory followed by a rename, so
//! readers never observe a partially written artifact.

use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::{validate_path, StorageBackend};
use crate::error::{StorageError, StorageResult};

/// Filesystem-backed artifact store rooted at a directory.
pub struct FilesystemBackend {
    root: PathBuf,
}

impl FilesystemBackend {
    /// Create the backend, creating the root directory if needed.
    pub async fn new(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    fn resolve(&self, path: &str) -> StorageResult<PathBuf> {
        validate_path(path)?;
        Ok(self.root.join(path))
    }

    async fn prepare_parent(&self, target: &Path) -> StorageResult<PathBuf> {
        let parent = target.parent().unwrap_or(&self.root).to_path_buf();
        tokio::fs::create_dir_all(&parent).await?;
        Ok(parent)
    }

    fn relative_key(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/")
    }
}

#[async_trait]
impl StorageBackend for FilesystemBackend {
    async fn write(&self, path: &str, data: Bytes) -> StorageResult<()> {
        let target = self.resolve(path)?;
        let parent = self.prepare_parent(&target).await?;

        let staging = parent.join(format!(".aegis-write-{}", Uuid::new_v4()));
        tokio::fs::write(&staging, &data)
            .await
            .map_err(|e| StorageError::WriteFailed {
                path: path.to_string(),
                reason: e.to_string(),
            })?;
        tokio::fs::rename(&staging, &target)
            .await
            .map_err(|e| StorageError::WriteFailed {
                path: path.to_string(),
                reason: e.to_string(),
            })
    }

    async fn write_from_file(&self, path: &str, local: &Path) -> StorageResult<()> {
        let target = self.resolve(path)?;
        let parent = self.prepare_parent(&target).await?;

        let staging = parent.join(format!(".aegis-write-{}", Uuid::new_v4()));
        tokio::fs::copy(local, &staging)
            .await
            .map_err(|e| StorageError::WriteFailed {
                path: path.to_string(),
                reason: e.to_string(),
            })?;
        tokio::fs::rename(&staging, &target)
            .await
            .map_err(|e| StorageError::WriteFailed {
                path: path.to_string(),
                reason: e.to_string(),
            })
    }

    async fn read(&self, path: &str) -> StorageResult<Bytes> {
        let target = self.resolve(path)?;
        match tokio::fs::read(&target).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.to_string()))
            }
            Err(e) => Err(StorageError::ReadFailed {
                path: path.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn delete(&self, path: &str) -> StorageResult<()> {
        let target = self.resolve(path)?;
        let meta = match tokio::fs::metadata(&target).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(StorageError::DeleteFailed {
                    path: path.to_string(),
                    reason: e.to_string(),
                })
            }
        };

        let result = if meta.is_dir() {
            tokio::fs::remove_dir_all(&target).await
        } else {
            tokio::fs::remove_file(&target).await
        };
        result.map_err(|e| StorageError::DeleteFailed {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let start = if prefix.is_empty() {
            self.root.clone()
        } else {
            self.resolve(prefix)?
        };

        match tokio::fs::metadata(&start).await {
            Ok(meta) if meta.is_file() => return Ok(vec![self.relative_key(&start)]),
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StorageError::ListFailed {
                    prefix: prefix.to_string(),
                    reason: e.to_string(),
                })
            }
        }

        let mut keys = Vec::new();
        let mut pending = vec![start];
        while let Some(dir) = pending.pop() {
            let mut entries =
                tokio::fs::read_dir(&dir)
                    .await
                    .map_err(|e| StorageError::ListFailed {
                        prefix: prefix.to_string(),
                        reason: e.to_string(),
                    })?;
            while let Some(entry) =
                entries
                    .next_entry()
                    .await
                    .map_err(|e| StorageError::ListFailed {
                        prefix: prefix.to_string(),
                        reason: e.to_string(),
                    })?
            {
                let file_type =
                    entry
                        .file_type()
                        .await
                        .map_err(|e| StorageError::ListFailed {
                            prefix: prefix.to_string(),
                            reason: e.to_string(),
                        })?;
                if file_type.is_dir() {
                    pending.push(entry.path());
                } else {
                    keys.push(self.relative_key(&entry.path()));
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn exists(&self, path: &str) -> StorageResult<bool> {
        let target = self.resolve(path)?;
        Ok(tokio::fs::metadata(&target).await.is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn backend() -> (tempfile::TempDir, FilesystemBackend) {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path()).await.unwrap();
        (dir, backend)
    }

    #[tokio::test]
    async fn write_read_roundtrip() {
        let (_dir, backend) = backend().await;
        backend
            .write("job/rec/archive.tar.gz", Bytes::from_static(b"artifact"))
            .await
            .unwrap();

        let data = backend.read("job/rec/archive.tar.gz").await.unwrap();
        assert_eq!(&data[..], b"artifact");
        assert!(backend.exists("job/rec/archive.tar.gz").await.unwrap());
        assert!(backend.exists("job/rec").await.unwrap());
    }

    #[tokio::test]
    async fn write_from_file_streams_local_artifact() {
        let (_dir, backend) = backend().await;
        let local = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(local.path(), b"streamed payload").unwrap();

        backend
            .write_from_file("job/rec/archive.tar.gz", local.path())
            .await
            .unwrap();
        let data = backend.read("job/rec/archive.tar.gz").await.unwrap();
        assert_eq!(&data[..], b"streamed payload");
    }

    #[tokio::test]
    async fn read_missing_object_is_not_found() {
        let (_dir, backend) = backend().await;
        let err = backend.read("nope").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_is_recursive_and_idempotent() {
        let (_dir, backend) = backend().await;
        backend.write("job/a/x", Bytes::from_static(b"1")).await.unwrap();
        backend.write("job/a/y", Bytes::from_static(b"2")).await.unwrap();

        backend.delete("job/a").await.unwrap();
        assert!(!backend.exists("job/a/x").await.unwrap());
        assert!(!backend.exists("job/a").await.unwrap());
        // Deleting again is a no-op.
        backend.delete("job/a").await.unwrap();
    }

    #[tokio::test]
    async fn list_returns_sorted_relative_paths() {
        let (_dir, backend) = backend().await;
        backend.write("job/b/2", Bytes::from_static(b"x")).await.unwrap();
        backend.write("job/a/1", Bytes::from_static(b"x")).await.unwrap();
        backend.write("job/a/0", Bytes::from_static(b"x")).await.unwrap();

        let keys = backend.list("job").await.unwrap();
        assert_eq!(keys, vec!["job/a/0", "job/a/1", "job/b/2"]);

        let empty = backend.list("missing").await.unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn traversal_is_rejected() {
        let (_dir, backend) = backend().await;
        let err = backend
            .write("../escape", Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidPath { .. }));
        assert!(backend.read("/abs").await.is_err());
    }
}
