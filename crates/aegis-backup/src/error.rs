//! Error types for the Aegis backup engine.

use thiserror::Error;
use uuid::Uuid;

/// Main error type for backup operations.
#[derive(Error, Debug)]
pub enum BackupError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid schedule {expr:?}: {reason}")]
    InvalidSchedule { expr: String, reason: String },

    #[error("backup job not found: {0}")]
    JobNotFound(Uuid),

    #[error("backup record not found: {0}")]
    RecordNotFound(Uuid),

    #[error("manifest not found for record {0}")]
    ManifestNotFound(Uuid),

    #[error("resource collection failed: {0}")]
    Collection(String),

    #[error("archive assembly failed: {0}")]
    Archive(String),

    #[error("encryption required but no valid key is loaded")]
    EncryptionRequired,

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("encryption error: {0}")]
    Encryption(#[from] EncryptionError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("provider error: {0}")]
    Provider(#[from] aegis_core::CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Storage backend specific errors.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("write failed for {path}: {reason}")]
    WriteFailed { path: String, reason: String },

    #[error("read failed for {path}: {reason}")]
    ReadFailed { path: String, reason: String },

    #[error("delete failed for {path}: {reason}")]
    DeleteFailed { path: String, reason: String },

    #[error("list failed for {prefix}: {reason}")]
    ListFailed { prefix: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Encryption related errors.
#[derive(Error, Debug)]
pub enum EncryptionError {
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("authentication tag mismatch")]
    AuthenticationFailed,

    #[error("truncated artifact: {0} bytes is below the minimum envelope size")]
    Truncated(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Durable metadata store errors.
///
/// Store failures are never user-visible from manager operations; the
/// manager logs them at warning level and keeps its in-memory state
/// authoritative.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt row: {0}")]
    CorruptRow(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for backup operations.
pub type Result<T> = std::result::Result<T, BackupError>;

/// Result type alias for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Result type alias for encryption operations.
pub type EncryptionResult<T> = std::result::Result<T, EncryptionError>;

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
