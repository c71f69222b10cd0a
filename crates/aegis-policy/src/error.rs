//! Error types for the policy engine.

use thiserror::Error;
use uuid::Uuid;

/// Main error type for policy operations.
#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("invalid policy: {0}")]
    InvalidPolicy(String),

    #[error("policy not found: {0}")]
    NotFound(Uuid),

    #[error("backup engine error: {0}")]
    Backup(#[from] aegis_backup::BackupError),
}

/// Result type alias for policy operations.
pub type Result<T> = std::result::Result<T, PolicyError>;
