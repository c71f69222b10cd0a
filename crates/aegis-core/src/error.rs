//! Error types for the core Kubernetes contract.

use thiserror::Error;

/// Errors surfaced by the Kubernetes capability contract.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("provider error: {0}")]
    Provider(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("unknown resource kind: {0}")]
    UnknownKind(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for core operations.
pub type CoreResult<T> = std::result::Result<T, CoreError>;
