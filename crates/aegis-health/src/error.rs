//! Error types for the health checker.

use thiserror::Error;

/// Main error type for health operations.
#[derive(Error, Debug)]
pub enum HealthError {
    #[error("provider error: {0}")]
    Provider(#[from] aegis_core::CoreError),
}

/// Result type alias for health operations.
pub type Result<T> = std::result::Result<T, HealthError>;
