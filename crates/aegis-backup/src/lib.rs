//! # Aegis Backup
//!
//! Backup engine for the Aegis disaster-recovery platform.
//!
//! ## Features
//!
//! - **Declarative backup jobs**: per-namespace jobs naming the resource
//!   types to snapshot, on a narrow, validated schedule grammar
//! - **Streaming archives**: gzip(tar) assembly straight to disk through
//!   a hashing tee, so backups never materialize in memory
//! - **Encrypted at rest**: AES-256-CTR with an HMAC-SHA256 tail and
//!   labeled subkey derivation, with an optional fail-closed mode
//! - **Pluggable artifact storage**: byte-addressable backends with
//!   atomic writes; the filesystem backend ships in-tree
//! - **Durable metadata**: write-through persistence of jobs and records
//!   behind authoritative in-memory state, with startup rehydration
//! - **Retention enforcement**: idempotent, per-job pruning of expired
//!   records and their artifacts
//!
//! ## Architecture
//!
//! - [`manager`]: job and record lifecycle, the execution pipeline
//! - [`schedule`]: the schedule grammar and next-run computation
//! - [`archive`]: streaming gzip(tar) assembly with content hashing
//! - [`encryption`]: streaming at-rest encryption envelope
//! - [`storage`]: artifact storage contract and filesystem backend
//! - [`store`]: durable metadata contract, Postgres and in-memory stores
//! - [`config`]: environment-sourced engine configuration
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use aegis_backup::config::EncryptionSettings;
//! use aegis_backup::job::JobSpec;
//! use aegis_backup::manager::BackupManager;
//! use aegis_backup::storage::FilesystemBackend;
//! use aegis_core::mock::MockProvider;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = Arc::new(FilesystemBackend::new("/var/lib/aegis").await?);
//! let manager = BackupManager::new(
//!     Arc::new(MockProvider::new()),
//!     storage,
//!     None,
//!     EncryptionSettings::from_env(),
//! )?;
//!
//! let job = manager
//!     .create_job(JobSpec {
//!         name: "prod-hourly".into(),
//!         namespace: "production".into(),
//!         resource_types: vec!["Deployment".into(), "Service".into()],
//!         schedule: "@hourly".into(),
//!         ..JobSpec::default()
//!     })
//!     .await?;
//!
//! let record = manager.execute_backup(job.id).await?;
//! println!("stored {} resources at {}", record.resource_count, record.storage_path);
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]

pub mod archive;
pub mod config;
pub mod encryption;
pub mod error;
pub mod job;
pub mod manager;
pub mod manifest;
pub mod schedule;
pub mod storage;
pub mod store;

// Re-export main types for convenience
pub use config::EncryptionSettings;
pub use encryption::{ArchiveCipher, MasterKey};
pub use error::{BackupError, EncryptionError, Result, StorageError, StoreError};
pub use job::{BackupJob, BackupRecord, JobSpec, JobStatus, RecordStatus};
pub use manager::{BackupManager, ManagerStatistics};
pub use manifest::BackupManifest;
pub use storage::{create_storage_backend, FilesystemBackend, StorageBackend, StorageConfig};
pub use store::{BackupStore, MemoryStore, PostgresStore};

/// Prelude module for common imports.
pub mod prelude {
    //! Commonly used types and traits.

    pub use crate::config::EncryptionSettings;
    pub use crate::error::{BackupError, Result};
    pub use crate::job::{BackupJob, BackupRecord, JobSpec, JobStatus, RecordStatus};
    pub use crate::manager::BackupManager;
    pub use crate::manifest::BackupManifest;
    pub use crate::storage::{StorageBackend, StorageConfig};
    pub use crate::store::BackupStore;
}
