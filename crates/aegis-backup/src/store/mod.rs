//! Durable metadata persistence for jobs and records.
//!
//! The store is a write-through, crash-recovery substrate behind the
//! manager's in-memory state, never the source of truth during a process
//! lifetime. Save operations are upserts keyed by id.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreResult;
use crate::job::{BackupJob, BackupRecord};

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// Contract for durable job and record metadata.
#[async_trait]
pub trait BackupStore: Send + Sync {
    /// Insert or update a job.
    async fn save_job(&self, job: &BackupJob) -> StoreResult<()>;

    /// Fetch a job by id.
    async fn get_job(&self, id: Uuid) -> StoreResult<Option<BackupJob>>;

    /// All jobs, newest first by creation time.
    async fn list_jobs(&self) -> StoreResult<Vec<BackupJob>>;

    /// Insert or update a record.
    async fn save_record(&self, record: &BackupRecord) -> StoreResult<()>;

    /// Fetch a record by id.
    async fn get_record(&self, id: Uuid) -> StoreResult<Option<BackupRecord>>;

    /// A job's records, newest first by start time.
    async fn list_records_by_job(&self, job_id: Uuid) -> StoreResult<Vec<BackupRecord>>;

    /// All records, newest first by start time.
    async fn list_all_records(&self) -> StoreResult<Vec<BackupRecord>>;

    /// Delete a record. Deleting a missing record is a no-op.
    async fn delete_record(&self, id: Uuid) -> StoreResult<()>;
}
