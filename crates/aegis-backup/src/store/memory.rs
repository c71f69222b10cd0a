//! In-memory store for tests and store-less deployments.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::BackupStore;
use crate::error::StoreResult;
use crate::job::{BackupJob, BackupRecord};

/// A [`BackupStore`] held entirely in memory, with the same ordering
/// semantics as the relational implementation.
#[derive(Default)]
pub struct MemoryStore {
    jobs: RwLock<HashMap<Uuid, BackupJob>>,
    records: RwLock<HashMap<Uuid, BackupRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BackupStore for MemoryStore {
    async fn save_job(&self, job: &BackupJob) -> StoreResult<()> {
        self.jobs.write().await.insert(job.id, job.clone());
        Ok(())
    }

    async fn get_job(&self, id: Uuid) -> StoreResult<Option<BackupJob>> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn list_jobs(&self) -> StoreResult<Vec<BackupJob>> {
        let mut jobs: Vec<BackupJob> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    async fn save_record(&self, record: &BackupRecord) -> StoreResult<()> {
        self.records.write().await.insert(record.id, record.clone());
        Ok(())
    }

    async fn get_record(&self, id: Uuid) -> StoreResult<Option<BackupRecord>> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn list_records_by_job(&self, job_id: Uuid) -> StoreResult<Vec<BackupRecord>> {
        let mut records: Vec<BackupRecord> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.job_id == job_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(records)
    }

    async fn list_all_records(&self) -> StoreResult<Vec<BackupRecord>> {
        let mut records: Vec<BackupRecord> =
            self.records.read().await.values().cloned().collect();
        records.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(records)
    }

    async fn delete_record(&self, id: Uuid) -> StoreResult<()> {
        self.records.write().await.remove(&id);
        Ok(())
    }
}
