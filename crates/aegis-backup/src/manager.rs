//! Backup manager: job lifecycle, execution, retention and rehydration.
//!
//! The manager owns all job and record mutations. In-memory state is
//! authoritative for the process lifetime; the optional store is a
//! write-through crash-recovery substrate whose failures are logged and
//! never fail the enclosing operation.
//!
//! Locking discipline: the reader-writer locks guard the maps only. Every
//! operation copies what it needs under the lock, releases it, and then
//! performs Kubernetes, archive, crypto and storage I/O lock-free.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use aegis_core::KubernetesProvider;

use crate::archive;
use crate::config::{EncryptionSettings, DEFAULT_RETENTION_DAYS, DEFAULT_STORAGE_LOCATION};
use crate::encryption::ArchiveCipher;
use crate::error::{BackupError, Result, StorageError};
use crate::job::{BackupJob, BackupRecord, JobSpec, JobStatus, RecordStatus};
use crate::manifest::{BackupManifest, MANIFEST_FILE_NAME};
use crate::schedule;
use crate::storage::StorageBackend;
use crate::store::BackupStore;

/// Aggregate counters over the manager's current state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerStatistics {
    pub total_jobs: usize,
    pub active_jobs: usize,
    pub total_records: usize,
    pub running_records: usize,
    pub completed_records: usize,
    pub failed_records: usize,
    pub stored_bytes: u64,
}

/// The backup engine.
pub struct BackupManager {
    provider: Arc<dyn KubernetesProvider>,
    storage: Arc<dyn StorageBackend>,
    store: Option<Arc<dyn BackupStore>>,
    cipher: Option<Arc<ArchiveCipher>>,
    encryption_required: bool,
    jobs: RwLock<HashMap<Uuid, BackupJob>>,
    records: RwLock<Vec<BackupRecord>>,
}

impl BackupManager {
    /// Create a manager with explicit encryption settings.
    pub fn new(
        provider: Arc<dyn KubernetesProvider>,
        storage: Arc<dyn StorageBackend>,
        store: Option<Arc<dyn BackupStore>>,
        encryption: EncryptionSettings,
    ) -> Result<Self> {
        let cipher = match &encryption.key {
            Some(key) => Some(Arc::new(ArchiveCipher::new(key)?)),
            None => {
                if encryption.required {
                    warn!(
                        "fail-closed encryption is enabled without a valid key; \
                         backup executions will fail until one is configured"
                    );
                }
                None
            }
        };

        Ok(Self {
            provider,
            storage,
            store,
            cipher,
            encryption_required: encryption.required,
            jobs: RwLock::new(HashMap::new()),
            records: RwLock::new(Vec::new()),
        })
    }

    /// Create a manager with encryption settings read once from the
    /// process environment.
    pub fn from_env(
        provider: Arc<dyn KubernetesProvider>,
        storage: Arc<dyn StorageBackend>,
        store: Option<Arc<dyn BackupStore>>,
    ) -> Result<Self> {
        Self::new(provider, storage, store, EncryptionSettings::from_env())
    }

    /// Create a job from an operator template.
    ///
    /// Name, namespace, resource types and schedule are required; the
    /// schedule must parse under the engine grammar or the job is not
    /// created. Retention, storage location and status fall back to
    /// engine defaults.
    pub async fn create_job(&self, spec: JobSpec) -> Result<BackupJob> {
        if spec.name.trim().is_empty() {
            return Err(BackupError::InvalidArgument("job name is required".into()));
        }
        if spec.namespace.trim().is_empty() {
            return Err(BackupError::InvalidArgument("namespace is required".into()));
        }
        if spec.resource_types.is_empty() {
            return Err(BackupError::InvalidArgument(
                "at least one resource type is required".into(),
            ));
        }
        if spec.resource_types.iter().any(|t| t.trim().is_empty()) {
            return Err(BackupError::InvalidArgument(
                "resource types must be non-empty strings".into(),
            ));
        }
        if spec.schedule.trim().is_empty() {
            return Err(BackupError::InvalidArgument("schedule is required".into()));
        }
        if spec.retention_days == Some(0) {
            return Err(BackupError::InvalidArgument(
                "retention_days must be greater than zero".into(),
            ));
        }

        let now = Utc::now();
        let next_run = schedule::next_run(&spec.schedule, now)?;

        let job = BackupJob {
            id: Uuid::new_v4(),
            name: spec.name,
            namespace: spec.namespace,
            resource_types: spec.resource_types,
            schedule: spec.schedule,
            retention_days: spec.retention_days.unwrap_or(DEFAULT_RETENTION_DAYS),
            storage_location: spec
                .storage_location
                .unwrap_or_else(|| DEFAULT_STORAGE_LOCATION.to_string()),
            status: spec.status.unwrap_or(JobStatus::Active),
            last_run: None,
            next_run: Some(next_run),
            created_at: now,
        };

        self.jobs.write().await.insert(job.id, job.clone());
        self.persist_job(&job).await;

        info!(job = %job.name, namespace = %job.namespace, "created backup job");
        Ok(job)
    }

    /// Fetch a snapshot copy of a job.
    pub async fn get_job(&self, job_id: Uuid) -> Result<BackupJob> {
        self.jobs
            .read()
            .await
            .get(&job_id)
            .cloned()
            .ok_or(BackupError::JobNotFound(job_id))
    }

    /// Snapshot copies of all jobs.
    pub async fn list_jobs(&self) -> Vec<BackupJob> {
        let mut jobs: Vec<BackupJob> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        jobs
    }

    /// Pause a job; paused jobs are skipped by the due-job query.
    pub async fn pause_job(&self, job_id: Uuid) -> Result<BackupJob> {
        self.set_job_status(job_id, JobStatus::Paused).await
    }

    /// Return a paused or disabled job to active duty.
    pub async fn resume_job(&self, job_id: Uuid) -> Result<BackupJob> {
        self.set_job_status(job_id, JobStatus::Active).await
    }

    /// Execute a backup for a job and return the terminal record.
    ///
    /// Collection failures for individual resource types are accumulated:
    /// if anything was captured the record completes with a
    /// `partial errors:` message; if nothing was captured and errors
    /// occurred the record fails. Archive, encryption and primary storage
    /// failures always fail the record. The record is registered (status
    /// `running`) before any I/O, so a crash or cancellation mid-flight
    /// leaves an operator-visible in-flight record.
    pub async fn execute_backup(&self, job_id: Uuid) -> Result<BackupRecord> {
        // Snapshot under the read lock; everything after is lock-free I/O.
        let job = {
            let jobs = self.jobs.read().await;
            jobs.get(&job_id)
                .cloned()
                .ok_or(BackupError::JobNotFound(job_id))?
        };

        let record = BackupRecord::running(job_id);
        let record_id = record.id;
        self.records.write().await.push(record.clone());
        self.persist_record(&record).await;

        debug!(job = %job.name, record = %record_id, "starting backup execution");

        let mut resources = Vec::new();
        let mut errors = Vec::new();
        for resource_type in &job.resource_types {
            match self
                .provider
                .list_resources(resource_type, &job.namespace)
                .await
            {
                Ok(mut listed) => resources.append(&mut listed),
                Err(e) => errors.push(format!("failed to list {}: {}", resource_type, e)),
            }
        }

        if resources.is_empty() && !errors.is_empty() {
            let message = errors.join("; ");
            self.fail_record(record_id, message.clone()).await;
            return Err(BackupError::Collection(message));
        }

        let manifest = BackupManifest::new(
            record_id,
            job.id,
            job.namespace.clone(),
            job.resource_types.clone(),
            resources,
        );
        let resource_count = manifest.resource_count;

        // Stream the archive to a 0600 temp file; the checksum is taken
        // over the compressed bytes by a tee inside the builder.
        let built = tokio::task::spawn_blocking(
            move || -> Result<(NamedTempFile, BackupManifest, String)> {
                let tmp = NamedTempFile::new()?;
                let (checksum, _) = archive::build_archive(&manifest, tmp.path())?;
                Ok((tmp, manifest, checksum))
            },
        )
        .await?;
        let (plain, mut manifest, checksum) = match built {
            Ok(v) => v,
            Err(e) => {
                self.fail_record(record_id, e.to_string()).await;
                return Err(e);
            }
        };

        // Fail closed: never store plaintext when a key is mandated but
        // absent. The temp file guard removes the archive on drop.
        if self.encryption_required && self.cipher.is_none() {
            drop(plain);
            let err = BackupError::EncryptionRequired;
            self.fail_record(record_id, err.to_string()).await;
            return Err(err);
        }

        let artifact = match &self.cipher {
            Some(cipher) => {
                let cipher = Arc::clone(cipher);
                let encrypted =
                    tokio::task::spawn_blocking(move || -> Result<NamedTempFile> {
                        let enc = NamedTempFile::new()?;
                        cipher.encrypt_file(plain.path(), enc.path())?;
                        Ok(enc)
                    })
                    .await?;
                match encrypted {
                    Ok(enc) => enc,
                    Err(e) => {
                        self.fail_record(record_id, e.to_string()).await;
                        return Err(e);
                    }
                }
            }
            None => plain,
        };

        let prefix = format!("{}/{}", job.id, record_id);
        let archive_path = format!("{}/{}.tar.gz", prefix, record_id);
        if let Err(e) = self
            .storage
            .write_from_file(&archive_path, artifact.path())
            .await
        {
            self.fail_record(record_id, format!("storage write failed: {}", e))
                .await;
            return Err(BackupError::Storage(e));
        }

        // Plaintext manifest sidecar beside the archive; it indexes the
        // same content the archive holds, so a failure here is logged but
        // does not fail the backup.
        manifest.checksum = checksum;
        match serde_json::to_vec_pretty(&manifest) {
            Ok(bytes) => {
                let manifest_path = format!("{}/{}", prefix, MANIFEST_FILE_NAME);
                if let Err(error) = self.storage.write(&manifest_path, Bytes::from(bytes)).await
                {
                    warn!(record = %record_id, %error, "failed to write manifest sidecar");
                }
            }
            Err(error) => {
                warn!(record = %record_id, %error, "failed to serialize manifest sidecar")
            }
        }

        let size_bytes = match tokio::fs::metadata(artifact.path()).await {
            Ok(meta) => meta.len(),
            Err(error) => {
                warn!(record = %record_id, %error, "failed to stat stored artifact");
                0
            }
        };

        let error_message = if errors.is_empty() {
            None
        } else {
            Some(format!("partial errors: {}", errors.join("; ")))
        };
        let record = self
            .update_record(record_id, |r| {
                r.complete(
                    size_bytes,
                    resource_count,
                    archive_path.clone(),
                    error_message.clone(),
                )
            })
            .await
            .ok_or(BackupError::RecordNotFound(record_id))?;

        // Update the owning job under the write lock, then hand both
        // values to a background task for persistence.
        let now = Utc::now();
        let updated_job = {
            let mut jobs = self.jobs.write().await;
            jobs.get_mut(&job_id).map(|j| {
                j.last_run = Some(now);
                j.next_run = schedule::next_run(&j.schedule, now).ok();
                j.clone()
            })
        };

        if let Some(store) = &self.store {
            let store = Arc::clone(store);
            let record = record.clone();
            tokio::spawn(async move {
                if let Some(job) = updated_job {
                    if let Err(error) = store.save_job(&job).await {
                        warn!(job = %job.id, %error, "failed to persist job after execution");
                    }
                }
                if let Err(error) = store.save_record(&record).await {
                    warn!(record = %record.id, %error, "failed to persist record after execution");
                }
            });
        }

        info!(
            job = %job.name,
            record = %record_id,
            resources = resource_count,
            size_bytes,
            "backup completed"
        );
        Ok(record)
    }

    /// Snapshot copies of a job's records, in execution-start order.
    pub async fn list_backups(&self, job_id: Uuid) -> Result<Vec<BackupRecord>> {
        if !self.jobs.read().await.contains_key(&job_id) {
            return Err(BackupError::JobNotFound(job_id));
        }
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.job_id == job_id)
            .cloned()
            .collect())
    }

    /// Snapshot copies of every record.
    pub async fn list_all_backups(&self) -> Vec<BackupRecord> {
        self.records.read().await.clone()
    }

    /// Fetch a snapshot copy of a record.
    pub async fn get_backup_record(&self, record_id: Uuid) -> Result<BackupRecord> {
        self.records
            .read()
            .await
            .iter()
            .find(|r| r.id == record_id)
            .cloned()
            .ok_or(BackupError::RecordNotFound(record_id))
    }

    /// Delete a record's metadata and best-effort delete its artifacts.
    pub async fn delete_backup(&self, record_id: Uuid) -> Result<()> {
        let record = {
            let mut records = self.records.write().await;
            let idx = records
                .iter()
                .position(|r| r.id == record_id)
                .ok_or(BackupError::RecordNotFound(record_id))?;
            records.remove(idx)
        };

        let prefix = format!("{}/{}", record.job_id, record.id);
        if let Err(error) = self.storage.delete(&prefix).await {
            warn!(record = %record_id, %error, "failed to delete backup artifacts");
        }
        if let Some(store) = &self.store {
            if let Err(error) = store.delete_record(record_id).await {
                warn!(record = %record_id, %error, "failed to delete record from store");
            }
        }
        Ok(())
    }

    /// Active jobs whose next run is due.
    ///
    /// Scheduling is best-effort wall clock; callers drive execution.
    pub async fn schedule_backups(&self) -> Vec<BackupJob> {
        let now = Utc::now();
        self.jobs
            .read()
            .await
            .values()
            .filter(|j| {
                j.status == JobStatus::Active
                    && j.next_run.map(|next| next <= now).unwrap_or(false)
            })
            .cloned()
            .collect()
    }

    /// Delete a job's records older than its retention window.
    ///
    /// Idempotent; a second sweep immediately after the first deletes
    /// nothing. Returns the number of records removed.
    pub async fn enforce_retention(&self, job_id: Uuid) -> Result<usize> {
        let retention_days = {
            let jobs = self.jobs.read().await;
            jobs.get(&job_id)
                .map(|j| j.retention_days)
                .ok_or(BackupError::JobNotFound(job_id))?
        };
        let cutoff = Utc::now() - Duration::days(retention_days as i64);

        let expired: Vec<BackupRecord> = {
            let mut records = self.records.write().await;
            let mut expired = Vec::new();
            records.retain(|r| {
                let gone = r.job_id == job_id
                    && r.completed_at.map(|c| c < cutoff).unwrap_or(false);
                if gone {
                    expired.push(r.clone());
                }
                !gone
            });
            expired
        };

        for record in &expired {
            let prefix = format!("{}/{}", job_id, record.id);
            if let Err(error) = self.storage.delete(&prefix).await {
                warn!(record = %record.id, %error, "failed to delete expired artifacts");
            }
            if let Some(store) = &self.store {
                if let Err(error) = store.delete_record(record.id).await {
                    warn!(record = %record.id, %error, "failed to delete expired record from store");
                }
            }
        }

        if !expired.is_empty() {
            info!(job = %job_id, deleted = expired.len(), "retention enforced");
        }
        Ok(expired.len())
    }

    /// Read and parse the plaintext manifest sidecar for a record.
    pub async fn load_manifest(&self, record_id: Uuid) -> Result<BackupManifest> {
        let record = self.get_backup_record(record_id).await?;
        let path = format!("{}/{}/{}", record.job_id, record.id, MANIFEST_FILE_NAME);
        let bytes = match self.storage.read(&path).await {
            Ok(bytes) => bytes,
            Err(StorageError::NotFound(_)) => {
                return Err(BackupError::ManifestNotFound(record_id))
            }
            Err(e) => return Err(BackupError::Storage(e)),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Rebuild in-memory state from the durable store.
    ///
    /// Idempotent; replaces both caches wholesale. Records that were left
    /// `running` by a crashed process are rehydrated verbatim and never
    /// auto-expired; they remain operator-visible until resolved.
    pub async fn load_from_store(&self) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };

        let jobs = store.list_jobs().await?;
        let mut records = store.list_all_records().await?;
        // The store returns newest-first; in memory, records are kept in
        // execution-start order.
        records.sort_by(|a, b| a.started_at.cmp(&b.started_at).then(a.id.cmp(&b.id)));

        {
            let mut map = self.jobs.write().await;
            map.clear();
            for job in jobs {
                map.insert(job.id, job);
            }
        }
        *self.records.write().await = records;

        debug!("manager state rehydrated from store");
        Ok(())
    }

    /// Total stored bytes across a job's completed records.
    pub async fn storage_usage(&self, job_id: Uuid) -> Result<u64> {
        if !self.jobs.read().await.contains_key(&job_id) {
            return Err(BackupError::JobNotFound(job_id));
        }
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.job_id == job_id && r.status == RecordStatus::Completed)
            .map(|r| r.size_bytes)
            .sum())
    }

    /// Aggregate counters over jobs and records.
    pub async fn statistics(&self) -> ManagerStatistics {
        let jobs = self.jobs.read().await;
        let records = self.records.read().await;

        ManagerStatistics {
            total_jobs: jobs.len(),
            active_jobs: jobs
                .values()
                .filter(|j| j.status == JobStatus::Active)
                .count(),
            total_records: records.len(),
            running_records: records
                .iter()
                .filter(|r| r.status == RecordStatus::Running)
                .count(),
            completed_records: records
                .iter()
                .filter(|r| r.status == RecordStatus::Completed)
                .count(),
            failed_records: records
                .iter()
                .filter(|r| r.status == RecordStatus::Failed)
                .count(),
            stored_bytes: records
                .iter()
                .filter(|r| r.status == RecordStatus::Completed)
                .map(|r| r.size_bytes)
                .sum(),
        }
    }

    async fn set_job_status(&self, job_id: Uuid, status: JobStatus) -> Result<BackupJob> {
        let job = {
            let mut jobs = self.jobs.write().await;
            let job = jobs
                .get_mut(&job_id)
                .ok_or(BackupError::JobNotFound(job_id))?;
            job.status = status;
            job.clone()
        };
        self.persist_job(&job).await;
        Ok(job)
    }

    async fn update_record<F>(&self, record_id: Uuid, mutate: F) -> Option<BackupRecord>
    where
        F: FnOnce(&mut BackupRecord),
    {
        let mut records = self.records.write().await;
        let record = records.iter_mut().find(|r| r.id == record_id)?;
        mutate(record);
        Some(record.clone())
    }

    async fn fail_record(&self, record_id: Uuid, message: String) -> Option<BackupRecord> {
        let record = self.update_record(record_id, |r| r.fail(message)).await;
        if let Some(record) = &record {
            self.persist_record(record).await;
        }
        record
    }

    async fn persist_job(&self, job: &BackupJob) {
        if let Some(store) = &self.store {
            if let Err(error) = store.save_job(job).await {
                warn!(job = %job.id, %error, "failed to persist job");
            }
        }
    }

    async fn persist_record(&self, record: &BackupRecord) {
        if let Some(store) = &self.store {
            if let Err(error) = store.save_record(record).await {
                warn!(record = %record.id, %error, "failed to persist record");
            }
        }
    }
}
