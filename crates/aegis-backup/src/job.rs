//! Backup job and record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Lifecycle status of a backup job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Active,
    Paused,
    Disabled,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Active => f.write_str("active"),
            JobStatus::Paused => f.write_str("paused"),
            JobStatus::Disabled => f.write_str("disabled"),
        }
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "active" => Ok(JobStatus::Active),
            "paused" => Ok(JobStatus::Paused),
            "disabled" => Ok(JobStatus::Disabled),
            other => Err(format!("unknown job status: {}", other)),
        }
    }
}

/// A declarative backup job: what to snapshot, from where, on what cadence.
///
/// Jobs are created by operators and mutated only by the backup manager,
/// which owns `last_run`/`next_run` updates on execution. Jobs are never
/// deleted by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupJob {
    pub id: Uuid,
    pub name: String,
    pub namespace: String,
    pub resource_types: Vec<String>,
    pub schedule: String,
    pub retention_days: u32,
    pub storage_location: String,
    pub status: JobStatus,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Operator-supplied template for creating a job.
///
/// `retention_days`, `storage_location` and `status` fall back to engine
/// defaults when unset; everything else is required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobSpec {
    pub name: String,
    pub namespace: String,
    pub resource_types: Vec<String>,
    pub schedule: String,
    #[serde(default)]
    pub retention_days: Option<u32>,
    #[serde(default)]
    pub storage_location: Option<String>,
    #[serde(default)]
    pub status: Option<JobStatus>,
}

/// Terminal and in-flight states of a backup execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Running,
    Completed,
    Failed,
}

impl RecordStatus {
    /// Whether the record can no longer transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RecordStatus::Completed | RecordStatus::Failed)
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordStatus::Running => f.write_str("running"),
            RecordStatus::Completed => f.write_str("completed"),
            RecordStatus::Failed => f.write_str("failed"),
        }
    }
}

impl FromStr for RecordStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "running" => Ok(RecordStatus::Running),
            "completed" => Ok(RecordStatus::Completed),
            "failed" => Ok(RecordStatus::Failed),
            other => Err(format!("unknown record status: {}", other)),
        }
    }
}

/// One backup execution, from start to terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupRecord {
    pub id: Uuid,
    pub job_id: Uuid,
    pub status: RecordStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
    pub size_bytes: u64,
    pub resource_count: usize,
    pub storage_path: String,
    pub error_message: Option<String>,
}

impl BackupRecord {
    /// Create the in-flight record registered at execution start.
    pub fn running(job_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id,
            status: RecordStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            duration_ms: 0,
            size_bytes: 0,
            resource_count: 0,
            storage_path: String::new(),
            error_message: None,
        }
    }

    /// Transition to `completed`, optionally carrying partial-error detail.
    pub fn complete(
        &mut self,
        size_bytes: u64,
        resource_count: usize,
        storage_path: String,
        error_message: Option<String>,
    ) {
        let now = Utc::now();
        self.status = RecordStatus::Completed;
        self.completed_at = Some(now);
        self.duration_ms = elapsed_ms(self.started_at, now);
        self.size_bytes = size_bytes;
        self.resource_count = resource_count;
        self.storage_path = storage_path;
        self.error_message = error_message;
    }

    /// Transition to `failed`.
    pub fn fail(&mut self, error_message: impl Into<String>) {
        let now = Utc::now();
        self.status = RecordStatus::Failed;
        self.completed_at = Some(now);
        self.duration_ms = elapsed_ms(self.started_at, now);
        self.error_message = Some(error_message.into());
    }
}

fn elapsed_ms(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    (to - from).num_milliseconds().max(0) as u64
}
