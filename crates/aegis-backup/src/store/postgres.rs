//! Relational store backed by PostgreSQL.
//!
//! One column per entity attribute; saves are `ON CONFLICT` upserts keyed
//! by id. `ensure_schema` creates the tables idempotently so the store is
//! usable without an external migration run.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use uuid::Uuid;

use super::BackupStore;
use crate::error::{StoreError, StoreResult};
use crate::job::{BackupJob, BackupRecord};

const MAX_CONNECTIONS: u32 = 5;

/// PostgreSQL-backed [`BackupStore`].
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect to the database and make sure the schema exists.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(url)
            .await?;
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Wrap an existing pool (used by embedding applications that manage
    /// their own connections).
    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the jobs and records tables if they are missing.
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS backup_jobs (
                id               UUID PRIMARY KEY,
                name             TEXT NOT NULL,
                namespace        TEXT NOT NULL,
                resource_types   JSONB NOT NULL,
                schedule         TEXT NOT NULL,
                retention_days   INTEGER NOT NULL,
                storage_location TEXT NOT NULL,
                status           TEXT NOT NULL,
                last_run         TIMESTAMPTZ,
                next_run         TIMESTAMPTZ,
                created_at       TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS backup_records (
                id             UUID PRIMARY KEY,
                job_id         UUID NOT NULL,
                status         TEXT NOT NULL,
                started_at     TIMESTAMPTZ NOT NULL,
                completed_at   TIMESTAMPTZ,
                duration_ms    BIGINT NOT NULL,
                size_bytes     BIGINT NOT NULL,
                resource_count BIGINT NOT NULL,
                storage_path   TEXT NOT NULL,
                error_message  TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_backup_records_job_id ON backup_records (job_id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl BackupStore for PostgresStore {
    async fn save_job(&self, job: &BackupJob) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO backup_jobs
                (id, name, namespace, resource_types, schedule, retention_days,
                 storage_location, status, last_run, next_run, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                namespace = EXCLUDED.namespace,
                resource_types = EXCLUDED.resource_types,
                schedule = EXCLUDED.schedule,
                retention_days = EXCLUDED.retention_days,
                storage_location = EXCLUDED.storage_location,
                status = EXCLUDED.status,
                last_run = EXCLUDED.last_run,
                next_run = EXCLUDED.next_run,
                created_at = EXCLUDED.created_at
            "#,
        )
        .bind(job.id)
        .bind(&job.name)
        .bind(&job.namespace)
        .bind(serde_json::to_value(&job.resource_types)?)
        .bind(&job.schedule)
        .bind(job.retention_days as i32)
        .bind(&job.storage_location)
        .bind(job.status.to_string())
        .bind(job.last_run)
        .bind(job.next_run)
        .bind(job.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_job(&self, id: Uuid) -> StoreResult<Option<BackupJob>> {
        let row = sqlx::query("SELECT * FROM backup_jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(job_from_row).transpose()
    }

    async fn list_jobs(&self) -> StoreResult<Vec<BackupJob>> {
        let rows = sqlx::query("SELECT * FROM backup_jobs ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(job_from_row).collect()
    }

    async fn save_record(&self, record: &BackupRecord) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO backup_records
                (id, job_id, status, started_at, completed_at, duration_ms,
                 size_bytes, resource_count, storage_path, error_message)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                completed_at = EXCLUDED.completed_at,
                duration_ms = EXCLUDED.duration_ms,
                size_bytes = EXCLUDED.size_bytes,
                resource_count = EXCLUDED.resource_count,
                storage_path = EXCLUDED.storage_path,
                error_message = EXCLUDED.error_message
            "#,
        )
        .bind(record.id)
        .bind(record.job_id)
        .bind(record.status.to_string())
        .bind(record.started_at)
        .bind(record.completed_at)
        .bind(record.duration_ms as i64)
        .bind(record.size_bytes as i64)
        .bind(record.resource_count as i64)
        .bind(&record.storage_path)
        .bind(&record.error_message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_record(&self, id: Uuid) -> StoreResult<Option<BackupRecord>> {
        let row = sqlx::query("SELECT * FROM backup_records WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(record_from_row).transpose()
    }

    async fn list_records_by_job(&self, job_id: Uuid) -> StoreResult<Vec<BackupRecord>> {
        let rows = sqlx::query(
            "SELECT * FROM backup_records WHERE job_id = $1 ORDER BY started_at DESC",
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(record_from_row).collect()
    }

    async fn list_all_records(&self) -> StoreResult<Vec<BackupRecord>> {
        let rows = sqlx::query("SELECT * FROM backup_records ORDER BY started_at DESC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(record_from_row).collect()
    }

    async fn delete_record(&self, id: Uuid) -> StoreResult<()> {
        sqlx::query("DELETE FROM backup_records WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn job_from_row(row: &PgRow) -> StoreResult<BackupJob> {
    let resource_types: serde_json::Value = row.try_get("resource_types")?;
    let status: String = row.try_get("status")?;
    Ok(BackupJob {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        namespace: row.try_get("namespace")?,
        resource_types: serde_json::from_value(resource_types)?,
        schedule: row.try_get("schedule")?,
        retention_days: row.try_get::<i32, _>("retention_days")?.max(0) as u32,
        storage_location: row.try_get("storage_location")?,
        status: status.parse().map_err(StoreError::CorruptRow)?,
        last_run: row.try_get::<Option<DateTime<Utc>>, _>("last_run")?,
        next_run: row.try_get::<Option<DateTime<Utc>>, _>("next_run")?,
        created_at: row.try_get("created_at")?,
    })
}

fn record_from_row(row: &PgRow) -> StoreResult<BackupRecord> {
    let status: String = row.try_get("status")?;
    Ok(BackupRecord {
        id: row.try_get("id")?,
        job_id: row.try_get("job_id")?,
        status: status.parse().map_err(StoreError::CorruptRow)?,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get::<Option<DateTime<Utc>>, _>("completed_at")?,
        duration_ms: row.try_get::<i64, _>("duration_ms")?.max(0) as u64,
        size_bytes: row.try_get::<i64, _>("size_bytes")?.max(0) as u64,
        resource_count: row.try_get::<i64, _>("resource_count")?.max(0) as usize,
        storage_path: row.try_get("storage_path")?,
        error_message: row.try_get::<Option<String>, _>("error_message")?,
    })
}
