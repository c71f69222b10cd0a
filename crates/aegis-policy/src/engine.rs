//! Compliance evaluation and auto-remediation.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use aegis_backup::job::{BackupJob, BackupRecord, JobStatus, RecordStatus};
use aegis_backup::manager::BackupManager;
use aegis_backup::schedule;

use crate::error::{PolicyError, Result};
use crate::policy::{
    ComplianceReport, ComplianceStatus, ComplianceViolation, DrPolicy, PolicySpec, Severity,
    ViolationType, DEFAULT_POLICY_PRIORITY, DEFAULT_POLICY_RETENTION_DAYS,
};

/// Assumed restore throughput used for recovery-time estimation.
///
/// Deliberately conservative; operators tune it to their storage tier.
/// Changing it changes RTO severity outcomes.
pub const RECOVERY_RATE_BYTES_PER_MINUTE: u64 = 100 * 1024 * 1024;

/// Deterministic recovery-time estimate for an artifact of `size_bytes`,
/// floored at one minute.
pub fn estimated_recovery_minutes(size_bytes: u64) -> u64 {
    (size_bytes / RECOVERY_RATE_BYTES_PER_MINUTE).max(1)
}

/// Evaluates DR policies against the backup manager's current state and
/// optionally triggers remediating backups.
pub struct PolicyEngine {
    manager: Arc<BackupManager>,
    policies: RwLock<HashMap<Uuid, DrPolicy>>,
}

impl PolicyEngine {
    pub fn new(manager: Arc<BackupManager>) -> Self {
        Self {
            manager,
            policies: RwLock::new(HashMap::new()),
        }
    }

    /// Create a policy from an operator template.
    pub async fn create_policy(&self, spec: PolicySpec) -> Result<DrPolicy> {
        validate_spec(&spec)?;

        let policy = DrPolicy {
            id: Uuid::new_v4(),
            name: spec.name,
            description: spec.description,
            rpo_minutes: spec.rpo_minutes,
            rto_minutes: spec.rto_minutes,
            backup_schedule: spec.backup_schedule,
            retention_days: spec.retention_days.unwrap_or(DEFAULT_POLICY_RETENTION_DAYS),
            namespaces: spec.namespaces,
            priority: spec.priority.unwrap_or(DEFAULT_POLICY_PRIORITY),
            enabled: spec.enabled.unwrap_or(true),
            created_at: Utc::now(),
        };

        self.policies.write().await.insert(policy.id, policy.clone());
        info!(policy = %policy.name, "created DR policy");
        Ok(policy)
    }

    /// Fetch a snapshot copy of a policy.
    pub async fn get_policy(&self, policy_id: Uuid) -> Result<DrPolicy> {
        self.policies
            .read()
            .await
            .get(&policy_id)
            .cloned()
            .ok_or(PolicyError::NotFound(policy_id))
    }

    /// Snapshot copies of all policies, oldest first.
    pub async fn list_policies(&self) -> Vec<DrPolicy> {
        let mut policies: Vec<DrPolicy> =
            self.policies.read().await.values().cloned().collect();
        policies.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        policies
    }

    /// Replace an existing policy.
    pub async fn update_policy(&self, policy: DrPolicy) -> Result<DrPolicy> {
        validate_policy(&policy)?;
        let mut policies = self.policies.write().await;
        if !policies.contains_key(&policy.id) {
            return Err(PolicyError::NotFound(policy.id));
        }
        policies.insert(policy.id, policy.clone());
        Ok(policy)
    }

    /// Delete a policy.
    pub async fn delete_policy(&self, policy_id: Uuid) -> Result<()> {
        self.policies
            .write()
            .await
            .remove(&policy_id)
            .map(|_| ())
            .ok_or(PolicyError::NotFound(policy_id))
    }

    /// Evaluate every enabled policy against the manager's current jobs
    /// and records.
    ///
    /// A policy is compliant iff it produced no violations; the report is
    /// compliant iff there are no violations at all.
    pub async fn evaluate_compliance(&self) -> Result<ComplianceReport> {
        let policies = self.list_policies().await;
        let jobs = self.manager.list_jobs().await;
        let records = self.manager.list_all_backups().await;

        let mut jobs_by_namespace: HashMap<&str, Vec<&BackupJob>> = HashMap::new();
        for job in &jobs {
            jobs_by_namespace
                .entry(job.namespace.as_str())
                .or_default()
                .push(job);
        }

        let now = Utc::now();
        let mut violations = Vec::new();
        let mut compliant_count = 0;
        let mut total_policies = 0;

        for policy in policies.iter().filter(|p| p.enabled) {
            total_policies += 1;
            let before = violations.len();

            for namespace in &policy.namespaces {
                let Some(ns_jobs) = jobs_by_namespace.get(namespace.as_str()) else {
                    violations.push(violation(
                        policy,
                        namespace,
                        ViolationType::MissingBackup,
                        format!("no backup job covers namespace {}", namespace),
                        Severity::from_priority(policy.priority),
                    ));
                    continue;
                };

                let latest = latest_completed(ns_jobs, &records);
                let Some(latest) = latest else {
                    violations.push(violation(
                        policy,
                        namespace,
                        ViolationType::Rpo,
                        "no completed backups found".to_string(),
                        Severity::Critical,
                    ));
                    continue;
                };

                if let Some(completed_at) = latest.completed_at {
                    let age_minutes = (now - completed_at).num_minutes().max(0) as u64;
                    if age_minutes > policy.rpo_minutes as u64 {
                        violations.push(violation(
                            policy,
                            namespace,
                            ViolationType::Rpo,
                            format!(
                                "last completed backup is {} minutes old, RPO is {} minutes",
                                age_minutes, policy.rpo_minutes
                            ),
                            Severity::from_priority(policy.priority),
                        ));
                    }
                }

                let estimate = estimated_recovery_minutes(latest.size_bytes);
                if estimate > policy.rto_minutes as u64 {
                    violations.push(violation(
                        policy,
                        namespace,
                        ViolationType::Rto,
                        format!(
                            "estimated recovery of {} minutes exceeds RTO of {} minutes",
                            estimate, policy.rto_minutes
                        ),
                        Severity::Warning,
                    ));
                }

                for job in ns_jobs {
                    if job.retention_days < policy.retention_days {
                        violations.push(violation(
                            policy,
                            namespace,
                            ViolationType::Retention,
                            format!(
                                "job {} retains backups for {} days, policy requires {}",
                                job.name, job.retention_days, policy.retention_days
                            ),
                            Severity::Warning,
                        ));
                    }
                }
            }

            if violations.len() == before {
                compliant_count += 1;
            }
        }

        let violation_count = violations.len();
        Ok(ComplianceReport {
            generated_at: now,
            total_policies,
            compliant_count,
            violation_count,
            overall_status: if violation_count == 0 {
                ComplianceStatus::Compliant
            } else {
                ComplianceStatus::NonCompliant
            },
            violations,
        })
    }

    /// Trigger a backup for every namespace currently violating its RPO
    /// or missing backups entirely.
    ///
    /// Each violating namespace's first active job is executed exactly
    /// once per call. Returns the number of backups triggered; on a
    /// compliant system this is zero.
    pub async fn auto_remediate(&self) -> Result<usize> {
        let report = self.evaluate_compliance().await?;
        let namespaces: BTreeSet<&str> = report
            .violations
            .iter()
            .filter(|v| {
                matches!(
                    v.violation_type,
                    ViolationType::Rpo | ViolationType::MissingBackup
                )
            })
            .map(|v| v.namespace.as_str())
            .collect();

        if namespaces.is_empty() {
            return Ok(0);
        }

        let jobs = self.manager.list_jobs().await;
        let mut triggered = 0;
        for namespace in namespaces {
            let Some(job) = jobs
                .iter()
                .find(|j| j.namespace == namespace && j.status == JobStatus::Active)
            else {
                continue;
            };

            info!(namespace, job = %job.name, "triggering remediating backup");
            triggered += 1;
            if let Err(error) = self.manager.execute_backup(job.id).await {
                warn!(namespace, job = %job.name, %error, "remediating backup failed");
            }
        }
        Ok(triggered)
    }
}

fn violation(
    policy: &DrPolicy,
    namespace: &str,
    violation_type: ViolationType,
    description: String,
    severity: Severity,
) -> ComplianceViolation {
    ComplianceViolation {
        policy_id: policy.id,
        policy_name: policy.name.clone(),
        namespace: namespace.to_string(),
        violation_type,
        description,
        severity,
    }
}

/// The most recent completed record across a namespace's jobs.
fn latest_completed<'a>(
    ns_jobs: &[&BackupJob],
    records: &'a [BackupRecord],
) -> Option<&'a BackupRecord> {
    records
        .iter()
        .filter(|r| {
            r.status == RecordStatus::Completed && ns_jobs.iter().any(|j| j.id == r.job_id)
        })
        .max_by_key(|r| r.completed_at)
}

fn validate_spec(spec: &PolicySpec) -> Result<()> {
    validate_fields(
        &spec.name,
        spec.rpo_minutes,
        spec.rto_minutes,
        &spec.backup_schedule,
        spec.retention_days.unwrap_or(DEFAULT_POLICY_RETENTION_DAYS),
        &spec.namespaces,
        spec.priority.unwrap_or(DEFAULT_POLICY_PRIORITY),
    )
}

fn validate_policy(policy: &DrPolicy) -> Result<()> {
    validate_fields(
        &policy.name,
        policy.rpo_minutes,
        policy.rto_minutes,
        &policy.backup_schedule,
        policy.retention_days,
        &policy.namespaces,
        policy.priority,
    )
}

fn validate_fields(
    name: &str,
    rpo_minutes: u32,
    rto_minutes: u32,
    backup_schedule: &str,
    retention_days: u32,
    namespaces: &[String],
    priority: u8,
) -> Result<()> {
    if name.trim().is_empty() {
        return Err(PolicyError::InvalidPolicy("policy name is required".into()));
    }
    if rpo_minutes == 0 {
        return Err(PolicyError::InvalidPolicy(
            "rpo_minutes must be greater than zero".into(),
        ));
    }
    if rto_minutes == 0 {
        return Err(PolicyError::InvalidPolicy(
            "rto_minutes must be greater than zero".into(),
        ));
    }
    if retention_days == 0 {
        return Err(PolicyError::InvalidPolicy(
            "retention_days must be greater than zero".into(),
        ));
    }
    if namespaces.is_empty() {
        return Err(PolicyError::InvalidPolicy(
            "at least one namespace is required".into(),
        ));
    }
    if namespaces.iter().any(|ns| ns.trim().is_empty()) {
        return Err(PolicyError::InvalidPolicy(
            "namespaces must be non-empty strings".into(),
        ));
    }
    if priority == 0 {
        return Err(PolicyError::InvalidPolicy(
            "priority must be at least 1".into(),
        ));
    }
    schedule::validate(backup_schedule)
        .map_err(|e| PolicyError::InvalidPolicy(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_backup::config::EncryptionSettings;
    use aegis_backup::job::JobSpec;
    use aegis_backup::storage::FilesystemBackend;
    use aegis_backup::store::{BackupStore, MemoryStore};
    use aegis_core::mock::MockProvider;
    use aegis_core::KubernetesResource;
    use chrono::Duration;

    struct Harness {
        _dir: tempfile::TempDir,
        provider: Arc<MockProvider>,
        store: Arc<MemoryStore>,
        manager: Arc<BackupManager>,
        engine: PolicyEngine,
    }

    async fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(MockProvider::new());
        let storage = Arc::new(FilesystemBackend::new(dir.path()).await.unwrap());
        let store = Arc::new(MemoryStore::new());
        let manager = Arc::new(
            BackupManager::new(
                provider.clone(),
                storage,
                Some(store.clone()),
                EncryptionSettings::disabled(),
            )
            .unwrap(),
        );
        let engine = PolicyEngine::new(manager.clone());
        Harness {
            _dir: dir,
            provider,
            store,
            manager,
            engine,
        }
    }

    fn policy_spec(namespaces: &[&str]) -> PolicySpec {
        PolicySpec {
            name: "tier-1".to_string(),
            description: "critical workloads".to_string(),
            rpo_minutes: 60,
            rto_minutes: 60,
            backup_schedule: "@hourly".to_string(),
            namespaces: namespaces.iter().map(|s| s.to_string()).collect(),
            ..PolicySpec::default()
        }
    }

    fn job_spec(namespace: &str) -> JobSpec {
        JobSpec {
            name: format!("{}-backup", namespace),
            namespace: namespace.to_string(),
            resource_types: vec!["Deployment".to_string()],
            schedule: "@hourly".to_string(),
            ..JobSpec::default()
        }
    }

    /// Inject an aged completed record through the store and rehydrate.
    async fn inject_completed_record(
        h: &Harness,
        job_id: Uuid,
        age: Duration,
        size_bytes: u64,
    ) {
        let mut record = BackupRecord::running(job_id);
        record.started_at = Utc::now() - age - Duration::minutes(5);
        record.complete(size_bytes, 1, format!("{}/x/x.tar.gz", job_id), None);
        record.completed_at = Some(Utc::now() - age);
        h.store.save_record(&record).await.unwrap();
        h.manager.load_from_store().await.unwrap();
    }

    #[tokio::test]
    async fn policy_validation_rejects_bad_specs() {
        let h = harness().await;

        let mut no_name = policy_spec(&["production"]);
        no_name.name = String::new();
        assert!(h.engine.create_policy(no_name).await.is_err());

        let mut zero_rpo = policy_spec(&["production"]);
        zero_rpo.rpo_minutes = 0;
        assert!(h.engine.create_policy(zero_rpo).await.is_err());

        let no_namespaces = policy_spec(&[]);
        assert!(h.engine.create_policy(no_namespaces).await.is_err());

        let mut bad_schedule = policy_spec(&["production"]);
        bad_schedule.backup_schedule = "whenever".to_string();
        assert!(h.engine.create_policy(bad_schedule).await.is_err());

        let mut zero_priority = policy_spec(&["production"]);
        zero_priority.priority = Some(0);
        assert!(h.engine.create_policy(zero_priority).await.is_err());
    }

    #[tokio::test]
    async fn defaults_applied_on_create() {
        let h = harness().await;
        let policy = h.engine.create_policy(policy_spec(&["production"])).await.unwrap();
        assert_eq!(policy.retention_days, DEFAULT_POLICY_RETENTION_DAYS);
        assert_eq!(policy.priority, DEFAULT_POLICY_PRIORITY);
        assert!(policy.enabled);
    }

    #[tokio::test]
    async fn namespace_without_jobs_is_a_missing_backup_violation() {
        let h = harness().await;
        h.engine.create_policy(policy_spec(&["staging"])).await.unwrap();

        let report = h.engine.evaluate_compliance().await.unwrap();
        assert_eq!(report.overall_status, ComplianceStatus::NonCompliant);
        assert_eq!(report.violation_count, 1);
        assert_eq!(
            report.violations[0].violation_type,
            ViolationType::MissingBackup
        );
        assert_eq!(report.violations[0].namespace, "staging");
        assert_eq!(report.compliant_count, 0);
    }

    #[tokio::test]
    async fn jobs_without_completed_records_breach_rpo_critically() {
        let h = harness().await;
        h.manager.create_job(job_spec("production")).await.unwrap();
        h.engine.create_policy(policy_spec(&["production"])).await.unwrap();

        let report = h.engine.evaluate_compliance().await.unwrap();
        let rpo = report
            .violations
            .iter()
            .find(|v| v.violation_type == ViolationType::Rpo)
            .unwrap();
        assert_eq!(rpo.severity, Severity::Critical);
        assert!(rpo.description.contains("no completed backups found"));
    }

    #[tokio::test]
    async fn stale_backup_breaches_rpo_with_priority_severity() {
        let h = harness().await;
        let job = h.manager.create_job(job_spec("production")).await.unwrap();
        inject_completed_record(&h, job.id, Duration::hours(3), 1024).await;

        let mut spec = policy_spec(&["production"]);
        spec.priority = Some(5);
        h.engine.create_policy(spec).await.unwrap();

        let report = h.engine.evaluate_compliance().await.unwrap();
        assert_eq!(report.overall_status, ComplianceStatus::NonCompliant);
        let rpo = report
            .violations
            .iter()
            .find(|v| v.violation_type == ViolationType::Rpo)
            .unwrap();
        assert_eq!(rpo.severity, Severity::Critical);
        assert!(rpo.description.contains("RPO is 60 minutes"));
    }

    #[tokio::test]
    async fn oversized_backup_breaches_rto_as_warning() {
        let h = harness().await;
        let job = h.manager.create_job(job_spec("production")).await.unwrap();
        // 200 GiB at 100 MiB/minute is well past a 60 minute RTO.
        inject_completed_record(
            &h,
            job.id,
            Duration::minutes(1),
            200 * 1024 * 1024 * 1024,
        )
        .await;

        h.engine.create_policy(policy_spec(&["production"])).await.unwrap();
        let report = h.engine.evaluate_compliance().await.unwrap();
        let rto = report
            .violations
            .iter()
            .find(|v| v.violation_type == ViolationType::Rto)
            .unwrap();
        assert_eq!(rto.severity, Severity::Warning);
    }

    #[tokio::test]
    async fn short_job_retention_is_a_warning() {
        let h = harness().await;
        let mut spec = job_spec("production");
        spec.retention_days = Some(7);
        let job = h.manager.create_job(spec).await.unwrap();
        inject_completed_record(&h, job.id, Duration::minutes(1), 1024).await;

        h.engine.create_policy(policy_spec(&["production"])).await.unwrap();
        let report = h.engine.evaluate_compliance().await.unwrap();
        let retention = report
            .violations
            .iter()
            .find(|v| v.violation_type == ViolationType::Retention)
            .unwrap();
        assert_eq!(retention.severity, Severity::Warning);
        assert!(retention.description.contains("7 days"));
    }

    #[tokio::test]
    async fn fresh_backups_are_compliant() {
        let h = harness().await;
        let job = h.manager.create_job(job_spec("production")).await.unwrap();
        inject_completed_record(&h, job.id, Duration::minutes(1), 1024).await;

        h.engine.create_policy(policy_spec(&["production"])).await.unwrap();
        let report = h.engine.evaluate_compliance().await.unwrap();
        assert_eq!(report.overall_status, ComplianceStatus::Compliant);
        assert_eq!(report.compliant_count, 1);
        assert_eq!(report.total_policies, 1);
        assert!(report.violations.is_empty());
    }

    #[tokio::test]
    async fn disabled_policies_are_ignored() {
        let h = harness().await;
        let mut spec = policy_spec(&["staging"]);
        spec.enabled = Some(false);
        h.engine.create_policy(spec).await.unwrap();

        let report = h.engine.evaluate_compliance().await.unwrap();
        assert_eq!(report.total_policies, 0);
        assert_eq!(report.overall_status, ComplianceStatus::Compliant);
    }

    #[tokio::test]
    async fn auto_remediate_triggers_once_per_violating_namespace() {
        let h = harness().await;
        h.provider
            .add_resource(KubernetesResource::new("Deployment", "web", "production"))
            .await;

        // Two jobs cover production; only the first should be triggered.
        h.manager.create_job(job_spec("production")).await.unwrap();
        let mut second = job_spec("production");
        second.name = "production-secondary".to_string();
        h.manager.create_job(second).await.unwrap();

        h.engine.create_policy(policy_spec(&["production"])).await.unwrap();

        // No completed records yet: the namespace violates RPO.
        let triggered = h.engine.auto_remediate().await.unwrap();
        assert_eq!(triggered, 1);

        // The remediation produced a completed backup, so the system is
        // compliant and a second pass does nothing.
        let report = h.engine.evaluate_compliance().await.unwrap();
        assert_eq!(report.overall_status, ComplianceStatus::Compliant);
        assert_eq!(h.engine.auto_remediate().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn update_and_delete_policies() {
        let h = harness().await;
        let mut policy = h.engine.create_policy(policy_spec(&["production"])).await.unwrap();

        policy.rpo_minutes = 120;
        let updated = h.engine.update_policy(policy.clone()).await.unwrap();
        assert_eq!(updated.rpo_minutes, 120);
        assert_eq!(h.engine.get_policy(policy.id).await.unwrap().rpo_minutes, 120);

        h.engine.delete_policy(policy.id).await.unwrap();
        assert!(matches!(
            h.engine.get_policy(policy.id).await.unwrap_err(),
            PolicyError::NotFound(_)
        ));
        assert!(matches!(
            h.engine.delete_policy(policy.id).await.unwrap_err(),
            PolicyError::NotFound(_)
        ));
    }

    #[test]
    fn recovery_estimate_is_floored_at_one_minute() {
        assert_eq!(estimated_recovery_minutes(0), 1);
        assert_eq!(estimated_recovery_minutes(1024), 1);
        assert_eq!(
            estimated_recovery_minutes(RECOVERY_RATE_BYTES_PER_MINUTE * 7),
            7
        );
    }
}
