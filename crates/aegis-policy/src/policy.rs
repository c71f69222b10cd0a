//! Disaster-recovery policy and compliance value types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Retention applied to policies that do not specify their own.
pub const DEFAULT_POLICY_RETENTION_DAYS: u32 = 30;

/// Priority applied to policies that do not specify their own.
pub const DEFAULT_POLICY_PRIORITY: u8 = 1;

/// A recovery objective policy covering a set of namespaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrPolicy {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    /// Maximum tolerable age of the newest completed backup, in minutes.
    pub rpo_minutes: u32,
    /// Maximum tolerable estimated recovery time, in minutes.
    pub rto_minutes: u32,
    pub backup_schedule: String,
    pub retention_days: u32,
    pub namespaces: Vec<String>,
    /// Governs violation severity; higher is more severe.
    pub priority: u8,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

/// Operator-supplied template for creating a policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicySpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub rpo_minutes: u32,
    pub rto_minutes: u32,
    pub backup_schedule: String,
    #[serde(default)]
    pub retention_days: Option<u32>,
    pub namespaces: Vec<String>,
    #[serde(default)]
    pub priority: Option<u8>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

/// What kind of objective a namespace is violating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationType {
    MissingBackup,
    Rpo,
    Rto,
    Retention,
}

/// How urgent a violation is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    /// Severity for priority-driven violation types.
    pub fn from_priority(priority: u8) -> Self {
        if priority >= 5 {
            Severity::Critical
        } else if priority >= 3 {
            Severity::Warning
        } else {
            Severity::Info
        }
    }
}

/// One violated objective for one namespace under one policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceViolation {
    pub policy_id: Uuid,
    pub policy_name: String,
    pub namespace: String,
    pub violation_type: ViolationType,
    pub description: String,
    pub severity: Severity,
}

/// Overall compliance standing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    Compliant,
    NonCompliant,
}

/// Result of one compliance evaluation across all enabled policies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub generated_at: DateTime<Utc>,
    /// Enabled policies only.
    pub total_policies: usize,
    pub compliant_count: usize,
    pub violation_count: usize,
    pub overall_status: ComplianceStatus,
    pub violations: Vec<ComplianceViolation>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_is_a_pure_function_of_priority() {
        assert_eq!(Severity::from_priority(1), Severity::Info);
        assert_eq!(Severity::from_priority(2), Severity::Info);
        assert_eq!(Severity::from_priority(3), Severity::Warning);
        assert_eq!(Severity::from_priority(4), Severity::Warning);
        assert_eq!(Severity::from_priority(5), Severity::Critical);
        assert_eq!(Severity::from_priority(10), Severity::Critical);
    }

    #[test]
    fn violation_types_serialize_snake_case() {
        let json = serde_json::to_string(&ViolationType::MissingBackup).unwrap();
        assert_eq!(json, "\"missing_backup\"");
        let json = serde_json::to_string(&ComplianceStatus::NonCompliant).unwrap();
        assert_eq!(json, "\"non_compliant\"");
    }
}
