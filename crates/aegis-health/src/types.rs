//! Health status and summary value types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Health status enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Resource is healthy.
    Healthy,
    /// Resource is degraded but operational.
    Degraded,
    /// Resource is unhealthy.
    Unhealthy,
    /// Resource status could not be determined.
    Unknown,
}

impl HealthStatus {
    /// Check if status is healthy.
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }

    /// Get the worst status between two.
    pub fn worst(&self, other: &Self) -> Self {
        match (self, other) {
            (HealthStatus::Unhealthy, _) | (_, HealthStatus::Unhealthy) => HealthStatus::Unhealthy,
            (HealthStatus::Degraded, _) | (_, HealthStatus::Degraded) => HealthStatus::Degraded,
            (HealthStatus::Unknown, _) | (_, HealthStatus::Unknown) => HealthStatus::Unknown,
            _ => HealthStatus::Healthy,
        }
    }
}

/// One health evaluation of one resource.
///
/// Checks are keyed by `{namespace}/{kind}/{name}`: the latest check
/// overwrites, history appends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    pub id: Uuid,
    pub resource_type: String,
    pub resource_name: String,
    pub namespace: String,
    pub status: HealthStatus,
    pub last_check: DateTime<Utc>,
    pub details: HashMap<String, String>,
}

impl HealthCheck {
    pub fn new(
        resource_type: impl Into<String>,
        resource_name: impl Into<String>,
        namespace: impl Into<String>,
        status: HealthStatus,
        details: HashMap<String, String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            resource_type: resource_type.into(),
            resource_name: resource_name.into(),
            namespace: namespace.into(),
            status,
            last_check: Utc::now(),
            details,
        }
    }

    /// The unique key this check is stored under.
    pub fn key(&self) -> String {
        resource_key(&self.namespace, &self.resource_type, &self.resource_name)
    }
}

/// Storage key for a monitored resource.
pub fn resource_key(namespace: &str, kind: &str, name: &str) -> String {
    format!("{}/{}/{}", namespace, kind, name)
}

/// Per-namespace status counts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NamespaceHealth {
    pub total: usize,
    pub healthy: usize,
    pub degraded: usize,
    pub unhealthy: usize,
    pub unknown: usize,
}

/// Aggregate health over every monitored resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSummary {
    pub timestamp: DateTime<Utc>,
    pub total_resources: usize,
    pub healthy_count: usize,
    pub degraded_count: usize,
    pub unhealthy_count: usize,
    pub unknown_count: usize,
    pub namespaces: HashMap<String, NamespaceHealth>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worst_orders_statuses() {
        assert_eq!(
            HealthStatus::Healthy.worst(&HealthStatus::Degraded),
            HealthStatus::Degraded
        );
        assert_eq!(
            HealthStatus::Degraded.worst(&HealthStatus::Unhealthy),
            HealthStatus::Unhealthy
        );
        assert_eq!(
            HealthStatus::Healthy.worst(&HealthStatus::Healthy),
            HealthStatus::Healthy
        );
        assert_eq!(
            HealthStatus::Unknown.worst(&HealthStatus::Healthy),
            HealthStatus::Unknown
        );
    }

    #[test]
    fn statuses_serialize_lowercase() {
        assert_eq!(
            serde_json::to_string(&HealthStatus::Unhealthy).unwrap(),
            "\"unhealthy\""
        );
    }

    #[test]
    fn check_key_is_namespace_kind_name() {
        let check = HealthCheck::new(
            "Deployment",
            "web",
            "production",
            HealthStatus::Healthy,
            HashMap::new(),
        );
        assert_eq!(check.key(), "production/Deployment/web");
    }
}
