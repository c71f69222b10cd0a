//! Captured Kubernetes resources and the closed set of monitored kinds.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// A snapshot of a single Kubernetes resource.
///
/// The `manifest` field is a verbatim capture of the object as returned by
/// the cluster, suitable for re-apply. The core never mutates a captured
/// resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KubernetesResource {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    pub manifest: serde_json::Value,
}

impl KubernetesResource {
    /// Create a resource snapshot with an empty manifest.
    pub fn new(
        kind: impl Into<String>,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        let kind = kind.into();
        let api_version = ResourceKind::from_str(&kind)
            .map(|k| k.api_version().to_string())
            .unwrap_or_else(|_| "v1".to_string());
        Self {
            api_version,
            kind,
            name: name.into(),
            namespace: namespace.into(),
            labels: HashMap::new(),
            manifest: serde_json::json!({}),
        }
    }

    /// Attach a label.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Attach the verbatim manifest.
    pub fn with_manifest(mut self, manifest: serde_json::Value) -> Self {
        self.manifest = manifest;
        self
    }
}

/// The closed set of resource kinds the platform monitors and backs up by
/// default. Backup jobs may still name arbitrary kinds as plain strings;
/// this enum exists for the components that need the closed set (health
/// evaluation, API version mapping).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Deployment,
    StatefulSet,
    DaemonSet,
    Service,
    Pod,
    ConfigMap,
    Secret,
    PersistentVolumeClaim,
}

impl ResourceKind {
    /// All monitored kinds, in evaluation order.
    pub const ALL: [ResourceKind; 8] = [
        ResourceKind::Deployment,
        ResourceKind::StatefulSet,
        ResourceKind::DaemonSet,
        ResourceKind::Service,
        ResourceKind::Pod,
        ResourceKind::ConfigMap,
        ResourceKind::Secret,
        ResourceKind::PersistentVolumeClaim,
    ];

    /// The kind name as it appears in manifests.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Deployment => "Deployment",
            ResourceKind::StatefulSet => "StatefulSet",
            ResourceKind::DaemonSet => "DaemonSet",
            ResourceKind::Service => "Service",
            ResourceKind::Pod => "Pod",
            ResourceKind::ConfigMap => "ConfigMap",
            ResourceKind::Secret => "Secret",
            ResourceKind::PersistentVolumeClaim => "PersistentVolumeClaim",
        }
    }

    /// The apiVersion the kind is served under.
    pub fn api_version(&self) -> &'static str {
        match self {
            ResourceKind::Deployment | ResourceKind::StatefulSet | ResourceKind::DaemonSet => {
                "apps/v1"
            }
            _ => "v1",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Deployment" => Ok(ResourceKind::Deployment),
            "StatefulSet" => Ok(ResourceKind::StatefulSet),
            "DaemonSet" => Ok(ResourceKind::DaemonSet),
            "Service" => Ok(ResourceKind::Service),
            "Pod" => Ok(ResourceKind::Pod),
            "ConfigMap" => Ok(ResourceKind::ConfigMap),
            "Secret" => Ok(ResourceKind::Secret),
            "PersistentVolumeClaim" => Ok(ResourceKind::PersistentVolumeClaim),
            other => Err(CoreError::UnknownKind(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_roundtrip() {
        for kind in ResourceKind::ALL {
            assert_eq!(ResourceKind::from_str(kind.as_str()).unwrap(), kind);
        }
        assert!(ResourceKind::from_str("CronJob").is_err());
    }

    #[test]
    fn api_version_mapping() {
        assert_eq!(ResourceKind::Deployment.api_version(), "apps/v1");
        assert_eq!(ResourceKind::Service.api_version(), "v1");
    }

    #[test]
    fn resource_capture_serializes() {
        let resource = KubernetesResource::new("Deployment", "web", "production")
            .with_label("app", "web")
            .with_manifest(serde_json::json!({"spec": {"replicas": 3}}));

        let json = serde_json::to_value(&resource).unwrap();
        assert_eq!(json["api_version"], "apps/v1");
        assert_eq!(json["manifest"]["spec"]["replicas"], 3);
    }
}
