//! Per-kind health evaluators.
//!
//! Each evaluator is a small pure function from a captured resource to a
//! status and a details map. The contract is the signature and the closed
//! status set; the field inspection below covers the common status
//! surfaces of each kind and falls back to `unknown` when a resource
//! reports nothing usable.

use std::collections::HashMap;
use std::str::FromStr;

use aegis_core::{KubernetesResource, ResourceKind};

use crate::types::HealthStatus;

/// Evaluate the health of a captured resource.
pub fn evaluate(resource: &KubernetesResource) -> (HealthStatus, HashMap<String, String>) {
    match ResourceKind::from_str(&resource.kind) {
        Ok(ResourceKind::Deployment) | Ok(ResourceKind::StatefulSet) => {
            evaluate_replicated(resource)
        }
        Ok(ResourceKind::DaemonSet) => evaluate_daemon_set(resource),
        Ok(ResourceKind::Pod) => evaluate_pod(resource),
        Ok(ResourceKind::Service) => evaluate_service(resource),
        Ok(ResourceKind::ConfigMap) | Ok(ResourceKind::Secret) => evaluate_data_object(resource),
        Ok(ResourceKind::PersistentVolumeClaim) => evaluate_pvc(resource),
        Err(_) => {
            let mut details = HashMap::new();
            details.insert("error".to_string(), format!("unmonitored kind {}", resource.kind));
            (HealthStatus::Unknown, details)
        }
    }
}

/// Deployments and StatefulSets: ready replicas against desired.
fn evaluate_replicated(resource: &KubernetesResource) -> (HealthStatus, HashMap<String, String>) {
    let mut details = HashMap::new();

    if resource.manifest.get("status").is_none() {
        details.insert("error".to_string(), "status not reported".to_string());
        return (HealthStatus::Unknown, details);
    }

    let desired = json_u64(resource, "/spec/replicas").unwrap_or(1);
    let ready = json_u64(resource, "/status/readyReplicas").unwrap_or(0);
    details.insert("desired_replicas".to_string(), desired.to_string());
    details.insert("ready_replicas".to_string(), ready.to_string());

    let status = if desired == 0 || ready >= desired {
        HealthStatus::Healthy
    } else if ready > 0 {
        HealthStatus::Degraded
    } else {
        HealthStatus::Unhealthy
    };
    (status, details)
}

fn evaluate_daemon_set(resource: &KubernetesResource) -> (HealthStatus, HashMap<String, String>) {
    let mut details = HashMap::new();

    if resource.manifest.get("status").is_none() {
        details.insert("error".to_string(), "status not reported".to_string());
        return (HealthStatus::Unknown, details);
    }

    let desired = json_u64(resource, "/status/desiredNumberScheduled").unwrap_or(0);
    let ready = json_u64(resource, "/status/numberReady").unwrap_or(0);
    details.insert("desired_scheduled".to_string(), desired.to_string());
    details.insert("number_ready".to_string(), ready.to_string());

    let status = if desired == 0 || ready >= desired {
        HealthStatus::Healthy
    } else if ready > 0 {
        HealthStatus::Degraded
    } else {
        HealthStatus::Unhealthy
    };
    (status, details)
}

fn evaluate_pod(resource: &KubernetesResource) -> (HealthStatus, HashMap<String, String>) {
    let mut details = HashMap::new();
    let phase = resource
        .manifest
        .pointer("/status/phase")
        .and_then(|v| v.as_str())
        .unwrap_or("Unknown");
    details.insert("phase".to_string(), phase.to_string());

    let status = match phase {
        "Running" | "Succeeded" => HealthStatus::Healthy,
        "Pending" => HealthStatus::Degraded,
        "Failed" => HealthStatus::Unhealthy,
        _ => HealthStatus::Unknown,
    };
    (status, details)
}

fn evaluate_service(resource: &KubernetesResource) -> (HealthStatus, HashMap<String, String>) {
    let mut details = HashMap::new();
    let Some(spec) = resource.manifest.get("spec") else {
        details.insert("error".to_string(), "spec not captured".to_string());
        return (HealthStatus::Unknown, details);
    };

    if let Some(service_type) = spec.get("type").and_then(|v| v.as_str()) {
        details.insert("type".to_string(), service_type.to_string());
    }
    if let Some(cluster_ip) = spec.get("clusterIP").and_then(|v| v.as_str()) {
        details.insert("cluster_ip".to_string(), cluster_ip.to_string());
    }
    (HealthStatus::Healthy, details)
}

/// ConfigMaps and Secrets are healthy when present; report how much they
/// carry.
fn evaluate_data_object(resource: &KubernetesResource) -> (HealthStatus, HashMap<String, String>) {
    let mut details = HashMap::new();
    let keys = resource
        .manifest
        .get("data")
        .and_then(|v| v.as_object())
        .map(|o| o.len())
        .unwrap_or(0);
    details.insert("data_keys".to_string(), keys.to_string());
    (HealthStatus::Healthy, details)
}

fn evaluate_pvc(resource: &KubernetesResource) -> (HealthStatus, HashMap<String, String>) {
    let mut details = HashMap::new();
    let phase = resource
        .manifest
        .pointer("/status/phase")
        .and_then(|v| v.as_str())
        .unwrap_or("Unknown");
    details.insert("phase".to_string(), phase.to_string());

    let status = match phase {
        "Bound" => HealthStatus::Healthy,
        "Pending" => HealthStatus::Degraded,
        "Lost" => HealthStatus::Unhealthy,
        _ => HealthStatus::Unknown,
    };
    (status, details)
}

fn json_u64(resource: &KubernetesResource, pointer: &str) -> Option<u64> {
    resource.manifest.pointer(pointer).and_then(|v| v.as_u64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resource(kind: &str, manifest: serde_json::Value) -> KubernetesResource {
        KubernetesResource::new(kind, "target", "default").with_manifest(manifest)
    }

    #[test]
    fn deployment_health_tracks_ready_replicas() {
        let healthy = resource(
            "Deployment",
            json!({"spec": {"replicas": 3}, "status": {"readyReplicas": 3}}),
        );
        assert_eq!(evaluate(&healthy).0, HealthStatus::Healthy);

        let degraded = resource(
            "Deployment",
            json!({"spec": {"replicas": 3}, "status": {"readyReplicas": 1}}),
        );
        let (status, details) = evaluate(&degraded);
        assert_eq!(status, HealthStatus::Degraded);
        assert_eq!(details["ready_replicas"], "1");

        let unhealthy = resource(
            "Deployment",
            json!({"spec": {"replicas": 3}, "status": {"readyReplicas": 0}}),
        );
        assert_eq!(evaluate(&unhealthy).0, HealthStatus::Unhealthy);

        let no_status = resource("Deployment", json!({"spec": {"replicas": 3}}));
        assert_eq!(evaluate(&no_status).0, HealthStatus::Unknown);
    }

    #[test]
    fn daemon_set_with_nothing_scheduled_is_healthy() {
        let idle = resource(
            "DaemonSet",
            json!({"status": {"desiredNumberScheduled": 0, "numberReady": 0}}),
        );
        assert_eq!(evaluate(&idle).0, HealthStatus::Healthy);

        let partial = resource(
            "DaemonSet",
            json!({"status": {"desiredNumberScheduled": 4, "numberReady": 2}}),
        );
        assert_eq!(evaluate(&partial).0, HealthStatus::Degraded);
    }

    #[test]
    fn pod_phase_mapping() {
        for (phase, expected) in [
            ("Running", HealthStatus::Healthy),
            ("Succeeded", HealthStatus::Healthy),
            ("Pending", HealthStatus::Degraded),
            ("Failed", HealthStatus::Unhealthy),
            ("Unknown", HealthStatus::Unknown),
        ] {
            let pod = resource("Pod", json!({"status": {"phase": phase}}));
            assert_eq!(evaluate(&pod).0, expected, "phase {}", phase);
        }

        let no_phase = resource("Pod", json!({}));
        assert_eq!(evaluate(&no_phase).0, HealthStatus::Unknown);
    }

    #[test]
    fn pvc_phase_mapping() {
        let bound = resource("PersistentVolumeClaim", json!({"status": {"phase": "Bound"}}));
        assert_eq!(evaluate(&bound).0, HealthStatus::Healthy);
        let lost = resource("PersistentVolumeClaim", json!({"status": {"phase": "Lost"}}));
        assert_eq!(evaluate(&lost).0, HealthStatus::Unhealthy);
    }

    #[test]
    fn config_objects_report_data_keys() {
        let cm = resource("ConfigMap", json!({"data": {"a": "1", "b": "2"}}));
        let (status, details) = evaluate(&cm);
        assert_eq!(status, HealthStatus::Healthy);
        assert_eq!(details["data_keys"], "2");

        let secret = resource("Secret", json!({}));
        assert_eq!(evaluate(&secret).0, HealthStatus::Healthy);
    }

    #[test]
    fn unmonitored_kind_is_unknown() {
        let cron = resource("CronJob", json!({}));
        let (status, details) = evaluate(&cron);
        assert_eq!(status, HealthStatus::Unknown);
        assert!(details["error"].contains("CronJob"));
    }
}
