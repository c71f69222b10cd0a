//! The health checker: evaluation driver, latest-check cache and bounded
//! history.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use aegis_core::{CoreError, KubernetesProvider, ResourceKind};

use crate::error::{HealthError, Result};
use crate::evaluators;
use crate::types::{resource_key, HealthCheck, HealthStatus, HealthSummary, NamespaceHealth};

/// Rolling history kept per resource.
pub const HISTORY_LIMIT: usize = 100;

/// Periodic per-resource health evaluation over the monitored kinds.
///
/// Latest checks are cached by `{namespace}/{kind}/{name}`; each key also
/// keeps a rolling history bounded at [`HISTORY_LIMIT`] entries.
pub struct HealthChecker {
    provider: Arc<dyn KubernetesProvider>,
    checks: RwLock<HashMap<String, HealthCheck>>,
    history: RwLock<HashMap<String, Vec<HealthCheck>>>,
}

impl HealthChecker {
    pub fn new(provider: Arc<dyn KubernetesProvider>) -> Self {
        Self {
            provider,
            checks: RwLock::new(HashMap::new()),
            history: RwLock::new(HashMap::new()),
        }
    }

    /// Evaluate every monitored kind in a namespace.
    ///
    /// Kinds the provider fails to list are skipped with a warning; the
    /// call only errors when every kind fails, which means the namespace
    /// is effectively unreachable.
    pub async fn check_namespace(&self, namespace: &str) -> Result<Vec<HealthCheck>> {
        let mut performed = Vec::new();
        let mut failures = Vec::new();

        for kind in ResourceKind::ALL {
            match self
                .provider
                .list_resources(kind.as_str(), namespace)
                .await
            {
                Ok(resources) => {
                    for resource in &resources {
                        let (status, details) = evaluators::evaluate(resource);
                        let check = HealthCheck::new(
                            resource.kind.clone(),
                            resource.name.clone(),
                            resource.namespace.clone(),
                            status,
                            details,
                        );
                        self.record(check.clone()).await;
                        performed.push(check);
                    }
                }
                Err(error) => {
                    warn!(namespace, kind = kind.as_str(), %error, "failed to list kind");
                    failures.push(format!("{}: {}", kind, error));
                }
            }
        }

        if performed.is_empty() && failures.len() == ResourceKind::ALL.len() {
            return Err(HealthError::Provider(CoreError::Provider(
                failures.join("; "),
            )));
        }

        debug!(namespace, checks = performed.len(), "namespace health evaluated");
        Ok(performed)
    }

    /// Evaluate a single resource explicitly.
    ///
    /// A resource the cluster reports as absent is `unhealthy`; a
    /// provider failure yields `unknown`. Both outcomes are recorded like
    /// any other check.
    pub async fn check_resource(
        &self,
        kind: &str,
        name: &str,
        namespace: &str,
    ) -> HealthCheck {
        let check = match self.provider.resource_exists(kind, name, namespace).await {
            Err(error) => {
                let mut details = HashMap::new();
                details.insert("error".to_string(), error.to_string());
                HealthCheck::new(kind, name, namespace, HealthStatus::Unknown, details)
            }
            Ok(false) => {
                let mut details = HashMap::new();
                details.insert("error".to_string(), "resource not found".to_string());
                HealthCheck::new(kind, name, namespace, HealthStatus::Unhealthy, details)
            }
            Ok(true) => match self.provider.list_resources(kind, namespace).await {
                Err(error) => {
                    let mut details = HashMap::new();
                    details.insert("error".to_string(), error.to_string());
                    HealthCheck::new(kind, name, namespace, HealthStatus::Unknown, details)
                }
                Ok(resources) => match resources.iter().find(|r| r.name == name) {
                    Some(resource) => {
                        let (status, details) = evaluators::evaluate(resource);
                        HealthCheck::new(kind, name, namespace, status, details)
                    }
                    None => {
                        let mut details = HashMap::new();
                        details
                            .insert("error".to_string(), "resource not listed".to_string());
                        HealthCheck::new(kind, name, namespace, HealthStatus::Unknown, details)
                    }
                },
            },
        };

        self.record(check.clone()).await;
        check
    }

    /// The latest check for a resource, if one was recorded.
    pub async fn get_check(&self, namespace: &str, kind: &str, name: &str) -> Option<HealthCheck> {
        self.checks
            .read()
            .await
            .get(&resource_key(namespace, kind, name))
            .cloned()
    }

    /// Latest checks for every monitored resource, in key order.
    pub async fn list_checks(&self) -> Vec<HealthCheck> {
        let checks = self.checks.read().await;
        let mut keys: Vec<&String> = checks.keys().collect();
        keys.sort();
        keys.into_iter()
            .filter_map(|k| checks.get(k).cloned())
            .collect()
    }

    /// Rolling history for a resource, oldest first.
    pub async fn history(&self, namespace: &str, kind: &str, name: &str) -> Vec<HealthCheck> {
        self.history
            .read()
            .await
            .get(&resource_key(namespace, kind, name))
            .cloned()
            .unwrap_or_default()
    }

    /// Latest checks currently reporting `unhealthy`.
    pub async fn unhealthy_resources(&self) -> Vec<HealthCheck> {
        self.list_checks()
            .await
            .into_iter()
            .filter(|c| c.status == HealthStatus::Unhealthy)
            .collect()
    }

    /// Aggregate the latest checks into a summary.
    pub async fn summary(&self) -> HealthSummary {
        let checks = self.checks.read().await;
        let mut summary = HealthSummary {
            timestamp: chrono::Utc::now(),
            total_resources: checks.len(),
            healthy_count: 0,
            degraded_count: 0,
            unhealthy_count: 0,
            unknown_count: 0,
            namespaces: HashMap::new(),
        };

        for check in checks.values() {
            let ns = summary
                .namespaces
                .entry(check.namespace.clone())
                .or_insert_with(NamespaceHealth::default);
            ns.total += 1;
            match check.status {
                HealthStatus::Healthy => {
                    summary.healthy_count += 1;
                    ns.healthy += 1;
                }
                HealthStatus::Degraded => {
                    summary.degraded_count += 1;
                    ns.degraded += 1;
                }
                HealthStatus::Unhealthy => {
                    summary.unhealthy_count += 1;
                    ns.unhealthy += 1;
                }
                HealthStatus::Unknown => {
                    summary.unknown_count += 1;
                    ns.unknown += 1;
                }
            }
        }
        summary
    }

    async fn record(&self, check: HealthCheck) {
        let key = check.key();
        self.checks.write().await.insert(key.clone(), check.clone());

        let mut history = self.history.write().await;
        let entries = history.entry(key).or_default();
        entries.push(check);
        if entries.len() > HISTORY_LIMIT {
            let excess = entries.len() - HISTORY_LIMIT;
            entries.drain(..excess);
        }
    }
}
