//! Programmable in-memory provider for tests and local development.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::{CoreError, CoreResult};
use crate::provider::KubernetesProvider;
use crate::resource::KubernetesResource;

fn slot(namespace: &str, kind: &str) -> String {
    format!("{}/{}", namespace, kind)
}

#[derive(Default)]
struct MockState {
    resources: HashMap<String, Vec<KubernetesResource>>,
    failures: HashMap<String, String>,
}

/// An in-memory [`KubernetesProvider`] with scripted contents and
/// scripted failures.
///
/// Resources are keyed by `(namespace, kind)`. A failure registered for a
/// `(namespace, kind)` pair makes every contract method touching that pair
/// return a provider error, which is how tests exercise partial and total
/// collection failures.
#[derive(Default)]
pub struct MockProvider {
    state: RwLock<MockState>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a resource into the fake cluster.
    pub async fn add_resource(&self, resource: KubernetesResource) {
        let key = slot(&resource.namespace, &resource.kind);
        let mut state = self.state.write().await;
        state.resources.entry(key).or_default().push(resource);
    }

    /// Script a provider failure for every operation on `(kind, namespace)`.
    pub async fn fail_on(&self, kind: &str, namespace: &str, message: &str) {
        let mut state = self.state.write().await;
        state
            .failures
            .insert(slot(namespace, kind), message.to_string());
    }

    async fn check_failure(&self, kind: &str, namespace: &str) -> CoreResult<()> {
        let state = self.state.read().await;
        match state.failures.get(&slot(namespace, kind)) {
            Some(message) => Err(CoreError::Provider(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl KubernetesProvider for MockProvider {
    async fn list_resources(
        &self,
        kind: &str,
        namespace: &str,
    ) -> CoreResult<Vec<KubernetesResource>> {
        self.check_failure(kind, namespace).await?;
        let state = self.state.read().await;
        Ok(state
            .resources
            .get(&slot(namespace, kind))
            .cloned()
            .unwrap_or_default())
    }

    async fn apply_resource(&self, resource: &KubernetesResource) -> CoreResult<()> {
        self.check_failure(&resource.kind, &resource.namespace)
            .await?;
        let key = slot(&resource.namespace, &resource.kind);
        let mut state = self.state.write().await;
        let entries = state.resources.entry(key).or_default();
        entries.retain(|r| r.name != resource.name);
        entries.push(resource.clone());
        Ok(())
    }

    async fn delete_resource(&self, kind: &str, name: &str, namespace: &str) -> CoreResult<()> {
        self.check_failure(kind, namespace).await?;
        let mut state = self.state.write().await;
        match state.resources.get_mut(&slot(namespace, kind)) {
            Some(entries) => {
                let before = entries.len();
                entries.retain(|r| r.name != name);
                if entries.len() == before {
                    Err(CoreError::NotFound(format!(
                        "{}/{}/{}",
                        namespace, kind, name
                    )))
                } else {
                    Ok(())
                }
            }
            None => Err(CoreError::NotFound(format!(
                "{}/{}/{}",
                namespace, kind, name
            ))),
        }
    }

    async fn resource_exists(&self, kind: &str, name: &str, namespace: &str) -> CoreResult<bool> {
        self.check_failure(kind, namespace).await?;
        let state = self.state.read().await;
        Ok(state
            .resources
            .get(&slot(namespace, kind))
            .map(|entries| entries.iter().any(|r| r.name == name))
            .unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_kind_lists_as_empty_vec() {
        let provider = MockProvider::new();
        let listed = provider.list_resources("Pod", "default").await.unwrap();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn scripted_resources_roundtrip() {
        let provider = MockProvider::new();
        provider
            .add_resource(KubernetesResource::new("Deployment", "web", "production"))
            .await;

        let listed = provider
            .list_resources("Deployment", "production")
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert!(provider
            .resource_exists("Deployment", "web", "production")
            .await
            .unwrap());

        provider
            .delete_resource("Deployment", "web", "production")
            .await
            .unwrap();
        assert!(!provider
            .resource_exists("Deployment", "web", "production")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn scripted_failures_surface_as_provider_errors() {
        let provider = MockProvider::new();
        provider
            .fail_on("Secret", "production", "forbidden: secrets are locked")
            .await;

        let err = provider
            .list_resources("Secret", "production")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("forbidden"));
    }
}
