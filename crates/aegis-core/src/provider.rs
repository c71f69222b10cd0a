//! The Kubernetes capability contract.

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::resource::KubernetesResource;

/// Capability contract for talking to a Kubernetes cluster.
///
/// Implementations wrap a real client, a fixture set, or a recorded
/// cluster. All methods operate on typed, namespaced resources identified
/// by kind name.
#[async_trait]
pub trait KubernetesProvider: Send + Sync {
    /// List all resources of a kind in a namespace.
    ///
    /// Returns an empty vector, not an error, when the kind has no
    /// instances in the namespace.
    async fn list_resources(
        &self,
        kind: &str,
        namespace: &str,
    ) -> CoreResult<Vec<KubernetesResource>>;

    /// Apply (create or update) a resource from its captured manifest.
    async fn apply_resource(&self, resource: &KubernetesResource) -> CoreResult<()>;

    /// Delete a resource by kind, name and namespace.
    async fn delete_resource(&self, kind: &str, name: &str, namespace: &str) -> CoreResult<()>;

    /// Check whether a resource exists.
    async fn resource_exists(&self, kind: &str, name: &str, namespace: &str) -> CoreResult<bool>;
}
