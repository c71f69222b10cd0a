//! Backup manifest: the structured index of what a backup captured.

use aegis_core::KubernetesResource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// File name of the manifest entry inside the archive and of the plaintext
/// sidecar stored next to it.
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Index of a single backup: what was captured, when, from where, and the
/// integrity checksum of the compressed archive.
///
/// The manifest is stored twice: as the final entry inside the archive
/// (self-contained portability) and as a plaintext JSON sidecar under the
/// same record prefix (cheap indexing). The sidecar carries the checksum;
/// the in-archive copy cannot, since the checksum covers the compressed
/// bytes the copy is part of.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupManifest {
    pub backup_id: Uuid,
    pub job_id: Uuid,
    pub namespace: String,
    pub resource_types: Vec<String>,
    pub resources: Vec<KubernetesResource>,
    pub resource_count: usize,
    pub created_at: DateTime<Utc>,
    /// Hex-encoded SHA-256 of the gzip(tar) stream, computed before any
    /// encryption. Empty in the in-archive copy.
    pub checksum: String,
}

impl BackupManifest {
    /// Assemble the manifest for an execution. The checksum is filled in
    /// after the archive is built.
    pub fn new(
        backup_id: Uuid,
        job_id: Uuid,
        namespace: impl Into<String>,
        resource_types: Vec<String>,
        resources: Vec<KubernetesResource>,
    ) -> Self {
        let resource_count = resources.len();
        Self {
            backup_id,
            job_id,
            namespace: namespace.into(),
            resource_types,
            resources,
            resource_count,
            created_at: Utc::now(),
            checksum: String::new(),
        }
    }
}
