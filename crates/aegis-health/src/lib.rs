//! # Aegis Health
//!
//! Resource health monitoring for the Aegis platform.
//!
//! The [`HealthChecker`] evaluates a closed set of Kubernetes kinds
//! (Deployment, StatefulSet, DaemonSet, Service, Pod, ConfigMap, Secret,
//! PersistentVolumeClaim) through small pure per-kind evaluators, caches
//! the latest check per resource, keeps a bounded rolling history, and
//! aggregates everything into operator-facing summaries.
//!
//! The evaluator contract is `evaluate(resource) -> (status, details)`
//! with the closed four-state status set; the field inspection inside
//! each evaluator is deliberately replaceable.

#![warn(clippy::all)]

pub mod checker;
pub mod error;
pub mod evaluators;
pub mod types;

pub use checker::{HealthChecker, HISTORY_LIMIT};
pub use error::{HealthError, Result};
pub use evaluators::evaluate;
pub use types::{HealthCheck, HealthStatus, HealthSummary, NamespaceHealth};
