//! # Aegis Core
//!
//! Shared Kubernetes primitives for the Aegis backup and disaster-recovery
//! platform.
//!
//! This crate defines the resource model captured by backups
//! ([`KubernetesResource`]) and the capability contract
//! ([`KubernetesProvider`]) through which the engine crates talk to a
//! cluster. The contract is deliberately small: list, apply, delete and
//! existence checks on typed, namespaced resources. Concrete client
//! implementations (kube-rs, fixtures, recorded clusters) live outside the
//! core and plug in behind the trait.
//!
//! A programmable [`mock::MockProvider`] ships here so that every engine
//! crate can exercise its logic against a scripted cluster without network
//! access.

#![warn(clippy::all)]

pub mod error;
pub mod mock;
pub mod provider;
pub mod resource;

pub use error::{CoreError, CoreResult};
pub use provider::KubernetesProvider;
pub use resource::{KubernetesResource, ResourceKind};
