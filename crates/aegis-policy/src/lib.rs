//! # Aegis Policy
//!
//! Disaster-recovery policy engine for the Aegis platform.
//!
//! Operators declare [`DrPolicy`] objects naming the namespaces they
//! protect and the recovery objectives those namespaces must meet. The
//! [`PolicyEngine`] evaluates every enabled policy against the backup
//! manager's live state and reports violations:
//!
//! - `missing_backup`: a covered namespace has no backup job at all
//! - `rpo`: the newest completed backup is older than the policy allows
//!   (or no completed backup exists, which is always critical)
//! - `rto`: the estimated restore time for the newest backup exceeds the
//!   objective
//! - `retention`: a job retains backups for less time than the policy
//!   requires
//!
//! Violation severity is a pure function of policy priority and violation
//! type, so reports are deterministic and testable. The engine can also
//! remediate: [`PolicyEngine::auto_remediate`] triggers a backup for each
//! namespace currently violating its RPO or missing backups entirely.

#![warn(clippy::all)]

pub mod engine;
pub mod error;
pub mod policy;

pub use engine::{estimated_recovery_minutes, PolicyEngine, RECOVERY_RATE_BYTES_PER_MINUTE};
pub use error::{PolicyError, Result};
pub use policy::{
    ComplianceReport, ComplianceStatus, ComplianceViolation, DrPolicy, PolicySpec, Severity,
    ViolationType,
};
