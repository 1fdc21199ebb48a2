//! Deterministic, lockfile-driven installation with recovery and rollback.
//!
//! # Architecture
//!
//! - [`plan`] - read-only diff of the lockfile against final and staged files
//! - [`installer`] - fetch or resume into staging, verify, extract, promote
//! - [`quarantine`] - move corrupted live files aside instead of deleting them
//! - [`snapshot`] - last-known-good manifests and stored bytes
//! - [`rollback`] - restore a snapshot through the same staged discipline
//! - [`decision`] - structured decision log and hooks
//!
//! The lockfile (forward) or a snapshot manifest (rollback) is the only
//! source of expected checksums and sizes. Nothing reported by a remote
//! server is consulted when judging bytes.

pub mod config;
pub mod decision;
mod error;
pub mod installer;
pub mod plan;
pub mod quarantine;
pub mod rollback;
pub mod snapshot;

pub use config::{InstallConfig, RepairPolicy};
pub use decision::{Authority, Decision, DecisionHook, DecisionKind, DecisionRecorder, ReasonCode};
pub use error::{CheckLocation, InstallError, Result, RollbackError};
pub use installer::{InstallReport, Installer};
pub use plan::{ArtifactPlan, InstallPlan, PlanAction, plan_install};
pub use quarantine::Quarantine;
pub use rollback::{RollbackExecutor, RollbackPhase, RollbackReport};
pub use snapshot::{ManifestDocument, SnapshotArtifact, SnapshotManifest, SnapshotStore};
