use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use stager_archive::Error as ArchiveError;
use stager_fetch::FetchError;
use stager_lock::LockError;
use stager_verify::VerifyError;

use crate::rollback::RollbackPhase;

/// Where a checksum or size check failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckLocation {
    Staging,
    Final,
    Snapshot,
}

impl fmt::Display for CheckLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CheckLocation::Staging => "staging",
            CheckLocation::Final => "final location",
            CheckLocation::Snapshot => "snapshot",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error("{}", describe_unsupported(.kinds))]
    UnsupportedArtifactKind { kinds: BTreeMap<String, usize> },

    #[error("lockfile '{path}' is invalid: {source}")]
    LockfileInvalid { path: PathBuf, source: LockError },

    #[error("checksum mismatch for '{artifact}' in {location}: expected {expected}, observed {observed}")]
    ChecksumMismatch {
        artifact: String,
        location: CheckLocation,
        expected: String,
        observed: String,
    },

    #[error("size mismatch for '{artifact}' in {location}: expected {expected} bytes, observed {observed}")]
    SizeMismatch {
        artifact: String,
        location: CheckLocation,
        expected: u64,
        observed: u64,
    },

    #[error("expected artifact '{artifact}' is missing at '{path}'")]
    MissingExpectedArtifact { artifact: String, path: PathBuf },

    #[error("failed to fetch '{artifact}': {source}")]
    Fetch { artifact: String, source: FetchError },

    #[error("failed to extract '{artifact}': {source}")]
    Extraction { artifact: String, source: ArchiveError },

    #[error("failed to promote '{artifact}': {source}")]
    Promotion { artifact: String, source: stager_fs::Error },

    #[error("snapshot '{snapshot_id}' is unusable: {reason}")]
    SnapshotManifestInvalid { snapshot_id: String, reason: String },

    #[error("snapshot '{snapshot_id}' has no stored bytes for '{artifact}' (expected at '{path}')")]
    SnapshotArtifactMissing {
        snapshot_id: String,
        artifact:    String,
        path:        PathBuf,
    },

    #[error("snapshot '{0}' does not exist")]
    SnapshotNotFound(String),

    #[error("no snapshots found under '{root}'")]
    NoSnapshotsAvailable { root: PathBuf },

    #[error("another install or rollback is running for this instance: {source}")]
    Locked { source: stager_fs::Error },

    #[error("invalid configuration '{path}': {message}")]
    Config { path: PathBuf, message: String },

    #[error("filesystem worker stopped unexpectedly: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Verify(#[from] VerifyError),

    #[error(transparent)]
    Fs(#[from] stager_fs::Error),
}

pub type Result<T> = std::result::Result<T, InstallError>;

fn describe_unsupported(kinds: &BTreeMap<String, usize>) -> String {
    let listed = kinds
        .iter()
        .map(|(kind, count)| {
            let noun = if *count == 1 { "artifact" } else { "artifacts" };
            format!("'{kind}' ({count} {noun})")
        })
        .collect::<Vec<_>>()
        .join(", ");
    let names = kinds.keys().map(String::as_str).collect::<Vec<_>>().join("/");
    format!(
        "lockfile declares artifact kinds this build cannot install: {listed}; \
         delete the lockfile to regenerate it without '{names}' artifacts"
    )
}

/// A rollback failure and the phase it happened in.
#[derive(Debug, thiserror::Error)]
#[error("rollback failed during {phase}")]
pub struct RollbackError {
    pub phase:  RollbackPhase,
    #[source]
    pub source: InstallError,
}

impl RollbackError {
    pub fn new(phase: RollbackPhase, source: impl Into<InstallError>) -> Self {
        Self {
            phase,
            source: source.into(),
        }
    }

    pub fn kind(&self) -> &InstallError { &self.source }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_kind_message_names_kinds_and_remediation() {
        let kinds = BTreeMap::from([("installer-profile".to_string(), 2), ("script".to_string(), 1)]);
        let message = InstallError::UnsupportedArtifactKind { kinds }.to_string();

        assert!(message.contains("'installer-profile' (2 artifacts)"));
        assert!(message.contains("'script' (1 artifact)"));
        assert!(message.contains("delete the lockfile to regenerate it without 'installer-profile/script'"));
    }

    #[test]
    fn rollback_error_keeps_phase_and_cause() {
        let err = RollbackError::new(RollbackPhase::SelectSnapshot, InstallError::NoSnapshotsAvailable {
            root: PathBuf::from("/srv/pack/.rollback"),
        });

        assert_eq!(err.to_string(), "rollback failed during select_snapshot");
        assert!(matches!(err.kind(), InstallError::NoSnapshotsAvailable { .. }));
        let cause = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(cause.as_deref(), Some("no snapshots found under '/srv/pack/.rollback'"));
    }
}
