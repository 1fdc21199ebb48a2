//! Snapshot-based rollback.
//!
//! ```text
//! SelectSnapshot -> LoadManifest -> VerifyInSnapshot -> QuarantineCorruptLive
//!   -> BackupLive -> PromoteFromRollbackStaging -> VerifyFinal -> Cleanup
//! ```
//!
//! Nothing live is touched before every stored artifact has been copied to
//! rollback staging and re-verified there.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use stager_fs::{InstanceLock, PromoteOptions, Workspace, copy_file, promote, remove_dir_all_if_exists};
use stager_verify::{Verdict, verify_file};
use tracing::{info, warn};

use crate::config::InstallConfig;
use crate::decision::{Authority, Decision, DecisionHook, DecisionKind, DecisionLog, Expected, Observed, ReasonCode};
use crate::error::{CheckLocation, InstallError, RollbackError};
use crate::quarantine::Quarantine;
use crate::snapshot::{SnapshotArtifact, SnapshotManifest, SnapshotStore};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackPhase {
    SelectSnapshot,
    LoadManifest,
    VerifyInSnapshot,
    QuarantineCorruptLive,
    BackupLive,
    PromoteFromRollbackStaging,
    VerifyFinal,
    Cleanup,
}

impl fmt::Display for RollbackPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RollbackPhase::SelectSnapshot => "select_snapshot",
            RollbackPhase::LoadManifest => "load_manifest",
            RollbackPhase::VerifyInSnapshot => "verify_in_snapshot",
            RollbackPhase::QuarantineCorruptLive => "quarantine_corrupt_live",
            RollbackPhase::BackupLive => "backup_live",
            RollbackPhase::PromoteFromRollbackStaging => "promote_from_rollback_staging",
            RollbackPhase::VerifyFinal => "verify_final",
            RollbackPhase::Cleanup => "cleanup",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackReport {
    pub snapshot_id:       String,
    pub restored_count:    usize,
    pub skipped_count:     usize,
    pub quarantined_count: usize,
}

type Result<T> = std::result::Result<T, RollbackError>;

trait AtPhase<T> {
    fn at(self, phase: RollbackPhase) -> Result<T>;
}

impl<T, E: Into<InstallError>> AtPhase<T> for std::result::Result<T, E> {
    fn at(self, phase: RollbackPhase) -> Result<T> { self.map_err(|e| RollbackError::new(phase, e)) }
}

/// One manifest entry with its resolved locations.
struct Target<'a> {
    artifact:   &'a SnapshotArtifact,
    live_path:  PathBuf,
    staged:     PathBuf,
    restore:    Option<ReasonCode>,
    backup:     Option<PathBuf>,
}

/// Restores the live tree to a snapshot on explicit request.
pub struct RollbackExecutor {
    config:          InstallConfig,
    decisions:       DecisionLog,
    promote_options: PromoteOptions,
}

impl RollbackExecutor {
    pub fn new(config: InstallConfig) -> Self {
        Self {
            config,
            decisions: DecisionLog::default(),
            promote_options: PromoteOptions::default(),
        }
    }

    pub fn hook(mut self, hook: Arc<dyn DecisionHook>) -> Self {
        self.decisions.push(hook);
        self
    }

    pub fn promote_options(mut self, options: PromoteOptions) -> Self {
        self.promote_options = options;
        self
    }

    /// Restore `snapshot_id`, or the newest loadable snapshot when `None`.
    ///
    /// Selecting and loading the snapshot performs no writes, so a missing
    /// or unusable snapshot leaves the instance untouched.
    pub fn execute_rollback(&self, snapshot_id: Option<&str>) -> Result<RollbackReport> {
        let store = SnapshotStore::new(&self.config.snapshot_root);

        let manifest = self.select(&store, snapshot_id)?;
        let snapshot_id = manifest.snapshot_id.clone();

        let staging_root = self.config.rollback_staging_root.join(&snapshot_id);
        let mut targets = manifest
            .artifacts
            .iter()
            .map(|artifact| {
                self.config
                    .roots
                    .resolve(&artifact.relative_path)
                    .map(|live_path| Target {
                        artifact,
                        live_path,
                        staged: Workspace::persistent(&staging_root).path_for(&artifact.relative_path),
                        restore: None,
                        backup: None,
                    })
                    .map_err(|e| InstallError::SnapshotManifestInvalid {
                        snapshot_id: snapshot_id.clone(),
                        reason:      e.to_string(),
                    })
            })
            .collect::<std::result::Result<Vec<_>, _>>()
            .at(RollbackPhase::LoadManifest)?;

        self.enter(RollbackPhase::VerifyInSnapshot, &snapshot_id);
        let _lock = InstanceLock::try_acquire(&self.config.lock_path)
            .map_err(|e| match e {
                e @ stager_fs::Error::Locked { .. } => InstallError::Locked { source: e },
                other => InstallError::Fs(other),
            })
            .at(RollbackPhase::VerifyInSnapshot)?;
        let staging = Workspace::ephemeral(&staging_root).at(RollbackPhase::VerifyInSnapshot)?;
        for target in &targets {
            self.verify_in_snapshot(&store, &snapshot_id, target)
                .at(RollbackPhase::VerifyInSnapshot)?;
        }

        self.enter(RollbackPhase::QuarantineCorruptLive, &snapshot_id);
        let quarantine = Quarantine::new(&self.config.quarantine_root);
        let mut report = RollbackReport {
            snapshot_id: snapshot_id.clone(),
            restored_count: 0,
            skipped_count: 0,
            quarantined_count: 0,
        };
        for target in &mut targets {
            let artifact = target.artifact;
            let live = verify_file(&target.live_path, &artifact.checksum, Some(artifact.size))
                .at(RollbackPhase::QuarantineCorruptLive)?;
            match &live {
                Verdict::Verified { .. } => {
                    self.record(artifact, DecisionKind::Skip, ReasonCode::LiveVerified, &live);
                    report.skipped_count += 1;
                }
                Verdict::Missing => target.restore = Some(ReasonCode::LiveMissing),
                Verdict::SizeMismatch { .. } | Verdict::ChecksumMismatch { .. } => {
                    if quarantine
                        .quarantine(&target.live_path, &artifact.logical_name, &artifact.relative_path)
                        .is_some()
                    {
                        report.quarantined_count += 1;
                    }
                    self.record(
                        artifact,
                        DecisionKind::QuarantineThenRedownload,
                        ReasonCode::LiveChecksumMismatch,
                        &live,
                    );
                    target.restore = Some(ReasonCode::LiveChecksumMismatch);
                }
            }
        }

        self.enter(RollbackPhase::BackupLive, &snapshot_id);
        let backup_root = self.config.rollback_backup_root.join(&snapshot_id);
        for target in targets.iter_mut().filter(|t| t.restore.is_some() && t.live_path.exists()) {
            let backup = Workspace::persistent(&backup_root).path_for(&target.artifact.relative_path);
            match promote(&target.live_path, &backup, self.promote_options) {
                Ok(_) => target.backup = Some(backup),
                Err(e) => warn!(
                    artifact = %target.artifact.logical_name,
                    error = %e,
                    "backup failed; restoring without a safety net for this file"
                ),
            }
        }

        self.enter(RollbackPhase::PromoteFromRollbackStaging, &snapshot_id);
        for target in targets.iter().filter(|t| t.restore.is_some()) {
            if let Err(e) = self.restore_one(target) {
                self.restore_backups(&targets, &backup_root);
                return Err(e);
            }
            report.restored_count += 1;
        }

        self.enter(RollbackPhase::Cleanup, &snapshot_id);
        if let Err(e) = staging.discard() {
            warn!(error = %e, "failed to remove rollback staging");
        }
        if let Err(e) = remove_dir_all_if_exists(&backup_root) {
            warn!(error = %e, "failed to remove rollback backups");
        }

        info!(
            instance = %self.config.instance_id,
            snapshot = %snapshot_id,
            restored = report.restored_count,
            skipped = report.skipped_count,
            quarantined = report.quarantined_count,
            "rollback complete"
        );
        Ok(report)
    }

    fn select(&self, store: &SnapshotStore, snapshot_id: Option<&str>) -> Result<SnapshotManifest> {
        self.enter(RollbackPhase::SelectSnapshot, snapshot_id.unwrap_or("latest"));
        match snapshot_id {
            Some(id) => {
                if !store.snapshot_dir(id).is_dir() {
                    return Err(RollbackError::new(
                        RollbackPhase::SelectSnapshot,
                        InstallError::SnapshotNotFound(id.to_string()),
                    ));
                }
                self.enter(RollbackPhase::LoadManifest, id);
                store.load(id).at(RollbackPhase::LoadManifest)
            }
            None => {
                let manifest = store
                    .latest_loadable()
                    .at(RollbackPhase::SelectSnapshot)?
                    .ok_or_else(|| InstallError::NoSnapshotsAvailable {
                        root: store.root().to_path_buf(),
                    })
                    .at(RollbackPhase::SelectSnapshot)?;
                self.enter(RollbackPhase::LoadManifest, &manifest.snapshot_id);
                Ok(manifest)
            }
        }
    }

    /// Copy stored bytes into rollback staging and check them there.
    fn verify_in_snapshot(&self, store: &SnapshotStore, snapshot_id: &str, target: &Target<'_>) -> std::result::Result<(), InstallError> {
        let artifact = target.artifact;
        let stored = store.artifact_path(snapshot_id, &artifact.relative_path);
        if !stored.is_file() {
            return Err(InstallError::SnapshotArtifactMissing {
                snapshot_id: snapshot_id.to_string(),
                artifact:    artifact.logical_name.clone(),
                path:        stored,
            });
        }

        copy_file(&stored, &target.staged)?;
        let verdict = verify_file(&target.staged, &artifact.checksum, Some(artifact.size))?;
        if verdict.is_verified() {
            return Ok(());
        }

        self.record(artifact, DecisionKind::Fail, ReasonCode::SnapshotChecksumMismatch, &verdict);
        Err(match verdict {
            Verdict::SizeMismatch { observed_size } => InstallError::SizeMismatch {
                artifact: artifact.logical_name.clone(),
                location: CheckLocation::Snapshot,
                expected: artifact.size,
                observed: observed_size,
            },
            Verdict::ChecksumMismatch { observed } | Verdict::Verified { observed } => InstallError::ChecksumMismatch {
                artifact: artifact.logical_name.clone(),
                location: CheckLocation::Snapshot,
                expected: artifact.checksum.to_string(),
                observed: format!("{}:{}", observed.algorithm, observed.hex),
            },
            Verdict::Missing => InstallError::SnapshotArtifactMissing {
                snapshot_id: snapshot_id.to_string(),
                artifact:    artifact.logical_name.clone(),
                path:        target.staged.clone(),
            },
        })
    }

    fn restore_one(&self, target: &Target<'_>) -> Result<()> {
        let artifact = target.artifact;
        if let Err(source) = promote(&target.staged, &target.live_path, self.promote_options) {
            self.record(artifact, DecisionKind::Fail, ReasonCode::PromotionFailed, Observed::default());
            return Err(RollbackError::new(RollbackPhase::PromoteFromRollbackStaging, InstallError::Promotion {
                artifact: artifact.logical_name.clone(),
                source,
            }));
        }

        let verdict = verify_file(&target.live_path, &artifact.checksum, Some(artifact.size))
            .at(RollbackPhase::VerifyFinal)?;
        if !verdict.is_verified() {
            self.record(artifact, DecisionKind::Fail, ReasonCode::FinalChecksumMismatch, &verdict);
            return Err(RollbackError::new(RollbackPhase::VerifyFinal, InstallError::ChecksumMismatch {
                artifact: artifact.logical_name.clone(),
                location: CheckLocation::Final,
                expected: artifact.checksum.to_string(),
                observed: verdict.observed_prefix().unwrap_or("none").to_string(),
            }));
        }

        let reason = target.restore.unwrap_or(ReasonCode::SnapshotVerified);
        self.record(artifact, DecisionKind::Promote, reason, &verdict);
        Ok(())
    }

    /// Best-effort: move every backup back over its live path.
    ///
    /// The backup tree is removed only once nothing is left in it to recover.
    fn restore_backups(&self, targets: &[Target<'_>], backup_root: &Path) {
        let mut stranded = 0;
        for target in targets {
            let Some(backup) = &target.backup else { continue };
            match promote(backup, &target.live_path, self.promote_options) {
                Ok(_) => info!(artifact = %target.artifact.logical_name, "restored pre-rollback backup"),
                Err(e) => {
                    stranded += 1;
                    warn!(
                        artifact = %target.artifact.logical_name,
                        backup = %backup.display(),
                        error = %e,
                        "failed to restore pre-rollback backup"
                    );
                }
            }
        }

        if stranded > 0 {
            warn!(backup_root = %backup_root.display(), stranded, "keeping rollback backups for manual recovery");
        } else if let Err(e) = remove_dir_all_if_exists(backup_root) {
            warn!(error = %e, "failed to remove rollback backups");
        }
    }

    fn enter(&self, phase: RollbackPhase, snapshot: &str) {
        info!(instance = %self.config.instance_id, %phase, snapshot, "rollback phase");
    }

    fn record(&self, artifact: &SnapshotArtifact, kind: DecisionKind, reason: ReasonCode, observed: impl Into<Observed>) {
        self.decisions.emit(
            Decision::new(
                Authority::SnapshotManifest,
                &artifact.logical_name,
                &artifact.relative_path,
                kind,
                reason,
                Expected::from_checksum(&artifact.checksum, Some(artifact.size)),
            )
            .observed(observed),
        );
    }
}
