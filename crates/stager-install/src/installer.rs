//! Forward installation: fetch or resume into staging, verify, promote.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use stager_archive::{Extractor, ZipExtractor};
use stager_fetch::{Fetch, FetchError, FetchOptions};
use stager_fs::{InstanceLock, PromoteOptions, promote, remove_dir_all_if_exists, remove_file_if_exists};
use stager_lock::{Artifact, ArtifactKind, Lockfile};
use stager_verify::{Verdict, verify_file};
use tracing::{error, info, warn};

use crate::config::{InstallConfig, RepairPolicy};
use crate::decision::{Authority, Decision, DecisionHook, DecisionKind, DecisionLog, Expected, Observed, ReasonCode};
use crate::error::{CheckLocation, InstallError, Result};
use crate::plan::{ArtifactPlan, InstallPlan, PlanAction, plan_install};
use crate::quarantine::Quarantine;
use crate::snapshot::{SnapshotArtifact, SnapshotStore};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallReport {
    pub installed_count: usize,
    pub verified_count:  usize,
    pub skipped_count:   usize,
    /// Snapshot recorded by this run, if one was needed and succeeded.
    pub snapshot_id:     Option<String>,
}

/// Executes install plans for one instance.
///
/// The fetcher is only ever asked for artifacts that are neither installed
/// nor resumable from staging. Every staged file is re-verified immediately
/// before promotion and every promoted file right after. Hashing, extraction,
/// promotion and snapshot copies run on tokio's blocking pool.
pub struct Installer<F, X = ZipExtractor> {
    config:          InstallConfig,
    fetcher:         F,
    extractor:       Arc<X>,
    decisions:       DecisionLog,
    promote_options: PromoteOptions,
}

impl<F: Fetch> Installer<F> {
    pub fn new(config: InstallConfig, fetcher: F) -> Self {
        Self {
            config,
            fetcher,
            extractor: Arc::new(ZipExtractor::default()),
            decisions: DecisionLog::default(),
            promote_options: PromoteOptions::default(),
        }
    }
}

impl<F: Fetch, X: Extractor + 'static> Installer<F, X> {
    pub fn with_extractor<Y: Extractor + 'static>(self, extractor: Y) -> Installer<F, Y> {
        Installer {
            config: self.config,
            fetcher: self.fetcher,
            extractor: Arc::new(extractor),
            decisions: self.decisions,
            promote_options: self.promote_options,
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

    pub fn config(&self) -> &InstallConfig { &self.config }

    /// Read and validate the configured lockfile. Never writes it.
    pub fn load_lockfile(&self) -> Result<Lockfile> {
        Lockfile::load(&self.config.lockfile).map_err(|source| InstallError::LockfileInvalid {
            path: self.config.lockfile.clone(),
            source,
        })
    }

    pub fn plan(&self) -> Result<InstallPlan> { plan_install(&self.load_lockfile()?, &self.config) }

    pub async fn install_from_lockfile(&self) -> Result<InstallReport> {
        let lockfile = self.load_lockfile()?;
        self.install(&lockfile).await
    }

    /// Bring the live tree in line with `lockfile`.
    ///
    /// Artifacts are processed in lockfile order. The first unrecoverable
    /// error stops the run; artifacts promoted before it stay promoted.
    pub async fn install(&self, lockfile: &Lockfile) -> Result<InstallReport> {
        let plan = {
            let (lockfile, config) = (lockfile.clone(), self.config.clone());
            blocking(move || plan_install(&lockfile, &config)).await??
        };
        let mut report = InstallReport::default();

        // A satisfied tree is left byte-for-byte alone, lock file included.
        let _lock = if plan.is_satisfied() {
            None
        } else {
            Some(InstanceLock::try_acquire(&self.config.lock_path).map_err(|e| match e {
                e @ stager_fs::Error::Locked { .. } => InstallError::Locked { source: e },
                other => InstallError::Fs(other),
            })?)
        };

        let quarantine = Quarantine::new(&self.config.quarantine_root);
        let mut recorded = Vec::with_capacity(plan.len());

        for item in &plan.artifacts {
            let verdict = match item.action {
                PlanAction::Satisfied => {
                    self.record(item, DecisionKind::Skip, ReasonCode::AlreadyInstalled, &item.final_verdict);
                    report.skipped_count += 1;
                    item.final_verdict.clone()
                }
                PlanAction::ResumeFromStaging => {
                    let staged = item.staging_verdict.as_ref().map(Observed::from).unwrap_or_default();
                    self.record(item, DecisionKind::ResumeFromStaging, ReasonCode::StagingVerified, staged);
                    let verdict = self.promote_staged(item).await?;
                    report.installed_count += 1;
                    verdict
                }
                PlanAction::Install { stale_staging } => {
                    if stale_staging {
                        let reason = match item.staging_verdict {
                            Some(Verdict::SizeMismatch { .. }) => ReasonCode::StagingSizeMismatch,
                            _ => ReasonCode::StagingChecksumMismatch,
                        };
                        let staged = item.staging_verdict.as_ref().map(Observed::from).unwrap_or_default();
                        self.record(item, DecisionKind::Redownload, reason, staged);
                        remove_file_if_exists(&item.staging_path)?;
                    } else {
                        self.record(item, DecisionKind::Redownload, ReasonCode::NotPresent, Observed::default());
                    }
                    self.fetch_to_staging(item).await?;
                    let verdict = self.promote_staged(item).await?;
                    report.installed_count += 1;
                    verdict
                }
                PlanAction::Verify => {
                    let current = verify(&item.final_path, &item.artifact).await?;
                    if current.is_verified() {
                        self.record(item, DecisionKind::Skip, ReasonCode::FinalReverified, &current);
                        report.verified_count += 1;
                        current
                    } else {
                        match self.config.repair {
                            RepairPolicy::FailLoud => {
                                self.record(item, DecisionKind::Fail, ReasonCode::FinalChecksumMismatch, &current);
                                return Err(check_failure(item, CheckLocation::Final, &current));
                            }
                            RepairPolicy::QuarantineAndReinstall => {
                                quarantine.quarantine(&item.final_path, &item.artifact.name, &item.artifact.relative_path);
                                self.record(
                                    item,
                                    DecisionKind::QuarantineThenRedownload,
                                    ReasonCode::FinalChecksumMismatch,
                                    &current,
                                );
                                remove_file_if_exists(&item.staging_path)?;
                                self.fetch_to_staging(item).await?;
                                let verdict = self.promote_staged(item).await?;
                                report.installed_count += 1;
                                verdict
                            }
                        }
                    }
                }
            };

            recorded.push(snapshot_entry(item, &verdict));
        }

        if report.installed_count + report.verified_count > 0 {
            let store = SnapshotStore::new(&self.config.snapshot_root);
            let target_version = lockfile.target_version.clone();
            match blocking(move || store.create(&target_version, &recorded)).await.and_then(|created| created) {
                Ok(manifest) => report.snapshot_id = Some(manifest.snapshot_id),
                Err(e) => error!(
                    error = %e,
                    "snapshot creation failed; rollback to this install will be unavailable"
                ),
            }
            if let Err(e) = remove_dir_all_if_exists(&self.config.staging_root) {
                warn!(error = %e, "failed to remove staging tree");
            }
        }

        info!(
            instance = %self.config.instance_id,
            installed = report.installed_count,
            verified = report.verified_count,
            skipped = report.skipped_count,
            snapshot = ?report.snapshot_id,
            "install complete"
        );
        Ok(report)
    }

    async fn fetch_to_staging(&self, item: &ArtifactPlan) -> Result<()> {
        let options = FetchOptions::default()
            .expected_size(item.artifact.size)
            .expected_checksum(Some(item.artifact.checksum.clone()));

        let Err(source) = self
            .fetcher
            .fetch(&item.artifact.source_location, &item.staging_path, &options)
            .await
        else {
            return Ok(());
        };

        if let Err(e) = remove_file_if_exists(&item.staging_path) {
            warn!(error = %e, "failed to remove staged copy after fetch failure");
        }
        self.record(item, DecisionKind::Fail, ReasonCode::FetchVerificationFailed, Observed::default());

        let artifact = item.artifact.name.clone();
        Err(match source {
            FetchError::ChecksumMismatch { expected, actual, .. } => InstallError::ChecksumMismatch {
                artifact,
                location: CheckLocation::Staging,
                expected,
                observed: actual,
            },
            FetchError::SizeMismatch { expected, actual, .. } => InstallError::SizeMismatch {
                artifact,
                location: CheckLocation::Staging,
                expected,
                observed: actual,
            },
            other => InstallError::Fetch { artifact, source: other },
        })
    }

    /// Re-verify the staged copy, run kind-specific handling, promote, and
    /// verify the final file.
    async fn promote_staged(&self, item: &ArtifactPlan) -> Result<Verdict> {
        let staged = verify(&item.staging_path, &item.artifact).await?;
        if !staged.is_verified() {
            let reason = match staged {
                Verdict::Missing => ReasonCode::NotPresent,
                Verdict::SizeMismatch { .. } => ReasonCode::StagingSizeMismatch,
                _ => ReasonCode::StagingChecksumMismatch,
            };
            remove_file_if_exists(&item.staging_path)?;
            self.record(item, DecisionKind::Fail, reason, &staged);
            return Err(check_failure(item, CheckLocation::Staging, &staged));
        }

        match item.kind {
            ArtifactKind::File => {}
            ArtifactKind::Archive => {
                let extractor = Arc::clone(&self.extractor);
                let (archive, destination) = (item.staging_path.clone(), self.config.extract_root.clone());
                if let Err(source) = blocking(move || extractor.extract(&archive, &destination)).await? {
                    self.record(item, DecisionKind::Fail, ReasonCode::ExtractionFailed, &staged);
                    return Err(InstallError::Extraction {
                        artifact: item.artifact.name.clone(),
                        source,
                    });
                }
            }
        }

        let (from, to, options) = (item.staging_path.clone(), item.final_path.clone(), self.promote_options);
        if let Err(source) = blocking(move || promote(&from, &to, options)).await? {
            self.record(item, DecisionKind::Fail, ReasonCode::PromotionFailed, &staged);
            return Err(InstallError::Promotion {
                artifact: item.artifact.name.clone(),
                source,
            });
        }

        let promoted = verify(&item.final_path, &item.artifact).await?;
        if !promoted.is_verified() {
            self.record(item, DecisionKind::Fail, ReasonCode::FinalChecksumMismatch, &promoted);
            return Err(check_failure(item, CheckLocation::Final, &promoted));
        }

        self.record(item, DecisionKind::Promote, ReasonCode::Promoted, &promoted);
        Ok(promoted)
    }

    fn record(&self, item: &ArtifactPlan, kind: DecisionKind, reason: ReasonCode, observed: impl Into<Observed>) {
        self.decisions.emit(
            Decision::new(
                Authority::Lockfile,
                &item.artifact.name,
                &item.artifact.relative_path,
                kind,
                reason,
                Expected::from_checksum(&item.artifact.checksum, item.artifact.size),
            )
            .observed(observed),
        );
    }
}

/// Run filesystem-bound work off the async worker threads.
async fn blocking<T: Send + 'static>(work: impl FnOnce() -> T + Send + 'static) -> Result<T> {
    Ok(tokio::task::spawn_blocking(work).await?)
}

async fn verify(path: &Path, artifact: &Artifact) -> Result<Verdict> {
    let (path, checksum, size) = (path.to_path_buf(), artifact.checksum.clone(), artifact.size);
    Ok(blocking(move || verify_file(&path, &checksum, size)).await??)
}

fn snapshot_entry(item: &ArtifactPlan, verdict: &Verdict) -> (SnapshotArtifact, PathBuf) {
    (
        SnapshotArtifact {
            logical_name:  item.artifact.name.clone(),
            relative_path: item.artifact.relative_path.clone(),
            checksum:      item.artifact.checksum.clone(),
            size:          verdict.observed_size().or(item.artifact.size).unwrap_or_default(),
        },
        item.final_path.clone(),
    )
}

/// Named error for a file that did not verify at `location`.
fn check_failure(item: &ArtifactPlan, location: CheckLocation, verdict: &Verdict) -> InstallError {
    let artifact = item.artifact.name.clone();
    match verdict {
        Verdict::Missing => InstallError::MissingExpectedArtifact {
            artifact,
            path: match location {
                CheckLocation::Staging => item.staging_path.clone(),
                _ => item.final_path.clone(),
            },
        },
        Verdict::SizeMismatch { observed_size } => InstallError::SizeMismatch {
            artifact,
            location,
            expected: item.artifact.size.unwrap_or_default(),
            observed: *observed_size,
        },
        Verdict::ChecksumMismatch { observed } | Verdict::Verified { observed } => InstallError::ChecksumMismatch {
            artifact,
            location,
            expected: item.artifact.checksum.to_string(),
            observed: format!("{}:{}", observed.algorithm, observed.hex),
        },
    }
}
