//! Last-known-good snapshots.
//!
//! A snapshot is a directory `<root>/<id>/` holding `files/<relativePath>`
//! copies of every artifact and a `manifest.json` written last. A directory
//! without a loadable manifest is never used.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use stager_fs::{AtomicWriteOptions, Workspace, atomic_write, copy_file, remove_dir_all_if_exists};
use stager_lock::validate_relative_path;
use stager_verify::Checksum;
use tracing::{info, warn};

use crate::decision::Authority;
use crate::error::{InstallError, Result};
use crate::quarantine::sanitize_name;

pub const MANIFEST_VERSION: u32 = 1;
pub const MANIFEST_FILE: &str = "manifest.json";
pub const FILES_DIR: &str = "files";

const ID_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.3f";
const ID_TIMESTAMP_LEN: usize = 19;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotArtifact {
    pub logical_name:  String,
    pub relative_path: String,
    pub checksum:      Checksum,
    pub size:          u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotManifest {
    pub version:        u32,
    pub snapshot_id:    String,
    pub created_at:     DateTime<Utc>,
    pub target_version: String,
    pub authority:      Authority,
    pub artifact_count: usize,
    pub artifacts:      Vec<SnapshotArtifact>,
}

/// A manifest as found on disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ManifestDocument {
    Current(SnapshotManifest),
    /// Unversioned manifest from an older format. It records metadata only
    /// and cannot be restored from.
    Legacy,
}

impl ManifestDocument {
    pub fn parse(snapshot_id: &str, text: &str) -> Result<Self> {
        let invalid = |reason: String| InstallError::SnapshotManifestInvalid {
            snapshot_id: snapshot_id.to_string(),
            reason,
        };

        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| invalid(format!("manifest is not valid JSON: {e}")))?;
        let Some(object) = value.as_object() else {
            return Err(invalid("manifest is not a JSON object".into()));
        };

        match object.get("version") {
            None => return Ok(ManifestDocument::Legacy),
            Some(version) if version.as_u64() != Some(u64::from(MANIFEST_VERSION)) => {
                return Err(invalid(format!("unsupported manifest version {version}")));
            }
            Some(_) => {}
        }

        let manifest: SnapshotManifest =
            serde_json::from_value(value).map_err(|e| invalid(format!("manifest is malformed: {e}")))?;

        if manifest.snapshot_id != snapshot_id {
            return Err(invalid(format!("manifest names snapshot '{}'", manifest.snapshot_id)));
        }
        if manifest.authority != Authority::Lockfile {
            return Err(invalid(format!("manifest authority is '{}'", manifest.authority)));
        }
        if manifest.artifact_count != manifest.artifacts.len() {
            return Err(invalid(format!(
                "artifactCount is {} but {} artifacts are listed",
                manifest.artifact_count,
                manifest.artifacts.len()
            )));
        }
        for artifact in &manifest.artifacts {
            validate_relative_path(&artifact.relative_path).map_err(|e| invalid(e.to_string()))?;
        }

        Ok(ManifestDocument::Current(manifest))
    }
}

/// Snapshot directory tree rooted at `.rollback/`.
#[derive(Clone, Debug)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

    pub fn root(&self) -> &Path { &self.root }

    pub fn snapshot_dir(&self, snapshot_id: &str) -> PathBuf { self.root.join(snapshot_id) }

    /// Where the stored bytes for `relative_path` live inside a snapshot.
    pub fn artifact_path(&self, snapshot_id: &str, relative_path: &str) -> PathBuf {
        Workspace::persistent(self.snapshot_dir(snapshot_id).join(FILES_DIR)).path_for(relative_path)
    }

    /// Snapshot ids in ascending (oldest first) order.
    pub fn list(&self) -> Result<Vec<String>> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(stager_fs::Error::Read {
                    path:   self.root.clone(),
                    source: e,
                }
                .into());
            }
        };

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| stager_fs::Error::Read {
                path:   self.root.clone(),
                source: e,
            })?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with('.') && entry.path().is_dir() {
                ids.push(name);
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Load and type-check a snapshot's manifest.
    pub fn load(&self, snapshot_id: &str) -> Result<SnapshotManifest> {
        let dir = self.snapshot_dir(snapshot_id);
        if !dir.is_dir() {
            return Err(InstallError::SnapshotNotFound(snapshot_id.to_string()));
        }

        let path = dir.join(MANIFEST_FILE);
        let text = std::fs::read_to_string(&path).map_err(|e| InstallError::SnapshotManifestInvalid {
            snapshot_id: snapshot_id.to_string(),
            reason:      format!("cannot read {MANIFEST_FILE}: {e}"),
        })?;

        match ManifestDocument::parse(snapshot_id, &text)? {
            ManifestDocument::Current(manifest) => Ok(manifest),
            ManifestDocument::Legacy => Err(InstallError::SnapshotManifestInvalid {
                snapshot_id: snapshot_id.to_string(),
                reason:      "legacy manifest without a version tag is metadata-only, cannot be used for rollback"
                    .to_string(),
            }),
        }
    }

    /// Newest snapshot whose manifest loads. Unusable snapshots are logged and
    /// passed over.
    pub fn latest_loadable(&self) -> Result<Option<SnapshotManifest>> {
        for id in self.list()?.iter().rev() {
            match self.load(id) {
                Ok(manifest) => return Ok(Some(manifest)),
                Err(e) => warn!(snapshot = %id, error = %e, "skipping unusable snapshot"),
            }
        }
        Ok(None)
    }

    /// Record `artifacts` (with their current live paths) as a new snapshot.
    ///
    /// Bytes are copied first and the manifest is written last; a failed
    /// creation removes its partial directory.
    pub fn create(&self, target_version: &str, artifacts: &[(SnapshotArtifact, PathBuf)]) -> Result<SnapshotManifest> {
        let created_at = Utc::now();
        let existing = self.list()?;
        let snapshot_id = next_snapshot_id(created_at, target_version, existing.last().map(String::as_str));
        let dir = self.snapshot_dir(&snapshot_id);

        let result = self.write_snapshot(&snapshot_id, created_at, target_version, artifacts);
        if result.is_err() {
            if let Err(e) = remove_dir_all_if_exists(&dir) {
                warn!(
                    snapshot = %snapshot_id,
                    path = %dir.display(),
                    error = %e,
                    "failed to remove partial snapshot; later snapshot ids will sort after it"
                );
            }
        }
        let manifest = result?;

        info!(
            snapshot = %manifest.snapshot_id,
            artifacts = manifest.artifact_count,
            "snapshot created"
        );
        Ok(manifest)
    }

    fn write_snapshot(
        &self,
        snapshot_id: &str,
        created_at: DateTime<Utc>,
        target_version: &str,
        artifacts: &[(SnapshotArtifact, PathBuf)],
    ) -> Result<SnapshotManifest> {
        for (artifact, live) in artifacts {
            copy_file(live, self.artifact_path(snapshot_id, &artifact.relative_path))?;
        }

        let manifest = SnapshotManifest {
            version: MANIFEST_VERSION,
            snapshot_id: snapshot_id.to_string(),
            created_at,
            target_version: target_version.to_string(),
            authority: Authority::Lockfile,
            artifact_count: artifacts.len(),
            artifacts: artifacts.iter().map(|(artifact, _)| artifact.clone()).collect(),
        };

        let json = serde_json::to_vec_pretty(&manifest).map_err(|e| InstallError::SnapshotManifestInvalid {
            snapshot_id: snapshot_id.to_string(),
            reason:      e.to_string(),
        })?;
        atomic_write(
            self.snapshot_dir(snapshot_id).join(MANIFEST_FILE),
            &json,
            AtomicWriteOptions::new().sync(true),
        )?;
        Ok(manifest)
    }
}

/// `<UTC timestamp>-<target version>`, strictly greater than `latest`.
fn next_snapshot_id(now: DateTime<Utc>, target_version: &str, latest: Option<&str>) -> String {
    let mut stamp = now;
    if let Some(latest_stamp) = latest.and_then(parse_id_timestamp) {
        if stamp <= latest_stamp {
            stamp = latest_stamp + TimeDelta::milliseconds(1);
        }
    }
    format!("{}Z-{}", stamp.format(ID_TIMESTAMP_FORMAT), sanitize_name(target_version))
}

fn parse_id_timestamp(id: &str) -> Option<DateTime<Utc>> {
    let stamp = id.get(..ID_TIMESTAMP_LEN)?;
    NaiveDateTime::parse_from_str(stamp, ID_TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}
