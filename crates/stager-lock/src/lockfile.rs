use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use stager_verify::Checksum;

use crate::{ArtifactKind, LockError, Result, validate_relative_path};

pub const LOCKFILE_SCHEMA_VERSION: u32 = 1;

/// Declarative list of required artifacts with pinned checksums.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lockfile {
    pub schema_version: u32,
    pub target_version: String,
    pub artifacts:      Vec<Artifact>,
}

/// One declared file or archive.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub name:            String,
    /// Raw kind tag, kept verbatim so unsupported kinds can be reported by name.
    #[serde(rename = "kind")]
    pub kind_tag:        String,
    pub source_location: String,
    pub relative_path:   String,
    pub checksum:        Checksum,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size:            Option<u64>,
}

impl Artifact {
    pub fn kind(&self) -> Result<ArtifactKind> { self.kind_tag.parse() }
}

impl Lockfile {
    /// Read and validate the lockfile at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| LockError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let lockfile: Lockfile = serde_json::from_str(text)?;
        lockfile.validate()?;
        Ok(lockfile)
    }

    /// Structural checks that do not depend on the filesystem.
    pub fn validate(&self) -> Result<()> {
        if self.schema_version != LOCKFILE_SCHEMA_VERSION {
            return Err(LockError::Invalid(format!(
                "unsupported schemaVersion {} (expected {LOCKFILE_SCHEMA_VERSION})",
                self.schema_version
            )));
        }
        if self.target_version.trim().is_empty() {
            return Err(LockError::Invalid("targetVersion is empty".into()));
        }

        let mut names = HashSet::new();
        let mut paths = HashSet::new();
        for artifact in &self.artifacts {
            if artifact.name.trim().is_empty() {
                return Err(LockError::Invalid(format!(
                    "artifact at '{}' has an empty name",
                    artifact.relative_path
                )));
            }
            if !names.insert(artifact.name.as_str()) {
                return Err(LockError::Invalid(format!(
                    "duplicate artifact name '{}'",
                    artifact.name
                )));
            }
            validate_relative_path(&artifact.relative_path)?;
            if !paths.insert(artifact.relative_path.as_str()) {
                return Err(LockError::Invalid(format!(
                    "artifact '{}' shares relativePath '{}' with another artifact",
                    artifact.name, artifact.relative_path
                )));
            }
        }
        Ok(())
    }

    /// Kind tags this build cannot install, with how many artifacts use each.
    pub fn unsupported_kinds(&self) -> BTreeMap<String, usize> {
        let mut kinds = BTreeMap::new();
        for artifact in &self.artifacts {
            if artifact.kind().is_err() {
                *kinds.entry(artifact.kind_tag.clone()).or_insert(0) += 1;
            }
        }
        kinds
    }
}
