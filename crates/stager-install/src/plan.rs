//! Install planner: diff the lockfile against final and staged files.
//!
//! Planning only reads. For a fixed lockfile and unchanged files the plan is
//! identical on every call.

use std::path::PathBuf;

use serde::Serialize;
use serde::ser::Serializer;
use stager_fs::Workspace;
use stager_lock::{Artifact, ArtifactKind, Lockfile};
use stager_verify::{Verdict, verify_file};
use tracing::debug;

use crate::config::InstallConfig;
use crate::error::{InstallError, Result};

/// Exactly one action per artifact.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlanAction {
    /// Final file present and verified.
    Satisfied,
    /// Fetch into staging, then promote. `stale_staging` marks a staged copy
    /// that failed verification and must be removed first.
    Install { stale_staging: bool },
    /// A verified staged copy exists; promote it without fetching.
    ResumeFromStaging,
    /// Final file present but failed verification.
    Verify,
}

#[derive(Clone, Debug)]
pub struct ArtifactPlan {
    pub artifact:        Artifact,
    pub kind:            ArtifactKind,
    pub final_path:      PathBuf,
    pub staging_path:    PathBuf,
    pub action:          PlanAction,
    /// What was found at the final path.
    pub final_verdict:   Verdict,
    /// What was found in staging; `None` when staging was not consulted.
    pub staging_verdict: Option<Verdict>,
}

impl ArtifactPlan {
    pub fn needs_install(&self) -> bool {
        matches!(self.action, PlanAction::Install { .. } | PlanAction::ResumeFromStaging)
    }

    pub fn needs_verification(&self) -> bool { self.action == PlanAction::Verify }

    pub fn in_staging(&self) -> bool { self.action == PlanAction::ResumeFromStaging }
}

impl Serialize for ArtifactPlan {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct View<'a> {
            artifact:           &'a str,
            kind:               ArtifactKind,
            relative_path:      &'a str,
            #[serde(flatten)]
            action:             PlanAction,
            needs_install:      bool,
            needs_verification: bool,
            in_staging:         bool,
            final_path:         &'a PathBuf,
            staging_path:       &'a PathBuf,
        }

        View {
            artifact:           &self.artifact.name,
            kind:               self.kind,
            relative_path:      &self.artifact.relative_path,
            action:             self.action,
            needs_install:      self.needs_install(),
            needs_verification: self.needs_verification(),
            in_staging:         self.in_staging(),
            final_path:         &self.final_path,
            staging_path:       &self.staging_path,
        }
        .serialize(serializer)
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallPlan {
    pub target_version: String,
    pub artifacts:      Vec<ArtifactPlan>,
}

impl InstallPlan {
    pub fn len(&self) -> usize { self.artifacts.len() }

    pub fn is_empty(&self) -> bool { self.artifacts.is_empty() }

    /// True when nothing needs to be installed or re-verified.
    pub fn is_satisfied(&self) -> bool {
        self.artifacts.iter().all(|plan| plan.action == PlanAction::Satisfied)
    }
}

/// Build the per-artifact plan for `lockfile` under `config`.
///
/// Fails without partial output if any artifact has a kind this build does
/// not install, or a path outside the known roots.
pub fn plan_install(lockfile: &Lockfile, config: &InstallConfig) -> Result<InstallPlan> {
    let unsupported = lockfile.unsupported_kinds();
    if !unsupported.is_empty() {
        return Err(InstallError::UnsupportedArtifactKind { kinds: unsupported });
    }

    let invalid = |source| InstallError::LockfileInvalid {
        path: config.lockfile.clone(),
        source,
    };

    let staging = Workspace::persistent(&config.staging_root);
    let mut artifacts = Vec::with_capacity(lockfile.artifacts.len());
    for artifact in &lockfile.artifacts {
        let kind = artifact.kind().map_err(invalid)?;
        let final_path = config.roots.resolve(&artifact.relative_path).map_err(invalid)?;
        let staging_path = staging.path_for(&artifact.relative_path);

        let final_verdict = verify_file(&final_path, &artifact.checksum, artifact.size)?;
        let (action, staging_verdict) = match &final_verdict {
            Verdict::Verified { .. } => (PlanAction::Satisfied, None),
            Verdict::SizeMismatch { .. } | Verdict::ChecksumMismatch { .. } => (PlanAction::Verify, None),
            Verdict::Missing => {
                let staged = verify_file(&staging_path, &artifact.checksum, artifact.size)?;
                let action = match &staged {
                    Verdict::Verified { .. } => PlanAction::ResumeFromStaging,
                    Verdict::Missing => PlanAction::Install { stale_staging: false },
                    _ => PlanAction::Install { stale_staging: true },
                };
                (action, Some(staged))
            }
        };

        debug!(artifact = %artifact.name, ?action, "planned");
        artifacts.push(ArtifactPlan {
            artifact: artifact.clone(),
            kind,
            final_path,
            staging_path,
            action,
            final_verdict,
            staging_verdict,
        });
    }

    Ok(InstallPlan {
        target_version: lockfile.target_version.clone(),
        artifacts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use stager_verify::{Checksum, HashAlgorithm, Sha1Hasher};
    use tempfile::tempdir;

    fn artifact(name: &str, kind: &str, relative_path: &str, content: &[u8]) -> Artifact {
        Artifact {
            name:            name.to_string(),
            kind_tag:        kind.to_string(),
            source_location: format!("https://cdn.example.invalid/{name}"),
            relative_path:   relative_path.to_string(),
            checksum:        Checksum::from_digest(HashAlgorithm::Sha1, &Sha1Hasher::digest(content)).unwrap(),
            size:            Some(content.len() as u64),
        }
    }

    fn lockfile(artifacts: Vec<Artifact>) -> Lockfile {
        Lockfile {
            schema_version: 1,
            target_version: "1.20.1".to_string(),
            artifacts,
        }
    }

    fn write(path: &std::path::Path, content: &[u8]) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn classifies_every_state() {
        let dir = tempdir().unwrap();
        let config = InstallConfig::for_instance("test", dir.path());
        let lock = lockfile(vec![
            artifact("ok", "file", "libraries/ok.jar", b"ok"),
            artifact("bad", "file", "libraries/bad.jar", b"bad"),
            artifact("staged", "file", "libraries/staged.jar", b"staged"),
            artifact("stale", "file", "libraries/stale.jar", b"stale"),
            artifact("absent", "archive", "libraries/absent.jar", b"absent"),
        ]);
        write(&dir.path().join("libraries/ok.jar"), b"ok");
        write(&dir.path().join("libraries/bad.jar"), b"BAD");
        write(&config.staging_root.join("libraries/staged.jar"), b"staged");
        write(&config.staging_root.join("libraries/stale.jar"), b"STALE");

        let plan = plan_install(&lock, &config).unwrap();
        let actions: Vec<_> = plan.artifacts.iter().map(|p| p.action).collect();

        assert_eq!(actions, vec![
            PlanAction::Satisfied,
            PlanAction::Verify,
            PlanAction::ResumeFromStaging,
            PlanAction::Install { stale_staging: true },
            PlanAction::Install { stale_staging: false },
        ]);
        assert!(plan.artifacts[2].in_staging() && plan.artifacts[2].needs_install());
        assert!(plan.artifacts[1].needs_verification() && !plan.artifacts[1].needs_install());
        assert_eq!(plan.artifacts[4].kind, ArtifactKind::Archive);
        assert!(!plan.is_satisfied());
    }

    #[test]
    fn unsupported_kinds_abort_planning() {
        let dir = tempdir().unwrap();
        let config = InstallConfig::for_instance("test", dir.path());
        let lock = lockfile(vec![
            artifact("a", "file", "libraries/a.jar", b"a"),
            artifact("b", "processor", "libraries/b.jar", b"b"),
            artifact("c", "processor", "libraries/c.jar", b"c"),
        ]);

        let err = plan_install(&lock, &config).unwrap_err();

        match err {
            InstallError::UnsupportedArtifactKind { kinds } => assert_eq!(kinds.get("processor"), Some(&2)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_root_is_a_lockfile_error() {
        let dir = tempdir().unwrap();
        let config = InstallConfig::for_instance("test", dir.path());
        let lock = lockfile(vec![artifact("a", "file", "saves/a.dat", b"a")]);

        assert!(matches!(
            plan_install(&lock, &config),
            Err(InstallError::LockfileInvalid { .. })
        ));
    }

    #[test]
    fn planning_writes_nothing_and_is_repeatable() {
        let dir = tempdir().unwrap();
        let config = InstallConfig::for_instance("test", dir.path());
        let lock = lockfile(vec![artifact("a", "file", "mods/a.jar", b"a")]);

        let first = serde_json::to_string(&plan_install(&lock, &config).unwrap()).unwrap();
        let second = serde_json::to_string(&plan_install(&lock, &config).unwrap()).unwrap();

        assert_eq!(first, second);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert!(first.contains("\"action\":\"install\""));
        assert!(first.contains("\"needsInstall\":true"));
    }
}
