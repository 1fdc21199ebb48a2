//! Explicit per-instance configuration.
//!
//! Every path the engine touches is derived from an [`InstallConfig`] that is
//! threaded through the planner, installer and rollback executor.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use stager_lock::RootTable;

use crate::error::{InstallError, Result};

pub const CONFIG_FILE_NAME: &str = "stager.toml";
pub const LOCKFILE_NAME: &str = "pack.lock.json";
pub const DEFAULT_ROOT_PREFIXES: &[&str] = &["libraries", "versions", "assets", "mods"];

/// What to do with a live file that still fails verification.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RepairPolicy {
    /// Stop and name the artifact.
    #[default]
    FailLoud,
    /// Move the file to quarantine, then fetch it again.
    QuarantineAndReinstall,
}

#[derive(Clone, Debug)]
pub struct InstallConfig {
    pub instance_id:           String,
    pub root:                  PathBuf,
    pub lockfile:              PathBuf,
    pub roots:                 RootTable,
    pub staging_root:          PathBuf,
    pub rollback_staging_root: PathBuf,
    pub rollback_backup_root:  PathBuf,
    pub quarantine_root:       PathBuf,
    pub snapshot_root:         PathBuf,
    pub extract_root:          PathBuf,
    pub lock_path:             PathBuf,
    pub repair:                RepairPolicy,
}

impl InstallConfig {
    /// Conventional layout under `root`.
    pub fn for_instance(instance_id: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let staging = root.join(".staging");
        Self {
            instance_id:           instance_id.into(),
            lockfile:              root.join(LOCKFILE_NAME),
            roots:                 RootTable::for_instance(&root, DEFAULT_ROOT_PREFIXES),
            staging_root:          staging.join("pack-install"),
            rollback_staging_root: staging.join("rollback"),
            rollback_backup_root:  staging.join("rollback-backup"),
            quarantine_root:       root.join(".quarantine"),
            snapshot_root:         root.join(".rollback"),
            extract_root:          root.join("natives"),
            lock_path:             root.join(".stager.lock"),
            repair:                RepairPolicy::default(),
            root,
        }
    }

    pub fn lockfile(mut self, path: impl Into<PathBuf>) -> Self {
        self.lockfile = path.into();
        self
    }

    pub fn roots(mut self, roots: RootTable) -> Self {
        self.roots = roots;
        self
    }

    pub fn extract_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.extract_root = path.into();
        self
    }

    pub fn repair(mut self, policy: RepairPolicy) -> Self {
        self.repair = policy;
        self
    }

    /// Build the configuration for `root`, applying `stager.toml` overrides.
    ///
    /// `explicit` names a config file that must exist; otherwise
    /// `<root>/stager.toml` is used when present.
    pub fn load(root: impl Into<PathBuf>, explicit: Option<&Path>) -> Result<Self> {
        let root = root.into();
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Some(root.join(CONFIG_FILE_NAME)).filter(|path| path.is_file()),
        };

        let file = match &path {
            Some(path) => ConfigFile::read(path)?,
            None => ConfigFile::default(),
        };

        let instance_id = file.instance_id.clone().unwrap_or_else(|| default_instance_id(&root));
        let mut config = Self::for_instance(instance_id, &root);
        if let Some(lockfile) = file.lockfile {
            config.lockfile = root.join(lockfile);
        }
        if let Some(extract_dir) = file.extract_dir {
            config.extract_root = root.join(extract_dir);
        }
        if !file.roots.is_empty() {
            config.roots = file
                .roots
                .into_iter()
                .fold(RootTable::new(), |table, (prefix, base)| table.with_root(prefix, root.join(base)));
        }
        Ok(config)
    }
}

fn default_instance_id(root: &Path) -> String {
    root.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "default".to_string())
}

/// On-disk shape of `stager.toml`. Relative paths resolve against the
/// instance root; absolute ones are used as given.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    instance_id: Option<String>,
    lockfile:    Option<PathBuf>,
    extract_dir: Option<PathBuf>,
    #[serde(default)]
    roots:       BTreeMap<String, PathBuf>,
}

impl ConfigFile {
    fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| InstallError::Config {
            path:    path.to_path_buf(),
            message: e.to_string(),
        })?;
        toml::from_str(&text).map_err(|e| InstallError::Config {
            path:    path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn conventional_layout() {
        let config = InstallConfig::for_instance("survival", "/srv/pack");
        assert_eq!(config.lockfile, Path::new("/srv/pack/pack.lock.json"));
        assert_eq!(config.staging_root, Path::new("/srv/pack/.staging/pack-install"));
        assert_eq!(config.quarantine_root, Path::new("/srv/pack/.quarantine"));
        assert_eq!(config.snapshot_root, Path::new("/srv/pack/.rollback"));
        assert_eq!(
            config.roots.resolve("libraries/org/lwjgl/lwjgl.jar").unwrap(),
            Path::new("/srv/pack/libraries/org/lwjgl/lwjgl.jar")
        );
        assert_eq!(config.repair, RepairPolicy::FailLoud);
    }

    #[test]
    fn load_without_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("my-pack");
        std::fs::create_dir_all(&root).unwrap();

        let config = InstallConfig::load(&root, None).unwrap();

        assert_eq!(config.instance_id, "my-pack");
        assert_eq!(config.lockfile, root.join(LOCKFILE_NAME));
    }

    #[test]
    fn load_applies_overrides() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"
instance_id = "modded"
lockfile = "locks/pack.json"
extract_dir = "bin/natives"

[roots]
libraries = "shared/libraries"
mods = "mods"
"#,
        )
        .unwrap();

        let config = InstallConfig::load(dir.path(), None).unwrap();

        assert_eq!(config.instance_id, "modded");
        assert_eq!(config.lockfile, dir.path().join("locks/pack.json"));
        assert_eq!(config.extract_root, dir.path().join("bin/natives"));
        assert_eq!(
            config.roots.resolve("libraries/a.jar").unwrap(),
            dir.path().join("shared/libraries/a.jar")
        );
        assert!(config.roots.resolve("assets/a.json").is_err());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "staging = \"elsewhere\"\n").unwrap();

        let err = InstallConfig::load(dir.path(), Some(&path)).unwrap_err();

        assert!(matches!(err, InstallError::Config { .. }));
    }

    #[test]
    fn explicit_file_must_exist() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(InstallConfig::load(dir.path(), Some(&missing)).is_err());
    }
}
