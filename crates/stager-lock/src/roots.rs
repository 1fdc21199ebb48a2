use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{LockError, Result, validate_relative_path};

/// One `prefix -> absolute base` mapping.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootPrefix {
    pub prefix: String,
    pub base:   PathBuf,
}

/// Maps lockfile-relative paths onto the directories that own them.
///
/// Supplied by whoever knows where each subsystem keeps its files; this
/// crate only performs the lookup.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RootTable {
    roots: Vec<RootPrefix>,
}

impl RootTable {
    pub fn new() -> Self { Self::default() }

    /// Add a root. A later root with the same prefix replaces the earlier one.
    pub fn with_root(mut self, prefix: impl AsRef<str>, base: impl Into<PathBuf>) -> Self {
        let prefix = prefix.as_ref().trim_matches('/').to_string();
        let base = base.into();
        match self.roots.iter_mut().find(|root| root.prefix == prefix) {
            Some(existing) => existing.base = base,
            None => self.roots.push(RootPrefix { prefix, base }),
        }
        self
    }

    /// Conventional layout: every prefix lives directly under `root`.
    pub fn for_instance(root: &Path, prefixes: &[&str]) -> Self {
        prefixes
            .iter()
            .fold(Self::new(), |table, prefix| table.with_root(prefix, root.join(prefix)))
    }

    pub fn roots(&self) -> &[RootPrefix] { &self.roots }

    pub fn is_empty(&self) -> bool { self.roots.is_empty() }

    /// Resolve a relative path to its absolute destination.
    ///
    /// The longest prefix matching on a segment boundary wins.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf> {
        validate_relative_path(relative)?;

        let (root, remainder) = self
            .roots
            .iter()
            .filter_map(|root| {
                relative
                    .strip_prefix(root.prefix.as_str())
                    .and_then(|rest| rest.strip_prefix('/'))
                    .map(|rest| (root, rest))
            })
            .max_by_key(|(root, _)| root.prefix.len())
            .ok_or_else(|| LockError::UnknownRoot(relative.to_string()))?;

        Ok(remainder
            .split('/')
            .fold(root.base.clone(), |path, segment| path.join(segment)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RootTable {
        RootTable::new()
            .with_root("libraries", "/data/shared/libraries")
            .with_root("versions", "/data/instance/versions")
            .with_root("versions/natives", "/data/instance/natives")
    }

    #[test]
    fn test_resolve_by_prefix() {
        assert_eq!(
            table().resolve("libraries/org/lwjgl/lwjgl.jar").unwrap(),
            Path::new("/data/shared/libraries/org/lwjgl/lwjgl.jar")
        );
        assert_eq!(
            table().resolve("versions/1.20.1/client.jar").unwrap(),
            Path::new("/data/instance/versions/1.20.1/client.jar")
        );
    }

    #[test]
    fn test_longest_prefix_wins() {
        assert_eq!(
            table().resolve("versions/natives/lwjgl.so").unwrap(),
            Path::new("/data/instance/natives/lwjgl.so")
        );
    }

    #[test]
    fn test_prefix_must_end_on_segment() {
        assert!(matches!(
            table().resolve("librariesX/a.jar"),
            Err(LockError::UnknownRoot(_))
        ));
        assert!(matches!(
            table().resolve("libraries"),
            Err(LockError::UnknownRoot(_))
        ));
    }

    #[test]
    fn test_for_instance_and_replacement() {
        let table = RootTable::for_instance(Path::new("/inst"), &["libraries", "assets"])
            .with_root("assets/", "/cache/assets");
        assert_eq!(table.roots().len(), 2);
        assert_eq!(
            table.resolve("assets/indexes/17.json").unwrap(),
            Path::new("/cache/assets/indexes/17.json")
        );
    }

    #[test]
    fn test_rejects_traversal_before_lookup() {
        assert!(matches!(
            table().resolve("libraries/../secrets"),
            Err(LockError::InvalidPath { .. })
        ));
    }
}
