use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// A scratch tree that mirrors the relative layout of the live tree.
///
/// A persistent workspace outlives the process so an interrupted run can
/// resume from what it staged; an ephemeral one removes itself on drop.
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    cleanup_on_drop: bool,
}

impl Workspace {
    /// Describe a workspace without touching the filesystem.
    pub fn persistent(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cleanup_on_drop: false,
        }
    }

    /// Create a workspace that is removed when dropped.
    pub fn ephemeral(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| Error::CreateDir {
            path: root.clone(),
            source: e,
        })?;
        Ok(Self {
            root,
            cleanup_on_drop: true,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a forward-slash relative path into the workspace.
    pub fn path_for(&self, relative: &str) -> PathBuf {
        relative
            .split('/')
            .filter(|segment| !segment.is_empty())
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }

    /// Remove the workspace and everything staged in it.
    pub fn discard(mut self) -> Result<()> {
        self.cleanup_on_drop = false;
        crate::remove_dir_all_if_exists(&self.root)?;
        Ok(())
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.cleanup_on_drop {
            let _ = std::fs::remove_dir_all(&self.root);
        }
    }
}
