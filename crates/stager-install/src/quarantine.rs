//! Quarantine: move corrupted live files aside instead of deleting them.

use std::path::{Path, PathBuf};

use chrono::Utc;
use stager_fs::{PromoteMethod, PromoteOptions, promote};
use tracing::{debug, error, warn};

/// Append-only holding area for files that failed verification in place.
#[derive(Clone, Debug)]
pub struct Quarantine {
    root: PathBuf,
}

impl Quarantine {
    pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

    pub fn root(&self) -> &Path { &self.root }

    /// Move `file` into the quarantine root as `{timestamp}-{name}`.
    ///
    /// Best-effort: failures are logged and `None` is returned, and missing
    /// files are left alone. Callers must not depend on the move happening.
    pub fn quarantine(&self, file: &Path, logical_name: &str, relative_path: &str) -> Option<PathBuf> {
        if !file.is_file() {
            debug!(path = %file.display(), "nothing to quarantine");
            return None;
        }

        let stamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
        let base = format!("{stamp}-{}", sanitize_name(logical_name));
        let mut destination = self.root.join(&base);
        let mut counter = 1;
        while destination.exists() {
            destination = self.root.join(format!("{base}.{counter}"));
            counter += 1;
        }

        match promote(file, &destination, PromoteOptions::default()) {
            Ok(method) => {
                if method == PromoteMethod::CopiedSourceKept {
                    warn!(path = %file.display(), "quarantine copy made but the original could not be removed");
                }
                warn!(
                    artifact = logical_name,
                    relative_path,
                    destination = %destination.display(),
                    "quarantined corrupted file"
                );
                Some(destination)
            }
            Err(e) => {
                error!(
                    artifact = logical_name,
                    relative_path,
                    error = %e,
                    "failed to quarantine corrupted file; continuing"
                );
                None
            }
        }
    }
}

/// Keep `[A-Za-z0-9._-]`; everything else becomes `_`.
pub(crate) fn sanitize_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    if sanitized.is_empty() { "_".to_string() } else { sanitized }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn moves_bytes_verbatim() {
        let dir = tempdir().unwrap();
        let live = dir.path().join("mods/sodium.jar");
        std::fs::create_dir_all(live.parent().unwrap()).unwrap();
        std::fs::write(&live, b"corrupted bytes").unwrap();
        let quarantine = Quarantine::new(dir.path().join(".quarantine"));

        let moved = quarantine.quarantine(&live, "sodium:mod", "mods/sodium.jar").unwrap();

        assert!(!live.exists());
        assert_eq!(std::fs::read(&moved).unwrap(), b"corrupted bytes");
        let name = moved.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.ends_with("-sodium_mod"), "{name}");
    }

    #[test]
    fn repeated_names_do_not_collide() {
        let dir = tempdir().unwrap();
        let quarantine = Quarantine::new(dir.path().join("q"));
        let mut moved = Vec::new();
        for content in [b"one", b"two"] {
            let live = dir.path().join("a.jar");
            std::fs::write(&live, content).unwrap();
            moved.push(quarantine.quarantine(&live, "a", "mods/a.jar").unwrap());
        }

        assert_ne!(moved[0], moved[1]);
        assert_eq!(std::fs::read_dir(quarantine.root()).unwrap().count(), 2);
    }

    #[test]
    fn missing_file_is_ignored() {
        let dir = tempdir().unwrap();
        let quarantine = Quarantine::new(dir.path().join("q"));
        assert!(quarantine.quarantine(&dir.path().join("nope"), "nope", "mods/nope").is_none());
        assert!(!quarantine.root().exists());
    }

    #[test]
    fn sanitizes_names() {
        assert_eq!(sanitize_name("org.lwjgl:lwjgl/3.3"), "org.lwjgl_lwjgl_3.3");
        assert_eq!(sanitize_name(""), "_");
    }
}
