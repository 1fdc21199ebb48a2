use crate::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Create every missing ancestor of `path`, returning its parent.
pub fn create_parent_dirs(path: &Path) -> Result<PathBuf> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(|e| Error::CreateDir {
        path: parent.clone(),
        source: e,
    })?;
    Ok(parent)
}

/// Copy a single file, creating the destination's parent directories.
/// Returns the number of bytes copied.
pub fn copy_file(src: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<u64> {
    let src = src.as_ref();
    let dest = dest.as_ref();
    create_parent_dirs(dest)?;

    fs::copy(src, dest).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound && !src.exists() {
            Error::Read {
                path: src.to_path_buf(),
                source: e,
            }
        } else {
            Error::Write {
                path: dest.to_path_buf(),
                source: e,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_copy_file_creates_parents() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src.bin");
        let dest = dir.path().join("deep/nested/dest.bin");
        fs::write(&src, "data").unwrap();

        assert_eq!(copy_file(&src, &dest).unwrap(), 4);
        assert_eq!(fs::read(&dest).unwrap(), b"data");
        assert!(src.exists());
    }

    #[test]
    fn test_copy_missing_source_is_read_error() {
        let dir = tempdir().unwrap();
        let err = copy_file(dir.path().join("nope"), dir.path().join("dest")).unwrap_err();
        assert!(matches!(err, Error::Read { .. }));
    }
}
