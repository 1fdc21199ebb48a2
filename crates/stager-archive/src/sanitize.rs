use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Resolve an archive entry name under `base`.
///
/// Backslashes are treated as separators and `.` segments are dropped.
/// Absolute names, drive-qualified names and `..` segments that would climb
/// above `base` are rejected.
pub fn sanitize_entry_path(entry: &str, base: &Path) -> Result<PathBuf> {
    if entry.contains('\0') {
        return Err(Error::InvalidPath { entry: entry.to_string() });
    }

    let normalized = entry.replace('\\', "/");
    if normalized.starts_with('/') {
        return Err(Error::ZipSlip { entry: entry.to_string() });
    }

    let mut relative = PathBuf::new();
    for segment in normalized.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if !relative.pop() {
                    return Err(Error::ZipSlip { entry: entry.to_string() });
                }
            }
            s if s.contains(':') => {
                return Err(Error::ZipSlip { entry: entry.to_string() });
            }
            s => relative.push(s),
        }
    }

    if relative.as_os_str().is_empty() {
        return Err(Error::InvalidPath { entry: entry.to_string() });
    }

    Ok(base.join(relative))
}
