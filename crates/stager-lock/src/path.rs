use crate::{LockError, Result};

/// Check that a lockfile path is a plain forward-slash relative path.
///
/// Rejects anything that could resolve outside its root: absolute paths,
/// drive letters, backslashes, and empty, `.` or `..` segments.
pub fn validate_relative_path(path: &str) -> Result<()> {
    let invalid = |reason| LockError::InvalidPath {
        path: path.to_string(),
        reason,
    };

    if path.is_empty() {
        return Err(invalid("empty"));
    }
    if path.starts_with('/') {
        return Err(invalid("absolute"));
    }
    if path.contains('\\') {
        return Err(invalid("contains a backslash"));
    }
    if path.contains(':') {
        return Err(invalid("contains a drive or scheme separator"));
    }
    if path.contains('\0') {
        return Err(invalid("contains a null byte"));
    }
    for segment in path.split('/') {
        match segment {
            "" => return Err(invalid("contains an empty segment")),
            "." | ".." => return Err(invalid("contains a relative segment")),
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_plain_paths() {
        validate_relative_path("libraries/org/lwjgl/lwjgl-3.3.1.jar").unwrap();
        validate_relative_path("versions/1.20.1/1.20.1.jar").unwrap();
    }

    #[test]
    fn test_rejects_escapes() {
        for bad in [
            "",
            "/etc/passwd",
            "libraries/../../etc",
            "libraries/./x",
            "libraries//x",
            "libraries\\x",
            "C:/x",
            "libraries/",
        ] {
            assert!(validate_relative_path(bad).is_err(), "accepted {bad:?}");
        }
    }
}
