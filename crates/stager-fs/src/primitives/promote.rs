use crate::primitives::copy::create_parent_dirs;
use crate::{Error, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

#[derive(Clone, Copy, Debug)]
pub struct PromoteOptions {
    pub retry_count: u32,
    pub retry_delay: Duration,
}

impl Default for PromoteOptions {
    fn default() -> Self {
        Self {
            retry_count: 3,
            retry_delay: Duration::from_millis(50),
        }
    }
}

impl PromoteOptions {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn retry_count(mut self, count: u32) -> Self {
        self.retry_count = count;
        self
    }
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

/// How a file reached its destination.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromoteMethod {
    Renamed,
    /// Copied, then the source was removed.
    Copied,
    /// Copied, but the source could not be removed afterwards.
    CopiedSourceKept,
}

/// Move a file into place, replacing whatever is at `dest`.
///
/// Rename is tried first. Transient failures (sharing violations, busy files)
/// are retried with a linear backoff; when rename is impossible, the bytes are
/// copied to a temporary sibling of `dest`, renamed over it, and the source is
/// deleted.
pub fn promote(
    src: impl AsRef<Path>,
    dest: impl AsRef<Path>,
    options: PromoteOptions,
) -> Result<PromoteMethod> {
    let src = src.as_ref();
    let dest = dest.as_ref();
    let parent = create_parent_dirs(dest)?;

    let mut attempts = 0;
    loop {
        match fs::rename(src, dest) {
            Ok(()) => return Ok(PromoteMethod::Renamed),
            Err(e) if e.kind() == ErrorKind::NotFound && !src.exists() => {
                return Err(Error::Move {
                    from: src.to_path_buf(),
                    to: dest.to_path_buf(),
                    source: e,
                });
            }
            Err(e) if e.kind() == ErrorKind::CrossesDevices => break,
            Err(_) => {
                attempts += 1;
                if attempts >= options.retry_count {
                    break;
                }
                std::thread::sleep(options.retry_delay * attempts);
            }
        }
    }

    let tmp_path = parent.join(format!(".promote.{}.stager", uuid::Uuid::new_v4()));
    fs::copy(src, &tmp_path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        Error::Move {
            from: src.to_path_buf(),
            to: dest.to_path_buf(),
            source: e,
        }
    })?;

    fs::rename(&tmp_path, dest).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        Error::Move {
            from: src.to_path_buf(),
            to: dest.to_path_buf(),
            source: e,
        }
    })?;

    match fs::remove_file(src) {
        Ok(()) => Ok(PromoteMethod::Copied),
        Err(_) => Ok(PromoteMethod::CopiedSourceKept),
    }
}
