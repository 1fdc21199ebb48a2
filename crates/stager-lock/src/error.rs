use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("failed to read lockfile '{path}': {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("lockfile is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("lockfile is invalid: {0}")]
    Invalid(String),

    #[error("unsupported artifact kind '{0}'")]
    UnsupportedKind(String),

    #[error("relative path '{path}' is invalid: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("relative path '{0}' does not start with any known root prefix")]
    UnknownRoot(String),
}

pub type Result<T> = std::result::Result<T, LockError>;
