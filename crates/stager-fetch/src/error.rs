//! Error types for stager-fetch.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Fetch failures. URLs are stored already stripped of credentials and query
/// strings (see [`crate::display_url`]).
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("unsupported source location '{0}'")]
    UnsupportedScheme(String),

    #[error("request to '{url}' failed: {message}")]
    Network { url: String, message: String },

    #[error("size mismatch for '{url}': expected {expected} bytes, got {actual}")]
    SizeMismatch {
        url:      String,
        expected: u64,
        actual:   u64,
    },

    #[error("checksum mismatch for '{url}': expected {expected}, got {actual}")]
    ChecksumMismatch {
        url:      String,
        expected: String,
        actual:   String,
    },

    #[error("file I/O error on '{path}': {source}")]
    Io { path: PathBuf, source: io::Error },
}

pub type Result<T> = std::result::Result<T, FetchError>;
