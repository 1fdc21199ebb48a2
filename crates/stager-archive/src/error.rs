use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("archive '{archive}' is corrupted: {message}")]
    Corrupted { archive: PathBuf, message: String },

    #[error("zip-slip attack detected: entry '{entry}' escapes the destination")]
    ZipSlip { entry: String },

    #[error("entry path '{entry}' is not a valid path")]
    InvalidPath { entry: String },

    #[error("failed to read '{path}': {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write extracted entry: {source}")]
    Write {
        #[from]
        source: stager_fs::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
