use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use crate::{AnyHasher, Checksum, HASH_PREFIX_LEN, HashAlgorithm, Result, VerifiedReader, VerifyError};

/// Digest of a file as observed on disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileDigest {
    pub algorithm: HashAlgorithm,
    pub hex:       String,
    pub size:      u64,
}

impl FileDigest {
    pub fn prefix(&self) -> &str { &self.hex[..HASH_PREFIX_LEN.min(self.hex.len())] }
}

/// Outcome of checking one file against an expected checksum and size.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Missing,
    SizeMismatch { observed_size: u64 },
    ChecksumMismatch { observed: FileDigest },
    Verified { observed: FileDigest },
}

impl Verdict {
    pub fn is_verified(&self) -> bool { matches!(self, Verdict::Verified { .. }) }

    pub fn is_missing(&self) -> bool { matches!(self, Verdict::Missing) }

    pub fn observed_size(&self) -> Option<u64> {
        match self {
            Verdict::Missing => None,
            Verdict::SizeMismatch { observed_size } => Some(*observed_size),
            Verdict::ChecksumMismatch { observed } | Verdict::Verified { observed } => {
                Some(observed.size)
            }
        }
    }

    pub fn observed_prefix(&self) -> Option<&str> {
        match self {
            Verdict::ChecksumMismatch { observed } | Verdict::Verified { observed } => {
                Some(observed.prefix())
            }
            _ => None,
        }
    }
}

/// Hash a file by streaming it through the algorithm's hasher.
pub fn hash_file(path: impl AsRef<Path>, algorithm: HashAlgorithm) -> Result<FileDigest> {
    let path = path.as_ref();
    let io_err = |source| VerifyError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(io_err)?;
    let mut reader = VerifiedReader::new(BufReader::with_capacity(64 * 1024, file), AnyHasher::new(algorithm));
    io::copy(&mut reader, &mut io::sink()).map_err(io_err)?;

    let (digest, size) = reader.into_digest();
    Ok(FileDigest {
        algorithm,
        hex: hex::encode(digest),
        size,
    })
}

/// Check a file against an expected checksum and optional size.
///
/// A declared size is compared against file metadata first, so obviously
/// truncated files are rejected without being hashed.
pub fn verify_file(
    path: impl AsRef<Path>,
    expected: &Checksum,
    expected_size: Option<u64>,
) -> Result<Verdict> {
    let path = path.as_ref();

    let metadata = match std::fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Verdict::Missing),
        Err(source) => {
            return Err(VerifyError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    if !metadata.is_file() {
        return Ok(Verdict::SizeMismatch {
            observed_size: metadata.len(),
        });
    }

    if let Some(size) = expected_size {
        if metadata.len() != size {
            return Ok(Verdict::SizeMismatch {
                observed_size: metadata.len(),
            });
        }
    }

    let observed = hash_file(path, expected.algorithm())?;
    if expected.matches_hex(&observed.hex) {
        Ok(Verdict::Verified { observed })
    } else {
        Ok(Verdict::ChecksumMismatch { observed })
    }
}
