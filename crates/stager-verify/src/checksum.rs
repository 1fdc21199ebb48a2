use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VerifyError};

/// Number of hex characters of a digest that appear in log lines.
pub const HASH_PREFIX_LEN: usize = 12;

/// Digest algorithms a lockfile may pin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
}

impl HashAlgorithm {
    /// Digest length in bytes.
    pub fn digest_len(self) -> usize {
        match self {
            HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Sha256 => 32,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HashAlgorithm::Sha1 => "sha1",
            HashAlgorithm::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for HashAlgorithm {
    type Err = VerifyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sha1" => Ok(HashAlgorithm::Sha1),
            "sha256" => Ok(HashAlgorithm::Sha256),
            other => Err(VerifyError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// An algorithm-tagged, lowercase-hex digest.
///
/// Construction validates the value, so a `Checksum` in hand always has the
/// right length for its algorithm.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawChecksum")]
pub struct Checksum {
    algorithm: HashAlgorithm,
    value:     String,
}

#[derive(Deserialize)]
struct RawChecksum {
    algorithm: HashAlgorithm,
    value:     String,
}

impl TryFrom<RawChecksum> for Checksum {
    type Error = VerifyError;

    fn try_from(raw: RawChecksum) -> Result<Self> { Checksum::new(raw.algorithm, raw.value) }
}

impl Checksum {
    pub fn new(algorithm: HashAlgorithm, value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        let invalid = |reason| VerifyError::InvalidChecksum {
            algorithm: algorithm.as_str(),
            value: value.clone(),
            reason,
        };

        if value.len() != algorithm.digest_len() * 2 {
            return Err(invalid("wrong length"));
        }
        if !value.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)) {
            return Err(invalid("not lowercase hex"));
        }

        Ok(Self { algorithm, value })
    }

    /// Build a checksum from raw digest bytes.
    pub fn from_digest(algorithm: HashAlgorithm, digest: &[u8]) -> Result<Self> {
        Self::new(algorithm, hex::encode(digest))
    }

    pub fn algorithm(&self) -> HashAlgorithm { self.algorithm }

    pub fn value(&self) -> &str { &self.value }

    /// Short prefix used in log lines.
    pub fn prefix(&self) -> &str { &self.value[..HASH_PREFIX_LEN] }

    pub fn matches_hex(&self, hex: &str) -> bool { self.value == hex }

    pub fn matches_bytes(&self, digest: &[u8]) -> bool { self.value == hex::encode(digest) }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.value)
    }
}
