use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::LockError;

/// Post-verification handling an artifact needs.
///
/// Closed on purpose: a new kind has to be handled everywhere this enum is
/// matched before it can be installed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Promoted as-is.
    File,
    /// Promoted, and extracted into the auxiliary extraction root.
    Archive,
}

impl ArtifactKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::File => "file",
            ArtifactKind::Archive => "archive",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for ArtifactKind {
    type Err = LockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(ArtifactKind::File),
            "archive" => Ok(ArtifactKind::Archive),
            other => Err(LockError::UnsupportedKind(other.to_string())),
        }
    }
}
