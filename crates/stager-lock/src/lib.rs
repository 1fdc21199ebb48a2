//! Immutable artifact lockfile model.
//!
//! A [`Lockfile`] is the sole authority for what a correct install looks like:
//! every artifact's destination, checksum, and size come from it and nowhere
//! else. This crate parses and validates the document and resolves relative
//! artifact paths through a [`RootTable`]; it never writes a lockfile.

mod error;
mod kind;
mod lockfile;
mod path;
mod roots;

pub use error::{LockError, Result};
pub use kind::ArtifactKind;
pub use lockfile::{Artifact, LOCKFILE_SCHEMA_VERSION, Lockfile};
pub use path::validate_relative_path;
pub use roots::{RootPrefix, RootTable};
