//! Checksum primitives for locked artifacts.
//!
//! Every verification decision made by the installer reduces to the helpers in
//! this crate: a [`Checksum`] pinned by a lockfile or snapshot manifest, and a
//! [`Verdict`] computed from bytes on the local filesystem.
//!
//! # Key Features
//!
//! - **Algorithm-tagged**: checksums carry their algorithm and are validated on construction
//! - **Streaming**: files are hashed through [`VerifiedReader`], never loaded whole
//! - **Cheap pre-check**: a declared size is compared against metadata before hashing
//!
//! # Example
//!
//! ```
//! use stager_verify::{Checksum, HashAlgorithm, Hasher, Sha1Hasher};
//!
//! let expected = Checksum::new(
//!     HashAlgorithm::Sha1,
//!     "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed",
//! ).unwrap();
//!
//! let mut hasher = Sha1Hasher::new();
//! hasher.update(b"hello world");
//! assert!(expected.matches_bytes(&hasher.finalize()));
//! ```

pub use self::checksum::{Checksum, HASH_PREFIX_LEN, HashAlgorithm};
pub use self::error::{Result, VerifyError};
pub use self::file::{FileDigest, Verdict, hash_file, verify_file};
pub use self::hasher::{AnyHasher, DigestHasher, Hasher, Sha1Hasher, Sha256Hasher};
pub use self::reader::VerifiedReader;

mod checksum;
mod error;
mod file;
mod hasher;
mod reader;
