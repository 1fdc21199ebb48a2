//! Filesystem primitives for staged, resumable installation.
//!
//! # Architecture
//!
//! - [`primitives`] - single-file operations: promote, atomic write, copy, remove
//! - [`workflow`] - staging workspaces and the per-instance advisory lock
//!
//! Every operation is idempotent or fails with the path it was working on.

mod error;
pub mod primitives;
pub mod workflow;

pub use error::{Error, Result};
pub use primitives::{
    AtomicWriteOptions, PromoteMethod, PromoteOptions, atomic_write, copy_file,
    create_parent_dirs, promote, remove_dir_all_if_exists, remove_file_if_exists,
};
pub use workflow::{InstanceLock, Workspace};
