pub mod atomic_write;
pub mod copy;
pub mod promote;
pub mod remove;

pub use atomic_write::{AtomicWriteOptions, atomic_write};
pub use copy::{copy_file, create_parent_dirs};
pub use promote::{PromoteMethod, PromoteOptions, promote};
pub use remove::{remove_dir_all_if_exists, remove_file_if_exists};
