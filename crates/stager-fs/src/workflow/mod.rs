pub mod lock;
pub mod workspace;

pub use lock::InstanceLock;
pub use workspace::Workspace;
