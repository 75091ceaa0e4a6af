pub mod lock;
pub mod store;
pub mod types;
pub mod utils;

// Re-export all state types and functions for convenience
pub use lock::NodeLock;
pub use store::{DescriptorStore, FileStore};
pub use types::{ContainerRuntimeState, ContainerStatus, WiredInterface};
pub use utils::{node_id_to_path, validate_name};
