pub mod allocator;
pub mod namespace;
pub mod types;
pub mod wiring;

pub use allocator::{AddressAllocator, HttpAllocator};
pub use types::*;
pub use wiring::{attach_args, host_peer_name, InterfaceWiring, PipeworkWiring};
