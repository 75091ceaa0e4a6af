pub mod docker;
pub mod options;

pub use docker::DockerRuntime;
pub use options::{
    generate_resource_limits, generate_run_opts, generate_volume_opts, BASE_RUN_OPTS,
};

use crate::descriptor::NodeDescriptor;
use crate::error::Result;

/// Whether `run` returns once the container started or stays attached to it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Daemon,
    Foreground,
}

impl RunMode {
    pub fn is_daemon(self) -> bool {
        matches!(self, RunMode::Daemon)
    }
}

/// Container runtime seam (image + process lifecycle)
#[async_trait::async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn pull(&self, image: &str) -> Result<()>;

    /// Create and start the container.
    ///
    /// In [`RunMode::Foreground`] this only returns once the container exits.
    async fn run(&self, descriptor: &NodeDescriptor, mode: RunMode) -> Result<()>;

    /// Pid of the container's init process, `None` while it is not running
    async fn namespace_pid(&self, name: &str) -> Result<Option<u32>>;

    /// Stop the container; stopping an absent container is a no-op
    async fn stop(&self, name: &str) -> Result<()>;

    /// Remove the container and its storage; removing an absent container is a no-op
    async fn remove(&self, name: &str) -> Result<()>;
}
