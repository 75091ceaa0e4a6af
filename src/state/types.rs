use serde::{Deserialize, Serialize};

/// Container runtime state, persisted next to the descriptor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerRuntimeState {
    /// Runtime container name
    pub id: Option<String>,
    /// Machine running the container
    pub host: Option<String>,
    /// Pid owning the container's network namespace
    pub namespace_pid: Option<u32>,
    pub status: ContainerStatus,
    /// Interfaces wired during provisioning, in wiring order
    #[serde(default)]
    pub interfaces: Vec<WiredInterface>,
    pub last_updated: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    Pending,
    Running,
    Stopped,
    Destroyed,
    Failed,
}

impl std::fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ContainerStatus::Pending => "pending",
            ContainerStatus::Running => "running",
            ContainerStatus::Stopped => "stopped",
            ContainerStatus::Destroyed => "destroyed",
            ContainerStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// An interface as it was actually wired
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WiredInterface {
    pub device: String,
    pub network: String,
    pub address: String,
    pub netmask: String,
    pub bridge: String,
    #[serde(default)]
    pub gateway: Option<String>,
    /// Address came from the allocator and must be released on teardown
    pub dynamic: bool,
}

impl ContainerRuntimeState {
    pub fn pending() -> Self {
        Self {
            id: None,
            host: None,
            namespace_pid: None,
            status: ContainerStatus::Pending,
            interfaces: Vec::new(),
            last_updated: chrono::Utc::now(),
        }
    }

    /// Set status and bump the update timestamp
    pub fn mark(&mut self, status: ContainerStatus) {
        self.status = status;
        self.last_updated = chrono::Utc::now();
    }
}
