//! Executor configuration.
//!
//! Endpoints, binaries and timeouts live in one [`ExecutorConfig`] value that is
//! handed to each client at construction. Every section has defaults so an empty
//! (or missing) config file is valid.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default network allocation service endpoint
pub const DEFAULT_ALLOCATOR_URL: &str = "http://networks:5000/v1/networks";

/// Default Consul agent endpoint
pub const DEFAULT_DISCOVERY_URL: &str = "http://127.0.0.1:8500";

/// Default descriptor store root
pub const DEFAULT_STORE_DIR: &str = "/var/lib/node-executor";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub runtime: RuntimeConfig,
    pub allocator: AllocatorConfig,
    pub discovery: DiscoveryConfig,
    pub readiness: ReadinessConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Container runtime CLI
    pub binary: PathBuf,
    /// Interface wiring tool
    pub wiring_binary: PathBuf,
    /// iproute2 binary used for namespace cleanup
    pub ip_binary: PathBuf,
    /// Where `ip netns` looks for named namespaces
    pub netns_dir: PathBuf,
    /// CFS period used to express cpu limits
    pub cpu_period: u64,
    pub pull_timeout_secs: u64,
    pub command_timeout_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("docker"),
            wiring_binary: PathBuf::from("pipework"),
            ip_binary: PathBuf::from("ip"),
            netns_dir: PathBuf::from("/var/run/netns"),
            cpu_period: 50_000,
            pull_timeout_secs: 600,
            command_timeout_secs: 60,
        }
    }
}

impl RuntimeConfig {
    pub fn pull_timeout(&self) -> Duration {
        Duration::from_secs(self.pull_timeout_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocatorConfig {
    /// Base URL of the networks collection, e.g. `http://networks:5000/v1/networks`
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_ALLOCATOR_URL.to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub url: String,
    pub timeout_secs: u64,
    /// ACL token sent with every agent request
    pub token: Option<String>,
    /// Whether the agent accepts several checks in one service registration
    pub supports_multiple_checks: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DISCOVERY_URL.to_string(),
            timeout_secs: 10,
            token: None,
            supports_multiple_checks: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessConfig {
    pub poll_interval_ms: u64,
    pub timeout_secs: u64,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 250,
            timeout_secs: 30,
        }
    }
}

impl ReadinessConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub root: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_STORE_DIR),
        }
    }
}

impl ExecutorConfig {
    /// Parse a YAML document
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).context("parsing executor config")
    }

    /// Load from a YAML file, or fall back to defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config file {}", path.display()))?;
                Self::from_yaml(&content)
            }
            None => Ok(Self::default()),
        }
    }
}
