pub mod consul;

pub use consul::ConsulRegistrar;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Interval between TCP health checks
pub const CHECK_INTERVAL: &str = "30s";

/// Timeout of a single TCP health check
pub const CHECK_TIMEOUT: &str = "4s";

/// TCP health check attached to a service instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    #[serde(rename = "CheckID")]
    pub id: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "TCP")]
    pub tcp: String,
    #[serde(rename = "Interval")]
    pub interval: String,
    #[serde(rename = "Timeout")]
    pub timeout: String,
}

/// A container announced as a service instance. Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRegistration {
    /// Instance id, the container name
    pub id: String,
    pub service: String,
    pub address: String,
    pub port: u16,
    pub tags: Vec<String>,
    pub checks: Vec<HealthCheck>,
}

impl ServiceRegistration {
    pub fn new(
        container: &str,
        service: &str,
        address: &str,
        tags: &[String],
        port: u16,
        check_ports: &[u16],
    ) -> Self {
        Self {
            id: container.to_string(),
            service: service.to_string(),
            address: address.to_string(),
            port,
            tags: tags.to_vec(),
            checks: generate_checks(container, address, check_ports),
        }
    }
}

/// One TCP check per port, in input order
pub fn generate_checks(container: &str, address: &str, check_ports: &[u16]) -> Vec<HealthCheck> {
    check_ports
        .iter()
        .map(|port| HealthCheck {
            id: format!("{}-port{}", container, port),
            name: format!("Check TCP port {}", port),
            tcp: format!("{}:{}", address, port),
            interval: CHECK_INTERVAL.to_string(),
            timeout: CHECK_TIMEOUT.to_string(),
        })
        .collect()
}

/// Service discovery seam
#[async_trait::async_trait]
pub trait ServiceRegistrar: Send + Sync {
    /// Whether every check can be submitted with the registration.
    /// When false only the first check is monitored.
    fn supports_multiple_checks(&self) -> bool;

    /// Register (or re-register) an instance; repeating a registration is a no-op
    async fn register(&self, registration: &ServiceRegistration) -> Result<()>;

    /// Remove an instance; removing an unknown instance is a no-op
    async fn deregister(&self, id: &str) -> Result<()>;
}
