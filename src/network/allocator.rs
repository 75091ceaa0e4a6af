use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::types::{AddressRelease, AllocationRequest, AllocationResponse, NetworkInfo};
use crate::config::AllocatorConfig;
use crate::error::{ExecutorError, Result};

/// Network address allocation seam
///
/// Uniqueness of addresses under concurrent callers is the service's job: the
/// client only ever uses its atomic "claim next free address" call.
#[async_trait::async_trait]
pub trait AddressAllocator: Send + Sync {
    /// Bridge / netmask / gateway shared by every member of a network
    async fn network_info(&self, network: &str) -> Result<NetworkInfo>;

    async fn allocate(&self, network: &str, node: &str, cluster: &str) -> Result<String>;

    /// Mark an address free; releasing a free address is a no-op
    async fn deallocate(&self, network: &str, address: &str) -> Result<()>;
}

/// Client for the HTTP network allocation service
pub struct HttpAllocator {
    base_url: String,
    client: reqwest::Client,
}

impl HttpAllocator {
    pub fn new(config: &AllocatorConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ExecutorError::AllocationService {
                network: "-".to_string(),
                reason: format!("building HTTP client: {}", e),
            })?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn network_url(&self, network: &str) -> String {
        format!("{}/{}", self.base_url, network)
    }
}

fn service_err(network: &str, reason: impl std::fmt::Display) -> ExecutorError {
    ExecutorError::AllocationService {
        network: network.to_string(),
        reason: reason.to_string(),
    }
}

#[async_trait::async_trait]
impl AddressAllocator for HttpAllocator {
    async fn network_info(&self, network: &str) -> Result<NetworkInfo> {
        let url = self.network_url(network);
        debug!(target: "allocator", url = %url, "fetching network info");

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| service_err(network, e))?;

        if !resp.status().is_success() {
            return Err(service_err(
                network,
                format!("GET {} returned {}", url, resp.status()),
            ));
        }

        resp.json::<NetworkInfo>()
            .await
            .map_err(|e| service_err(network, format!("decoding network info: {}", e)))
    }

    async fn allocate(&self, network: &str, node: &str, cluster: &str) -> Result<String> {
        let url = self.network_url(network);
        let body = AllocationRequest {
            cluster: cluster.to_string(),
            node: node.to_string(),
        };

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| service_err(network, e))?;

        match resp.status() {
            StatusCode::OK => {}
            StatusCode::CONFLICT => {
                return Err(ExecutorError::AllocationExhausted {
                    network: network.to_string(),
                })
            }
            status => {
                return Err(service_err(
                    network,
                    format!("POST {} returned {}", url, status),
                ))
            }
        }

        let allocation = resp
            .json::<AllocationResponse>()
            .await
            .map_err(|e| service_err(network, format!("decoding allocation: {}", e)))?;

        if allocation.address.trim().is_empty() {
            return Err(service_err(network, "allocation returned an empty address"));
        }

        info!(target: "allocator", network = %network, node = %node, address = %allocation.address, "address allocated");
        Ok(allocation.address)
    }

    async fn deallocate(&self, network: &str, address: &str) -> Result<()> {
        let url = format!("{}/addresses/{}", self.network_url(network), address);
        info!(target: "allocator", network = %network, address = %address, "deallocating network address");

        let resp = self
            .client
            .put(&url)
            .json(&AddressRelease::free())
            .send()
            .await
            .map_err(|e| service_err(network, e))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        if status == StatusCode::NOT_FOUND {
            warn!(target: "allocator", network = %network, address = %address, "address unknown to the service, nothing to release");
            return Ok(());
        }
        Err(service_err(
            network,
            format!("PUT {} returned {}", url, status),
        ))
    }
}
