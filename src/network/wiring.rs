use std::path::Path;
use tracing::{debug, info, warn};

use super::namespace;
use super::types::valid_gateway;
use crate::config::RuntimeConfig;
use crate::error::{ExecutorError, Result};
use crate::state::WiredInterface;
use crate::utils::{failure_message, is_process_alive, run_with_timeout};

/// Linux interface names are limited to 15 bytes
const IFNAME_MAX: usize = 15;

/// Interface wiring seam
#[async_trait::async_trait]
pub trait InterfaceWiring: Send + Sync {
    /// Attach a resolved interface to a running container
    async fn attach(&self, container: &str, iface: &WiredInterface) -> Result<()>;

    /// Remove the guest device, its host-side peer and the namespace alias.
    /// Absent devices are skipped.
    async fn detach(&self, namespace_pid: Option<u32>, iface: &WiredInterface) -> Result<()>;
}

/// Arguments for the wiring tool:
/// `{bridge} -i {device} {container} {ip}/{mask}[@{gateway}]`
///
/// The gateway clause is only added for a dotted-quad gateway.
pub fn attach_args(container: &str, iface: &WiredInterface) -> Vec<String> {
    let mut cidr = format!("{}/{}", iface.address, iface.netmask);
    if let Some(gateway) = valid_gateway(iface.gateway.as_deref()) {
        cidr.push('@');
        cidr.push_str(gateway);
    }
    vec![
        iface.bridge.clone(),
        "-i".to_string(),
        iface.device.clone(),
        container.to_string(),
        cidr,
    ]
}

/// Host side of the veth pair created by the wiring tool
pub fn host_peer_name(device: &str, pid: u32) -> String {
    let mut name = format!("v{}pl{}", device, pid);
    name.truncate(IFNAME_MAX);
    name
}

/// `pipework` based wiring
pub struct PipeworkWiring {
    config: RuntimeConfig,
}

impl PipeworkWiring {
    pub fn new(config: RuntimeConfig) -> Self {
        Self { config }
    }

    fn ip(&self) -> &Path {
        &self.config.ip_binary
    }
}

#[async_trait::async_trait]
impl InterfaceWiring for PipeworkWiring {
    async fn attach(&self, container: &str, iface: &WiredInterface) -> Result<()> {
        info!(target: "wiring", device = %iface.device, container = %container, "configuring interface");

        let wiring_err = |reason: String| ExecutorError::Wiring {
            container: container.to_string(),
            device: iface.device.clone(),
            reason,
        };

        let args = attach_args(container, iface);
        debug!(target: "wiring", args = ?args, "wiring arguments");

        let output = run_with_timeout(
            &self.config.wiring_binary,
            &args,
            self.config.command_timeout(),
        )
        .await
        .map_err(|e| wiring_err(format!("{:#}", e)))?;

        if !output.status.success() {
            return Err(wiring_err(failure_message(&output)));
        }

        info!(
            target: "wiring",
            device = %iface.device,
            address = %iface.address,
            container = %container,
            "interface configured"
        );
        Ok(())
    }

    async fn detach(&self, namespace_pid: Option<u32>, iface: &WiredInterface) -> Result<()> {
        let detach_err = |e: anyhow::Error| ExecutorError::Detach {
            device: iface.device.clone(),
            reason: format!("{:#}", e),
        };

        let Some(pid) = namespace_pid else {
            warn!(target: "wiring", device = %iface.device, "no namespace pid recorded, nothing to detach");
            return Ok(());
        };

        let timeout = self.config.command_timeout();
        let netns_dir = &self.config.netns_dir;
        let mut first_error = None;

        // The guest device lives and dies with the namespace
        if is_process_alive(pid) {
            let ns_name = pid.to_string();
            let guest = match namespace::create_alias(netns_dir, pid).await {
                Ok(_) => namespace::delete_link(self.ip(), Some(&ns_name), &iface.device, timeout)
                    .await,
                Err(e) => Err(e),
            };
            if let Err(e) = guest {
                warn!(target: "wiring", device = %iface.device, pid = pid, error = %e, "failed to delete guest device");
                first_error.get_or_insert(e);
            }
        } else {
            debug!(target: "wiring", pid = pid, "namespace owner gone, skipping guest device");
        }

        let peer = host_peer_name(&iface.device, pid);
        if let Err(e) = namespace::delete_link(self.ip(), None, &peer, timeout).await {
            warn!(target: "wiring", device = %peer, error = %e, "failed to delete host peer");
            first_error.get_or_insert(e);
        }

        if let Err(e) = namespace::delete_alias(netns_dir, pid).await {
            first_error.get_or_insert(e);
        }

        match first_error {
            Some(e) => Err(detach_err(e)),
            None => {
                info!(target: "wiring", device = %iface.device, pid = pid, "interface detached");
                Ok(())
            }
        }
    }
}
