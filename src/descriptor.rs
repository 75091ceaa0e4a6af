//! Declarative node descriptor.
//!
//! The registry (or a YAML file) describes a node loosely: ports and tags come as
//! comma separated strings, interface addresses may be `_` or empty. [`RawDescriptor`]
//! mirrors that document and [`NodeDescriptor::from_raw`] turns it into a validated,
//! immutable value that the rest of the crate works with.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{ExecutorError, Result};
use crate::state::validate_name;

/// Port used when the descriptor names none
pub const DEFAULT_PORT: u16 = 22;

/// Volume access mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    #[default]
    Rw,
    Ro,
}

impl std::fmt::Display for AccessMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessMode::Rw => write!(f, "rw"),
            AccessMode::Ro => write!(f, "ro"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSpec {
    pub origin: String,
    pub destination: String,
    #[serde(default)]
    pub mode: AccessMode,
}

/// How an interface gets its address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressMode {
    Static(String),
    Dynamic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceSpec {
    pub device: String,
    pub mode: AddressMode,
    /// Network name used for allocator lookups
    pub network: String,
    pub bridge: Option<String>,
    pub netmask: Option<String>,
    pub gateway: Option<String>,
}

impl InterfaceSpec {
    pub fn is_dynamic(&self) -> bool {
        matches!(self.mode, AddressMode::Dynamic)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDescriptor {
    pub node_name: String,
    pub instance_id: String,
    /// Cluster / service name used for discovery and allocation
    pub service: String,
    pub image: String,
    pub extra_options: String,
    pub cpu: u32,
    pub mem_mb: u64,
    pub volumes: Vec<VolumeSpec>,
    pub interfaces: Vec<InterfaceSpec>,
    pub tags: Vec<String>,
    pub check_ports: Vec<u16>,
    pub port: u16,
}

impl NodeDescriptor {
    /// Runtime container name, stable across retries
    pub fn container_name(&self) -> String {
        container_name(&self.instance_id, &self.node_name)
    }

    /// Parse and validate a YAML descriptor document
    pub fn from_yaml(node_id: &str, content: &str) -> Result<Self> {
        let raw: RawDescriptor =
            serde_yaml::from_str(content).map_err(|e| ExecutorError::InvalidDescriptor {
                node: node_id.to_string(),
                reason: e.to_string(),
            })?;
        Self::from_raw(node_id, raw)
    }

    pub fn from_raw(node_id: &str, raw: RawDescriptor) -> Result<Self> {
        let invalid = |reason: String| ExecutorError::InvalidDescriptor {
            node: node_id.to_string(),
            reason,
        };

        validate_name(&raw.name).map_err(|e| invalid(format!("node name: {e}")))?;
        validate_name(&raw.instance_id).map_err(|e| invalid(format!("instance id: {e}")))?;

        if raw.image.trim().is_empty() {
            return Err(invalid("image is empty".to_string()));
        }
        if raw.networks.is_empty() {
            return Err(invalid("at least one network interface is required".to_string()));
        }

        let mut seen_volumes = HashSet::new();
        for volume in &raw.disks {
            if !seen_volumes.insert((volume.origin.as_str(), volume.destination.as_str())) {
                return Err(invalid(format!(
                    "duplicate volume {}:{}",
                    volume.origin, volume.destination
                )));
            }
        }

        let mut seen_devices = HashSet::new();
        let mut interfaces = Vec::with_capacity(raw.networks.len());
        for net in raw.networks {
            if !seen_devices.insert(net.name.clone()) {
                return Err(invalid(format!("duplicate interface {}", net.name)));
            }
            interfaces.push(net.into_spec());
        }

        let port = match raw.port {
            Some(p) => parse_port(&p).map_err(|e| invalid(format!("port: {e}")))?,
            None => DEFAULT_PORT,
        };

        let check_ports = match raw.check_ports {
            Some(list) => split_list(&list)
                .iter()
                .map(|p| parse_port(p))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| invalid(format!("check_ports: {e}")))?,
            None => vec![DEFAULT_PORT],
        };

        Ok(Self {
            node_name: raw.name,
            instance_id: raw.instance_id,
            service: raw.cluster,
            image: raw.image,
            extra_options: raw.docker_opts.unwrap_or_default(),
            cpu: raw.cpu,
            mem_mb: raw.mem,
            volumes: raw.disks,
            interfaces,
            tags: raw.tags.as_deref().map(split_list).unwrap_or_default(),
            check_ports,
            port,
        })
    }
}

/// Deterministic container name for an instance / node pair
pub fn container_name(instance_id: &str, node_name: &str) -> String {
    format!("{}-{}", instance_id, node_name)
}

/// Descriptor document as stored in the registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDescriptor {
    pub name: String,
    pub instance_id: String,
    pub cluster: String,
    #[serde(alias = "docker_image")]
    pub image: String,
    #[serde(default)]
    pub docker_opts: Option<String>,
    pub cpu: u32,
    pub mem: u64,
    #[serde(default)]
    pub disks: Vec<VolumeSpec>,
    #[serde(default)]
    pub networks: Vec<RawInterface>,
    /// Comma separated
    #[serde(default)]
    pub tags: Option<String>,
    /// Comma separated
    #[serde(default)]
    pub check_ports: Option<String>,
    #[serde(default)]
    pub port: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawInterface {
    /// Device name inside the container (eth0, eth1, ...)
    pub name: String,
    #[serde(rename = "type", default = "default_interface_type")]
    pub kind: String,
    pub networkname: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub bridge: Option<String>,
    #[serde(default)]
    pub netmask: Option<String>,
    #[serde(default)]
    pub gateway: Option<String>,
}

fn default_interface_type() -> String {
    "dynamic".to_string()
}

impl RawInterface {
    fn into_spec(self) -> InterfaceSpec {
        // An unassigned static address is treated as dynamic
        let mode = match self.address.as_deref().map(str::trim) {
            Some(addr) if self.kind == "static" && !is_unassigned(addr) => {
                AddressMode::Static(addr.to_string())
            }
            _ => AddressMode::Dynamic,
        };

        InterfaceSpec {
            device: self.name,
            mode,
            network: self.networkname,
            bridge: non_empty(self.bridge),
            netmask: non_empty(self.netmask),
            gateway: non_empty(self.gateway),
        }
    }
}

fn is_unassigned(addr: &str) -> bool {
    addr.is_empty() || addr == "_" || addr == "dynamic"
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty() && v != "_")
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_port(s: &str) -> std::result::Result<u16, String> {
    s.trim()
        .parse::<u16>()
        .map_err(|_| format!("invalid port {:?}", s))
}
