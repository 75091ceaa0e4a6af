use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// Shared metadata of a network, as served by the allocation service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInfo {
    pub bridge: String,
    pub netmask: String,
    #[serde(default)]
    pub gateway: Option<String>,
}

/// Body of an allocation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationRequest {
    pub cluster: String,
    pub node: String,
}

/// Body returned by a successful allocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationResponse {
    pub address: String,
}

/// Body marking an address as free again
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressRelease {
    pub status: String,
    pub cluster: String,
    pub node: String,
}

impl AddressRelease {
    pub fn free() -> Self {
        Self {
            status: "free".to_string(),
            cluster: "_".to_string(),
            node: "_".to_string(),
        }
    }
}

/// Gateway usable as a default route: a dotted-quad IPv4 address
///
/// Parsed as an [`Ipv4Addr`] after trimming surrounding whitespace, which is stricter
/// than a plain dotted-quad match: octets above 255 and leading zeros (`010.0.0.1`)
/// are rejected.
pub fn valid_gateway(gateway: Option<&str>) -> Option<&str> {
    gateway
        .map(str::trim)
        .filter(|g| g.parse::<Ipv4Addr>().is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_gateway() {
        assert_eq!(valid_gateway(Some("10.112.0.1")), Some("10.112.0.1"));
        assert_eq!(valid_gateway(Some("")), None);
        assert_eq!(valid_gateway(None), None);
        assert_eq!(valid_gateway(Some("_")), None);
        assert_eq!(valid_gateway(Some("10.112.0")), None);
        assert_eq!(valid_gateway(Some("gateway.local")), None);
        assert_eq!(valid_gateway(Some("fe80::1")), None);
    }

    #[test]
    fn test_valid_gateway_is_stricter_than_dotted_quad() {
        assert_eq!(valid_gateway(Some(" 10.112.0.1\n")), Some("10.112.0.1"));
        assert_eq!(valid_gateway(Some("010.0.0.1")), None);
        assert_eq!(valid_gateway(Some("10.0.0.256")), None);
    }

    #[test]
    fn test_release_body() {
        let json = serde_json::to_value(AddressRelease::free()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"status": "free", "cluster": "_", "node": "_"})
        );
    }

    #[test]
    fn test_network_info_without_gateway() {
        let info: NetworkInfo =
            serde_json::from_str(r#"{"bridge": "virbrSTORAGE", "netmask": "16"}"#).unwrap();
        assert_eq!(info.bridge, "virbrSTORAGE");
        assert!(info.gateway.is_none());
    }
}
