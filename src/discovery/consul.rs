use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

use super::{HealthCheck, ServiceRegistrar, ServiceRegistration};
use crate::config::DiscoveryConfig;
use crate::error::{ExecutorError, Result};

/// Consul agent client
pub struct ConsulRegistrar {
    base_url: String,
    token: Option<String>,
    multiple_checks: bool,
    client: reqwest::Client,
}

/// Agent service definition
#[derive(Debug, Serialize)]
pub struct AgentService<'a> {
    #[serde(rename = "ID")]
    pub id: &'a str,
    #[serde(rename = "Name")]
    pub name: &'a str,
    #[serde(rename = "Tags")]
    pub tags: &'a [String],
    #[serde(rename = "Address")]
    pub address: &'a str,
    #[serde(rename = "Port")]
    pub port: u16,
    #[serde(rename = "Check", skip_serializing_if = "Option::is_none")]
    pub check: Option<&'a HealthCheck>,
    #[serde(rename = "Checks", skip_serializing_if = "Option::is_none")]
    pub checks: Option<&'a [HealthCheck]>,
}

impl<'a> AgentService<'a> {
    /// Build the payload, keeping only the first check unless the agent takes several
    pub fn from_registration(registration: &'a ServiceRegistration, multiple_checks: bool) -> Self {
        let (check, checks) = if multiple_checks && registration.checks.len() > 1 {
            (None, Some(registration.checks.as_slice()))
        } else {
            (registration.checks.first(), None)
        };

        Self {
            id: &registration.id,
            name: &registration.service,
            tags: &registration.tags,
            address: &registration.address,
            port: registration.port,
            check,
            checks,
        }
    }
}

impl ConsulRegistrar {
    pub fn new(config: &DiscoveryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ExecutorError::Registration {
                name: "-".to_string(),
                reason: format!("building HTTP client: {}", e),
            })?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            multiple_checks: config.supports_multiple_checks,
            client,
        })
    }

    fn put(&self, path: &str) -> reqwest::RequestBuilder {
        let req = self.client.put(format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => req.header("X-Consul-Token", token),
            None => req,
        }
    }
}

#[async_trait::async_trait]
impl ServiceRegistrar for ConsulRegistrar {
    fn supports_multiple_checks(&self) -> bool {
        self.multiple_checks
    }

    async fn register(&self, registration: &ServiceRegistration) -> Result<()> {
        let reg_err = |reason: String| ExecutorError::Registration {
            name: registration.id.clone(),
            reason,
        };

        info!(
            target: "discovery",
            service = %registration.id,
            name = %registration.service,
            address = %registration.address,
            "registering the container in service discovery"
        );

        let payload = AgentService::from_registration(registration, self.multiple_checks);
        let resp = self
            .put("/v1/agent/service/register")
            .json(&payload)
            .send()
            .await
            .map_err(|e| reg_err(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(reg_err(format!("{}: {}", status, body.trim())));
        }
        Ok(())
    }

    async fn deregister(&self, id: &str) -> Result<()> {
        let dereg_err = |reason: String| ExecutorError::Deregistration {
            name: id.to_string(),
            reason,
        };

        info!(target: "discovery", service = %id, "deregistering the container from service discovery");

        let resp = self
            .put(&format!("/v1/agent/service/deregister/{}", id))
            .send()
            .await
            .map_err(|e| dereg_err(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        if status == StatusCode::NOT_FOUND {
            warn!(target: "discovery", service = %id, "service not registered, nothing to remove");
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(dereg_err(format!("{}: {}", status, body.trim())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration() -> ServiceRegistration {
        ServiceRegistration::new(
            "9-slave1",
            "cdh",
            "10.0.0.5",
            &["yarn".to_string()],
            22,
            &[22, 5000],
        )
    }

    #[test]
    fn test_single_check_payload() {
        let reg = registration();
        let json = serde_json::to_value(AgentService::from_registration(&reg, false)).unwrap();

        assert_eq!(json["ID"], "9-slave1");
        assert_eq!(json["Name"], "cdh");
        assert_eq!(json["Port"], 22);
        assert_eq!(json["Check"]["CheckID"], "9-slave1-port22");
        assert!(json.get("Checks").is_none());
    }

    #[test]
    fn test_multiple_checks_payload() {
        let reg = registration();
        let json = serde_json::to_value(AgentService::from_registration(&reg, true)).unwrap();

        assert!(json.get("Check").is_none());
        let checks = json["Checks"].as_array().unwrap();
        assert_eq!(checks.len(), 2);
        assert_eq!(checks[1]["TCP"], "10.0.0.5:5000");
    }

    #[test]
    fn test_no_checks_payload() {
        let reg = ServiceRegistration::new("a", "b", "10.0.0.1", &[], 22, &[]);
        let json = serde_json::to_value(AgentService::from_registration(&reg, false)).unwrap();
        assert!(json.get("Check").is_none());
        assert!(json.get("Checks").is_none());
    }
}
