//! Types for the orchestrator crate.

use serde::{Deserialize, Serialize};

/// Which set of TLS keys a workload deployment mounts.
///
/// Selected from the number of credential files the caller uploaded: the
/// baseline set carries 3 keys, the extended set adds the PEM client pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisioningVariant {
    /// `client.key`, `client.crt`, `peer.crt`.
    Baseline,
    /// Baseline plus `client_pem.key` and `client_pem.crt`.
    Extended,
}

impl ProvisioningVariant {
    /// Select the variant from the number of uploaded credential files.
    #[must_use]
    pub fn from_material_count(count: usize) -> Self {
        if count > 3 {
            Self::Extended
        } else {
            Self::Baseline
        }
    }
}

/// Replica counts for a managed workload deployment, as reported by the
/// orchestrator. Read-only to this system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentSummary {
    /// Deployment name.
    pub name: String,
    /// Replicas currently available.
    pub available_replicas: i32,
    /// Replicas the orchestrator cannot make available.
    pub unavailable_replicas: i32,
}

/// Configuration for the Kubernetes orchestrator backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Namespace the workload objects live in.
    pub namespace: String,
    /// Extra host aliases injected into workload pods, as `ip:hostname`.
    pub dns: Vec<String>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            dns: Vec::new(),
        }
    }
}

impl OrchestratorConfig {
    /// Load configuration from environment variables.
    ///
    /// Supported variables: `ORCHESTRATOR_NAMESPACE`, `ORCHESTRATOR_DNS`
    /// (comma-separated `ip:hostname` pairs).
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("ORCHESTRATOR_NAMESPACE") {
            config.namespace = val;
        }
        if let Ok(val) = std::env::var("ORCHESTRATOR_DNS") {
            config.dns = val
                .split(',')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_from_material_count() {
        assert_eq!(
            ProvisioningVariant::from_material_count(3),
            ProvisioningVariant::Baseline
        );
        assert_eq!(
            ProvisioningVariant::from_material_count(2),
            ProvisioningVariant::Baseline
        );
        assert_eq!(
            ProvisioningVariant::from_material_count(5),
            ProvisioningVariant::Extended
        );
        assert_eq!(
            ProvisioningVariant::from_material_count(4),
            ProvisioningVariant::Extended
        );
    }
}
