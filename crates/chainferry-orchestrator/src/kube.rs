//! Kubernetes orchestrator implementation.
//!
//! This module provides the `KubeOrchestrator` which manages workload
//! Deployments and their TLS ConfigMaps through the Kubernetes API.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::Client;
use tracing::{info, warn};

use crate::deployment::{
    apply_provisioning, build_config_map, build_deployment, config_map_name,
};
use crate::error::{is_conflict, is_not_found};
use crate::types::{DeploymentSummary, OrchestratorConfig, ProvisioningVariant};
use crate::{OrchestratorError, Result};

/// Attempts at a read-modify-write update before giving up on conflicts.
const UPDATE_ATTEMPTS: usize = 3;

/// The `Orchestrator` trait defines the interface for workload lifecycle
/// management on the cluster.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Create a Deployment for a workload, initially unprovisioned.
    ///
    /// # Errors
    ///
    /// Returns an error if the Deployment cannot be created.
    async fn create_deployment(
        &self,
        name: &str,
        image: &str,
        env: &[String],
        cmd: &[String],
    ) -> Result<()>;

    /// Attach uploaded TLS material to a Deployment and scale it to one
    /// replica.
    ///
    /// # Errors
    ///
    /// Returns an error if the update keeps conflicting or the API fails.
    async fn update_deployment(&self, name: &str, variant: ProvisioningVariant) -> Result<()>;

    /// Create the ConfigMap holding a workload's TLS material.
    ///
    /// # Errors
    ///
    /// Returns an error if the ConfigMap cannot be created.
    async fn create_config_map(&self, name: &str, data: &BTreeMap<String, String>) -> Result<()>;

    /// Delete a workload's Deployment. Absence is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if deletion fails (except 404).
    async fn delete_deployment(&self, name: &str) -> Result<()>;

    /// Delete a workload's ConfigMap. Absence is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if deletion fails (except 404).
    async fn delete_config_map(&self, name: &str) -> Result<()>;

    /// Whether a Deployment currently has at least one available replica.
    ///
    /// A missing Deployment reads as not available.
    ///
    /// # Errors
    ///
    /// Returns an error if the status cannot be fetched.
    async fn deployment_available(&self, name: &str) -> Result<bool>;

    /// List Deployments whose names start with the given prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if listing fails.
    async fn list_deployments_by_prefix(&self, prefix: &str) -> Result<Vec<DeploymentSummary>>;
}

/// Kubernetes-backed orchestrator for workload Deployments.
pub struct KubeOrchestrator {
    client: Client,
    config: OrchestratorConfig,
}

impl KubeOrchestrator {
    /// Create a new Kubernetes orchestrator.
    ///
    /// This will attempt to connect to the cluster using in-cluster config
    /// or kubeconfig file.
    ///
    /// # Errors
    ///
    /// Returns an error if the Kubernetes client cannot be created.
    pub async fn new(config: OrchestratorConfig) -> Result<Self> {
        let client = Client::try_default().await?;
        Ok(Self { client, config })
    }

    /// Create a new orchestrator with a pre-configured client.
    #[must_use]
    pub fn with_client(client: Client, config: OrchestratorConfig) -> Self {
        Self { client, config }
    }

    /// Get a reference to the orchestrator config.
    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    fn deployments_api(&self) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), &self.config.namespace)
    }

    fn config_maps_api(&self) -> Api<ConfigMap> {
        Api::namespaced(self.client.clone(), &self.config.namespace)
    }

    fn summarize(deployment: &Deployment) -> DeploymentSummary {
        let name = deployment
            .metadata
            .name
            .clone()
            .unwrap_or_else(|| "unknown".to_string());

        let status = deployment.status.as_ref();

        DeploymentSummary {
            name,
            available_replicas: status.and_then(|s| s.available_replicas).unwrap_or(0),
            unavailable_replicas: status.and_then(|s| s.unavailable_replicas).unwrap_or(0),
        }
    }
}

#[async_trait]
impl Orchestrator for KubeOrchestrator {
    async fn create_deployment(
        &self,
        name: &str,
        image: &str,
        env: &[String],
        cmd: &[String],
    ) -> Result<()> {
        let deployments = self.deployments_api();
        let deployment = build_deployment(name, image, env, cmd, &self.config);

        deployments
            .create(&PostParams::default(), &deployment)
            .await?;

        info!(
            name,
            image,
            namespace = %self.config.namespace,
            "Created workload deployment"
        );

        Ok(())
    }

    async fn update_deployment(&self, name: &str, variant: ProvisioningVariant) -> Result<()> {
        let deployments = self.deployments_api();

        // Read-modify-write with a bounded retry on optimistic-concurrency
        // conflicts. Each retry re-fetches the object at its current
        // resourceVersion instead of clobbering concurrent edits.
        for attempt in 1..=UPDATE_ATTEMPTS {
            let mut deployment = deployments.get(name).await?;
            apply_provisioning(&mut deployment, name, variant);

            match deployments
                .replace(name, &PostParams::default(), &deployment)
                .await
            {
                Ok(_) => {
                    info!(name, ?variant, attempt, "Provisioned workload deployment");
                    return Ok(());
                }
                Err(e) if is_conflict(&e) && attempt < UPDATE_ATTEMPTS => {
                    warn!(name, attempt, "Deployment update conflict, retrying");
                }
                Err(e) if is_conflict(&e) => {
                    return Err(OrchestratorError::UpdateConflict(name.to_string()));
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(OrchestratorError::UpdateConflict(name.to_string()))
    }

    async fn create_config_map(&self, name: &str, data: &BTreeMap<String, String>) -> Result<()> {
        let config_maps = self.config_maps_api();
        let config_map = build_config_map(name, data);

        config_maps
            .create(&PostParams::default(), &config_map)
            .await?;

        info!(
            name = %config_map_name(name),
            entries = data.len(),
            "Created workload config map"
        );

        Ok(())
    }

    async fn delete_deployment(&self, name: &str) -> Result<()> {
        let deployments = self.deployments_api();

        match deployments.delete(name, &DeleteParams::default()).await {
            Ok(_) => {
                info!(name, "Deleted workload deployment");
                Ok(())
            }
            Err(e) if is_not_found(&e) => {
                warn!(name, "Deployment not found, already deleted");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_config_map(&self, name: &str) -> Result<()> {
        let config_maps = self.config_maps_api();
        let full_name = config_map_name(name);

        match config_maps.delete(&full_name, &DeleteParams::default()).await {
            Ok(_) => {
                info!(name = %full_name, "Deleted workload config map");
                Ok(())
            }
            Err(e) if is_not_found(&e) => {
                warn!(name = %full_name, "Config map not found, already deleted");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn deployment_available(&self, name: &str) -> Result<bool> {
        let deployments = self.deployments_api();

        match deployments.get_opt(name).await? {
            Some(deployment) => {
                let available = deployment
                    .status
                    .as_ref()
                    .and_then(|s| s.available_replicas)
                    .unwrap_or(0);
                Ok(available > 0)
            }
            None => Ok(false),
        }
    }

    async fn list_deployments_by_prefix(&self, prefix: &str) -> Result<Vec<DeploymentSummary>> {
        let deployments = self.deployments_api();
        let list = deployments.list(&ListParams::default()).await?;

        Ok(list
            .items
            .iter()
            .map(Self::summarize)
            .filter(|summary| summary.name.starts_with(prefix))
            .collect())
    }
}
