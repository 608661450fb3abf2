//! In-memory orchestrator for testing without a cluster.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::kube::Orchestrator;
use crate::types::{DeploymentSummary, ProvisioningVariant};
use crate::{OrchestratorError, Result};

#[derive(Clone)]
struct MockDeployment {
    image: String,
    env: Vec<String>,
    cmd: Vec<String>,
    variant: Option<ProvisioningVariant>,
    available_replicas: i32,
    unavailable_replicas: i32,
}

#[derive(Default)]
struct MockState {
    deployments: HashMap<String, MockDeployment>,
    config_maps: HashMap<String, BTreeMap<String, String>>,
    /// Deployments become available after this many availability queries.
    ready_after: HashMap<String, usize>,
    availability_queries: HashMap<String, usize>,
    fail_config_map_deletes: bool,
    fail_deployment_deletes: bool,
}

/// A mock orchestrator that stores deployments in memory.
#[derive(Default)]
pub struct MockOrchestrator {
    state: Mutex<MockState>,
}

impl MockOrchestrator {
    /// Create a new mock orchestrator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a deployment as having available replicas.
    pub fn set_available(&self, name: &str, replicas: i32) {
        if let Some(d) = self.lock().deployments.get_mut(name) {
            d.available_replicas = replicas;
            d.unavailable_replicas = 0;
        }
    }

    /// Mark a deployment as having unavailable replicas.
    pub fn set_unavailable(&self, name: &str, replicas: i32) {
        if let Some(d) = self.lock().deployments.get_mut(name) {
            d.available_replicas = 0;
            d.unavailable_replicas = replicas;
        }
    }

    /// Make `deployment_available` report false for the first `queries`
    /// calls against this deployment, then true.
    pub fn set_ready_after(&self, name: &str, queries: usize) {
        self.lock().ready_after.insert(name.to_string(), queries);
    }

    /// How many times availability was queried for a deployment.
    #[must_use]
    pub fn availability_queries(&self, name: &str) -> usize {
        self.lock()
            .availability_queries
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    /// Inject failures into config map deletion.
    pub fn set_fail_config_map_deletes(&self, fail: bool) {
        self.lock().fail_config_map_deletes = fail;
    }

    /// Inject failures into deployment deletion.
    pub fn set_fail_deployment_deletes(&self, fail: bool) {
        self.lock().fail_deployment_deletes = fail;
    }

    /// Whether a deployment with this name exists.
    #[must_use]
    pub fn has_deployment(&self, name: &str) -> bool {
        self.lock().deployments.contains_key(name)
    }

    /// Whether a config map for this workload exists.
    #[must_use]
    pub fn has_config_map(&self, name: &str) -> bool {
        self.lock().config_maps.contains_key(name)
    }

    /// The image a deployment was created with.
    #[must_use]
    pub fn deployment_image(&self, name: &str) -> Option<String> {
        self.lock().deployments.get(name).map(|d| d.image.clone())
    }

    /// The env a deployment was created with.
    #[must_use]
    pub fn deployment_env(&self, name: &str) -> Option<Vec<String>> {
        self.lock().deployments.get(name).map(|d| d.env.clone())
    }

    /// The cmd a deployment was created with.
    #[must_use]
    pub fn deployment_cmd(&self, name: &str) -> Option<Vec<String>> {
        self.lock().deployments.get(name).map(|d| d.cmd.clone())
    }

    /// The provisioning variant recorded by `update_deployment`, if any.
    #[must_use]
    pub fn recorded_variant(&self, name: &str) -> Option<ProvisioningVariant> {
        self.lock().deployments.get(name).and_then(|d| d.variant)
    }

    /// The stored config map data for a workload.
    #[must_use]
    pub fn config_map_data(&self, name: &str) -> Option<BTreeMap<String, String>> {
        self.lock().config_maps.get(name).cloned()
    }

    /// Number of deployments currently stored.
    #[must_use]
    pub fn deployment_count(&self) -> usize {
        self.lock().deployments.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl Orchestrator for MockOrchestrator {
    async fn create_deployment(
        &self,
        name: &str,
        image: &str,
        env: &[String],
        cmd: &[String],
    ) -> Result<()> {
        let mut state = self.lock();

        if state.deployments.contains_key(name) {
            return Err(OrchestratorError::Config(format!(
                "deployment {name} already exists"
            )));
        }

        state.deployments.insert(
            name.to_string(),
            MockDeployment {
                image: image.to_string(),
                env: env.to_vec(),
                cmd: cmd.to_vec(),
                variant: None,
                available_replicas: 0,
                unavailable_replicas: 0,
            },
        );

        Ok(())
    }

    async fn update_deployment(&self, name: &str, variant: ProvisioningVariant) -> Result<()> {
        let mut state = self.lock();

        match state.deployments.get_mut(name) {
            Some(deployment) => {
                deployment.variant = Some(variant);
                Ok(())
            }
            None => Err(OrchestratorError::Config(format!(
                "deployment {name} not found"
            ))),
        }
    }

    async fn create_config_map(&self, name: &str, data: &BTreeMap<String, String>) -> Result<()> {
        self.lock()
            .config_maps
            .insert(name.to_string(), data.clone());
        Ok(())
    }

    async fn delete_deployment(&self, name: &str) -> Result<()> {
        let mut state = self.lock();

        if state.fail_deployment_deletes {
            return Err(OrchestratorError::Config(
                "injected deployment delete failure".to_string(),
            ));
        }

        // Absence is not an error, matching the real backend.
        state.deployments.remove(name);
        Ok(())
    }

    async fn delete_config_map(&self, name: &str) -> Result<()> {
        let mut state = self.lock();

        if state.fail_config_map_deletes {
            return Err(OrchestratorError::Config(
                "injected config map delete failure".to_string(),
            ));
        }

        state.config_maps.remove(name);
        Ok(())
    }

    async fn deployment_available(&self, name: &str) -> Result<bool> {
        let mut state = self.lock();

        let queries = state
            .availability_queries
            .entry(name.to_string())
            .or_insert(0);
        *queries += 1;
        let queries = *queries;

        if let Some(threshold) = state.ready_after.get(name) {
            return Ok(queries > *threshold);
        }

        Ok(state
            .deployments
            .get(name)
            .is_some_and(|d| d.available_replicas > 0))
    }

    async fn list_deployments_by_prefix(&self, prefix: &str) -> Result<Vec<DeploymentSummary>> {
        let state = self.lock();

        let mut summaries: Vec<DeploymentSummary> = state
            .deployments
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(name, d)| DeploymentSummary {
                name: name.clone(),
                available_replicas: d.available_replicas,
                unavailable_replicas: d.unavailable_replicas,
            })
            .collect();

        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_creation_and_provisioning() {
        let orchestrator = MockOrchestrator::new();
        orchestrator
            .create_deployment("w", "img:1", &["A=1".to_string()], &["run".to_string()])
            .await
            .unwrap();

        assert_eq!(orchestrator.deployment_image("w").as_deref(), Some("img:1"));
        assert!(orchestrator.recorded_variant("w").is_none());

        orchestrator
            .update_deployment("w", ProvisioningVariant::Extended)
            .await
            .unwrap();
        assert_eq!(
            orchestrator.recorded_variant("w"),
            Some(ProvisioningVariant::Extended)
        );
    }

    #[tokio::test]
    async fn ready_after_controls_availability() {
        let orchestrator = MockOrchestrator::new();
        orchestrator
            .create_deployment("w", "img", &[], &[])
            .await
            .unwrap();
        orchestrator.set_ready_after("w", 2);

        assert!(!orchestrator.deployment_available("w").await.unwrap());
        assert!(!orchestrator.deployment_available("w").await.unwrap());
        assert!(orchestrator.deployment_available("w").await.unwrap());
        assert_eq!(orchestrator.availability_queries("w"), 3);
    }

    #[tokio::test]
    async fn list_filters_by_prefix() {
        let orchestrator = MockOrchestrator::new();
        orchestrator
            .create_deployment("chaincode-a", "img", &[], &[])
            .await
            .unwrap();
        orchestrator
            .create_deployment("other-b", "img", &[], &[])
            .await
            .unwrap();

        let listed = orchestrator
            .list_deployments_by_prefix("chaincode-")
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "chaincode-a");
    }
}
