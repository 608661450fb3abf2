//! Background reclamation of stuck workload deployments.
//!
//! A workload that lost its image or credentials sits at
//! `unavailable_replicas > 0` forever; the orchestrator never gives up on
//! it. The sweeper periodically deletes such deployments (and their config
//! maps) so the caller can re-create them cleanly.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, sleep};
use tracing::{error, info, warn};

use chainferry_core::WORKLOAD_NAME_PREFIX;

use crate::kube::Orchestrator;
use crate::{OrchestratorError, Result};

/// Configuration for the deployment sweeper.
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Whether the sweeper runs at all.
    pub enabled: bool,
    /// Seconds between sweep passes.
    pub interval_secs: u64,
    /// Seconds to pause between successive deletions within one pass.
    pub pace_secs: u64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 60,
            pace_secs: 1,
        }
    }
}

impl SweeperConfig {
    /// Load configuration from environment variables.
    ///
    /// Supported variables: `SWEEPER_ENABLED`, `SWEEPER_INTERVAL_SECS`.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("SWEEPER_ENABLED") {
            config.enabled = val != "false" && val != "0";
        }
        if let Ok(val) = std::env::var("SWEEPER_INTERVAL_SECS") {
            if let Ok(secs) = val.parse() {
                config.interval_secs = secs;
            }
        }

        config
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the sweep interval is zero.
    pub fn validate(&self) -> Result<()> {
        if self.enabled && self.interval_secs == 0 {
            return Err(OrchestratorError::Config(
                "sweeper interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Periodic reclaimer of unavailable workload deployments.
pub struct Sweeper {
    orchestrator: Arc<dyn Orchestrator>,
    config: SweeperConfig,
    stop: watch::Receiver<bool>,
}

impl Sweeper {
    /// Create a new sweeper over the given orchestrator.
    ///
    /// The sweeper exits when `true` is sent on the stop channel.
    #[must_use]
    pub fn new(
        orchestrator: Arc<dyn Orchestrator>,
        config: SweeperConfig,
        stop: watch::Receiver<bool>,
    ) -> Self {
        Self {
            orchestrator,
            config,
            stop,
        }
    }

    /// Run sweep passes until the stop channel fires.
    ///
    /// Should be spawned as a background task. Returns immediately when the
    /// sweeper is disabled by configuration.
    pub async fn run(mut self) {
        if !self.config.enabled {
            info!("Sweeper disabled, not running");
            return;
        }

        let mut ticker = interval(Duration::from_secs(self.config.interval_secs));
        // The first tick completes immediately; consume it so the first
        // sweep happens one full interval after startup.
        ticker.tick().await;

        info!(
            interval_secs = self.config.interval_secs,
            "Starting deployment sweeper"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep().await {
                        error!(error = %e, "Sweep pass failed");
                    }
                }
                _ = self.stop.changed() => {
                    if *self.stop.borrow() {
                        info!("Sweeper stopping");
                        return;
                    }
                }
            }
        }
    }

    /// One sweep pass: delete every managed deployment that reports
    /// unavailable replicas, along with its config map.
    async fn sweep(&self) -> Result<()> {
        let summaries = self
            .orchestrator
            .list_deployments_by_prefix(WORKLOAD_NAME_PREFIX)
            .await?;

        let mut reclaimed = 0usize;

        for summary in &summaries {
            if summary.unavailable_replicas == 0 {
                continue;
            }

            info!(
                name = %summary.name,
                unavailable = summary.unavailable_replicas,
                "Reclaiming unavailable deployment"
            );

            self.orchestrator.delete_deployment(&summary.name).await?;

            // Best effort: the config map may never have been created for a
            // workload that stalled before provisioning.
            if let Err(e) = self.orchestrator.delete_config_map(&summary.name).await {
                warn!(name = %summary.name, error = %e, "Failed to delete config map");
            }

            reclaimed += 1;

            if self.config.pace_secs > 0 {
                sleep(Duration::from_secs(self.config.pace_secs)).await;
            }
        }

        if reclaimed > 0 {
            info!(reclaimed, scanned = summaries.len(), "Sweep pass complete");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockOrchestrator;
    use crate::types::ProvisioningVariant;

    fn sweeper_with(
        orchestrator: Arc<MockOrchestrator>,
        config: SweeperConfig,
    ) -> (Sweeper, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        (Sweeper::new(orchestrator, config, rx), tx)
    }

    #[test]
    fn config_rejects_zero_interval() {
        let config = SweeperConfig {
            enabled: true,
            interval_secs: 0,
            pace_secs: 0,
        };
        assert!(config.validate().is_err());

        let disabled = SweeperConfig {
            enabled: false,
            interval_secs: 0,
            pace_secs: 0,
        };
        assert!(disabled.validate().is_ok());
    }

    #[tokio::test]
    async fn sweep_deletes_only_unavailable_deployments() {
        let orchestrator = Arc::new(MockOrchestrator::new());
        orchestrator
            .create_deployment("chaincode-healthy", "img", &[], &[])
            .await
            .unwrap();
        orchestrator
            .create_deployment("chaincode-stuck", "img", &[], &[])
            .await
            .unwrap();
        orchestrator
            .create_deployment("unmanaged-stuck", "img", &[], &[])
            .await
            .unwrap();

        orchestrator.set_available("chaincode-healthy", 1);
        orchestrator.set_unavailable("chaincode-stuck", 1);
        orchestrator.set_unavailable("unmanaged-stuck", 1);

        let config = SweeperConfig {
            enabled: true,
            interval_secs: 60,
            pace_secs: 0,
        };
        let (sweeper, _tx) = sweeper_with(Arc::clone(&orchestrator), config);

        sweeper.sweep().await.unwrap();

        assert!(orchestrator.has_deployment("chaincode-healthy"));
        assert!(!orchestrator.has_deployment("chaincode-stuck"));
        // Deployments outside the managed prefix are never touched.
        assert!(orchestrator.has_deployment("unmanaged-stuck"));
    }

    #[tokio::test]
    async fn sweep_removes_config_map_with_deployment() {
        let orchestrator = Arc::new(MockOrchestrator::new());
        orchestrator
            .create_deployment("chaincode-stuck", "img", &[], &[])
            .await
            .unwrap();
        orchestrator
            .create_config_map("chaincode-stuck", &std::collections::BTreeMap::new())
            .await
            .unwrap();
        orchestrator
            .update_deployment("chaincode-stuck", ProvisioningVariant::Baseline)
            .await
            .unwrap();
        orchestrator.set_unavailable("chaincode-stuck", 1);

        let config = SweeperConfig {
            enabled: true,
            interval_secs: 60,
            pace_secs: 0,
        };
        let (sweeper, _tx) = sweeper_with(Arc::clone(&orchestrator), config);

        sweeper.sweep().await.unwrap();

        assert!(!orchestrator.has_deployment("chaincode-stuck"));
        assert!(!orchestrator.has_config_map("chaincode-stuck"));
    }

    #[tokio::test]
    async fn sweep_survives_config_map_delete_failure() {
        let orchestrator = Arc::new(MockOrchestrator::new());
        orchestrator
            .create_deployment("chaincode-stuck", "img", &[], &[])
            .await
            .unwrap();
        orchestrator.set_unavailable("chaincode-stuck", 1);
        orchestrator.set_fail_config_map_deletes(true);

        let config = SweeperConfig {
            enabled: true,
            interval_secs: 60,
            pace_secs: 0,
        };
        let (sweeper, _tx) = sweeper_with(Arc::clone(&orchestrator), config);

        sweeper.sweep().await.unwrap();
        assert!(!orchestrator.has_deployment("chaincode-stuck"));
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_promptly_on_signal() {
        let orchestrator = Arc::new(MockOrchestrator::new());
        let config = SweeperConfig {
            enabled: true,
            interval_secs: 3600,
            pace_secs: 0,
        };
        let (sweeper, tx) = sweeper_with(orchestrator, config);

        let handle = tokio::spawn(sweeper.run());
        tokio::task::yield_now().await;

        tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn run_sweeps_on_each_interval() {
        let orchestrator = Arc::new(MockOrchestrator::new());
        orchestrator
            .create_deployment("chaincode-stuck", "img", &[], &[])
            .await
            .unwrap();
        orchestrator.set_unavailable("chaincode-stuck", 1);

        let config = SweeperConfig {
            enabled: true,
            interval_secs: 60,
            pace_secs: 0,
        };
        let (sweeper, tx) = sweeper_with(Arc::clone(&orchestrator), config);

        let handle = tokio::spawn(sweeper.run());
        tokio::task::yield_now().await;

        tokio::time::advance(Duration::from_secs(61)).await;
        tokio::task::yield_now().await;

        assert!(!orchestrator.has_deployment("chaincode-stuck"));

        tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn run_exits_immediately_when_disabled() {
        let orchestrator = Arc::new(MockOrchestrator::new());
        let config = SweeperConfig {
            enabled: false,
            interval_secs: 60,
            pace_secs: 0,
        };
        let (sweeper, _tx) = sweeper_with(orchestrator, config);

        // Completes without the stop channel ever firing.
        sweeper.run().await;
    }
}
