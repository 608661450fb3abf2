//! Lifecycle verb dispatch.
//!
//! [`ContainerRouter`] classifies each inbound identifier and routes the
//! verb to the container engine (engine handles) or the cluster
//! orchestrator (workload references). Workload flows are multi-step:
//! Create pulls and registers the image before creating the Deployment,
//! Upload turns an archive into a ConfigMap plus a Deployment mutation,
//! and Start blocks on a bounded readiness poll.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info, warn};

use chainferry_core::{classify, derive_workload_name, IdentifierKind};
use chainferry_engine::{ContainerSpec, CreatedContainer, Engine};
use chainferry_orchestrator::{Orchestrator, ProvisioningVariant};

use crate::archive::extract_material;
use crate::{ControlError, Result};

/// Configuration for the readiness polling loop.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Pause between readiness queries.
    pub poll_interval: Duration,
    /// Maximum readiness queries before giving up.
    pub poll_attempts: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            poll_attempts: 100,
        }
    }
}

/// Outcome of a Create call: either an engine-assigned container or a
/// workload registered under its derived name.
#[derive(Debug, Clone)]
pub struct Created {
    /// The identifier the caller uses for subsequent verbs.
    pub id: String,
    /// Engine warnings, when the engine path was taken.
    pub warnings: Vec<String>,
}

/// Routes lifecycle verbs between the engine and the orchestrator.
pub struct ContainerRouter {
    engine: Arc<dyn Engine>,
    orchestrator: Arc<dyn Orchestrator>,
    config: RouterConfig,
}

impl ContainerRouter {
    /// Create a router over the given backends.
    #[must_use]
    pub fn new(
        engine: Arc<dyn Engine>,
        orchestrator: Arc<dyn Orchestrator>,
        config: RouterConfig,
    ) -> Self {
        Self {
            engine,
            orchestrator,
            config,
        }
    }

    /// Create a container.
    ///
    /// An empty `name` delegates straight to the engine (the image-build
    /// flow creates anonymous utility containers this way). A non-empty
    /// name provisions a managed workload: the short image reference is
    /// qualified against the configured registry, pulled with credentials,
    /// and a Deployment is created under the derived workload name, which
    /// is returned as the identifier for every subsequent verb.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::ImageNotFound`] if the registry pull fails,
    /// and backend errors otherwise.
    pub async fn create(&self, name: &str, spec: &ContainerSpec) -> Result<Created> {
        if name.is_empty() {
            let CreatedContainer { id, warnings } = self.engine.create_container(spec).await?;
            debug!(id = %id, "created engine container");
            return Ok(Created { id, warnings });
        }

        let qualified = format!(
            "{}/{}/{}",
            self.engine.registry_address(),
            self.engine.registry_project(),
            spec.image
        );

        if let Err(e) = self.engine.pull_image(&qualified, true).await {
            warn!(image = %qualified, error = %e, "workload image pull failed");
            return Err(ControlError::ImageNotFound(qualified));
        }

        let workload = derive_workload_name(name);
        self.orchestrator
            .create_deployment(&workload, &qualified, &spec.env, &spec.cmd)
            .await?;

        info!(name, workload = %workload, image = %qualified, "created workload");

        Ok(Created {
            id: workload,
            warnings: Vec::new(),
        })
    }

    /// Upload content into a container.
    ///
    /// Engine handles receive the bytes directly at `path`. Workload
    /// references receive TLS material: the body is decoded as a
    /// gzip-compressed tar archive, projected into a ConfigMap, and the
    /// Deployment is mutated to mount it and scale to one replica.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::EmptyContent`] for a workload upload with no
    /// body, [`ControlError::ArchiveCorrupt`] for an undecodable workload
    /// archive, and backend errors otherwise.
    pub async fn upload(&self, id: &str, path: &str, content: Option<Bytes>) -> Result<()> {
        if classify(id) == IdentifierKind::EngineHandle {
            // The engine accepts an empty archive; only workload
            // provisioning requires a body.
            self.engine
                .copy_into(id, path, content.unwrap_or_default())
                .await?;
            return Ok(());
        }

        let content = content.ok_or(ControlError::EmptyContent)?;
        let workload = derive_workload_name(id);
        let material = extract_material(&content)?;
        let variant = ProvisioningVariant::from_material_count(material.len());

        self.orchestrator
            .create_config_map(&workload, &material)
            .await?;
        self.orchestrator
            .update_deployment(&workload, variant)
            .await?;

        info!(
            workload = %workload,
            entries = material.len(),
            ?variant,
            "provisioned workload credentials"
        );

        Ok(())
    }

    /// Fetch content out of a container at `path`.
    ///
    /// Only meaningful for engine handles; the engine path is taken for
    /// every identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine copy fails.
    pub async fn fetch(&self, id: &str, path: &str) -> Result<Bytes> {
        Ok(self.engine.copy_from(id, path).await?)
    }

    /// Start a container.
    ///
    /// Engine handles start synchronously. Workload references block on
    /// the readiness poll: the orchestrator is queried until the
    /// Deployment reports an available replica or the attempt bound is
    /// exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::ReadinessTimeout`] if the workload never
    /// becomes available, and backend errors otherwise.
    pub async fn start(&self, id: &str) -> Result<()> {
        if classify(id) == IdentifierKind::EngineHandle {
            self.engine.start_container(id).await?;
            return Ok(());
        }

        let workload = derive_workload_name(id);

        for attempt in 1..=self.config.poll_attempts {
            if self.orchestrator.deployment_available(&workload).await? {
                info!(workload = %workload, attempt, "workload ready");
                return Ok(());
            }

            if attempt < self.config.poll_attempts {
                tokio::time::sleep(self.config.poll_interval).await;
            }
        }

        warn!(
            workload = %workload,
            attempts = self.config.poll_attempts,
            "workload readiness poll exhausted"
        );

        Err(ControlError::ReadinessTimeout(workload))
    }

    /// Stop a container, waiting up to `timeout_secs` before killing.
    ///
    /// A no-op success for workload references; a Deployment is stopped by
    /// removing it, not by signalling.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine stop fails.
    pub async fn stop(&self, id: &str, timeout_secs: Option<i64>) -> Result<()> {
        if classify(id) == IdentifierKind::EngineHandle {
            self.engine.stop_container(id, timeout_secs).await?;
        }
        Ok(())
    }

    /// Send a signal to a container. No-op success for workload references.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine kill fails.
    pub async fn kill(&self, id: &str, signal: &str) -> Result<()> {
        if classify(id) == IdentifierKind::EngineHandle {
            self.engine.kill_container(id, signal).await?;
        }
        Ok(())
    }

    /// Remove a container.
    ///
    /// The workload path deletes both the Deployment and its ConfigMap
    /// best-effort: failures are logged and swallowed so removal always
    /// reads as idempotent success to the caller.
    ///
    /// # Errors
    ///
    /// Returns an error only if the engine-handle removal fails.
    pub async fn remove(&self, id: &str) -> Result<()> {
        if classify(id) == IdentifierKind::EngineHandle {
            self.engine.remove_container(id).await?;
            return Ok(());
        }

        let workload = derive_workload_name(id);

        if let Err(e) = self.orchestrator.delete_deployment(&workload).await {
            warn!(workload = %workload, error = %e, "failed to delete deployment");
        }
        if let Err(e) = self.orchestrator.delete_config_map(&workload).await {
            warn!(workload = %workload, error = %e, "failed to delete config map");
        }

        Ok(())
    }

    /// Block until an engine container exits. Immediate success for
    /// workload references, which have no exit semantics.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine wait fails.
    pub async fn wait(&self, id: &str) -> Result<()> {
        if classify(id) == IdentifierKind::EngineHandle {
            self.engine.wait_container(id).await?;
        }
        Ok(())
    }
}
