//! Cluster orchestrator backend for chainferry.
//!
//! This crate provides the [`Orchestrator`] capability trait over the
//! cluster, the [`KubeOrchestrator`] implementation on the Kubernetes API,
//! the pure object builders for workload Deployments and their TLS
//! ConfigMaps, and the background [`Sweeper`] that reclaims deployments
//! stuck in an unavailable state.
//!
//! Workloads have exactly one shape here: a single-container pod fronted by
//! a Deployment, named deterministically from the caller's workload
//! reference, with TLS material projected in from a companion ConfigMap.
//!
//! # Testing
//!
//! Enable the `test-utils` feature for an in-memory [`MockOrchestrator`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod deployment;
pub mod error;
pub mod kube;
pub mod sweeper;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use error::{OrchestratorError, Result};
pub use self::kube::{KubeOrchestrator, Orchestrator};
pub use sweeper::{Sweeper, SweeperConfig};
pub use types::{DeploymentSummary, OrchestratorConfig, ProvisioningVariant};

#[cfg(any(test, feature = "test-utils"))]
pub use mock::MockOrchestrator;
