//! Error types for the orchestrator crate.

use thiserror::Error;

/// Errors that can occur while talking to the cluster orchestrator.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// Kubernetes API error.
    #[error("Kubernetes API error: {0}")]
    KubeApi(#[from] kube::Error),

    /// Update kept colliding with concurrent edits.
    #[error("conflict updating deployment {0}, retries exhausted")]
    UpdateConflict(String),

    /// Configuration error.
    #[error("orchestrator configuration error: {0}")]
    Config(String),
}

/// A specialized Result type for orchestrator operations.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// True if the error is an optimistic-concurrency conflict from the API.
#[must_use]
pub fn is_conflict(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(response) if response.code == 409)
}

/// True if the error is a not-found response from the API.
#[must_use]
pub fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(response) if response.code == 404)
}
