//! Error types for the dispatch core.

use thiserror::Error;

/// Errors surfaced by the lifecycle router and the image pipeline.
#[derive(Error, Debug)]
pub enum ControlError {
    /// The image could not be pulled from or found in the registry.
    #[error("image not found: {0}")]
    ImageNotFound(String),

    /// A required upload or build payload was absent.
    #[error("request carried no content")]
    EmptyContent,

    /// A workload never became available within the polling bound.
    #[error("workload {0} did not become ready in time")]
    ReadinessTimeout(String),

    /// The uploaded archive could not be decoded as gzip-compressed tar.
    #[error("corrupt archive: {0}")]
    ArchiveCorrupt(String),

    /// A build request named no image tag to apply.
    #[error("build request carried no image tag")]
    MissingImageTag,

    /// Container engine failure.
    #[error(transparent)]
    Engine(#[from] chainferry_engine::EngineError),

    /// Cluster orchestrator failure.
    #[error(transparent)]
    Orchestrator(#[from] chainferry_orchestrator::OrchestratorError),
}

impl ControlError {
    /// True if this error should read as "not found" to callers.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::ImageNotFound(_) => true,
            Self::Engine(e) => e.is_not_found(),
            _ => false,
        }
    }
}

/// A specialized Result type for dispatch-core operations.
pub type Result<T> = std::result::Result<T, ControlError>;
