//! Types for engine-backed container creation.

use serde::{Deserialize, Serialize};

/// Specification for an engine-managed container.
///
/// Only used on the engine path; managed workloads are described by their
/// image reference plus env/cmd and provisioned as deployments instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// Image reference to run.
    pub image: String,
    /// Environment variables as `KEY=VALUE` strings.
    pub env: Vec<String>,
    /// Command to run.
    pub cmd: Vec<String>,
    /// Optional entrypoint override.
    pub entrypoint: Option<String>,
    /// Attach the container's stdout to the create response.
    pub attach_stdout: bool,
    /// Attach the container's stderr to the create response.
    pub attach_stderr: bool,
    /// Host network mode (e.g. `bridge`, `host`).
    pub network_mode: Option<String>,
    /// Memory ceiling in bytes.
    pub memory_bytes: Option<i64>,
}

/// Result of creating an engine-managed container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedContainer {
    /// Engine-assigned container id.
    pub id: String,
    /// Warnings emitted by the engine during creation.
    pub warnings: Vec<String>,
}
