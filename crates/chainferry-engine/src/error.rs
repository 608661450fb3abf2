//! Error types for the engine backend.

use thiserror::Error;

/// Errors that can occur while talking to the container engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Engine API error (connection, protocol, or server-side failure).
    #[error("engine API error: {0}")]
    Api(#[from] bollard::errors::Error),

    /// Invalid engine configuration.
    #[error("engine configuration error: {0}")]
    Config(String),

    /// Re-encoding an engine response failed.
    #[error("engine response encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    /// Writing an exported image to disk failed.
    #[error("image export failed: {0}")]
    Export(#[from] std::io::Error),
}

impl EngineError {
    /// True if the engine reported the referenced object as missing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Api(bollard::errors::Error::DockerResponseServerError {
                status_code: 404,
                ..
            })
        )
    }
}

/// A specialized Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
