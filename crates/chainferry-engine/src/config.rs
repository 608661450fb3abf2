//! Engine and registry configuration.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Configuration for the Docker engine connection and the private registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Engine endpoint, e.g. `unix:///var/run/docker.sock` or
    /// `tcp://127.0.0.1:2375`.
    pub endpoint: String,
    /// Private registry the workload images live in.
    pub registry: RegistryConfig,
}

/// Private registry coordinates and credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Registry auth username.
    pub username: String,
    /// Registry auth password.
    pub password: String,
    /// Registry auth email. Blanked when encoding credentials.
    pub email: String,
    /// Registry host, used as the first path segment of qualified refs.
    pub server_address: String,
    /// Registry project (second path segment of qualified refs).
    pub project: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            endpoint: "unix:///var/run/docker.sock".to_string(),
            registry: RegistryConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// Supported variables: `DOCKER_ENDPOINT`, `REGISTRY_SERVER_ADDRESS`,
    /// `REGISTRY_PROJECT`, `REGISTRY_USERNAME`, `REGISTRY_PASSWORD`,
    /// `REGISTRY_EMAIL`.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("DOCKER_ENDPOINT") {
            config.endpoint = val;
        }
        if let Ok(val) = std::env::var("REGISTRY_SERVER_ADDRESS") {
            config.registry.server_address = val;
        }
        if let Ok(val) = std::env::var("REGISTRY_PROJECT") {
            config.registry.project = val;
        }
        if let Ok(val) = std::env::var("REGISTRY_USERNAME") {
            config.registry.username = val;
        }
        if let Ok(val) = std::env::var("REGISTRY_PASSWORD") {
            config.registry.password = val;
        }
        if let Ok(val) = std::env::var("REGISTRY_EMAIL") {
            config.registry.email = val;
        }

        config
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint or the registry project is empty.
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.is_empty() {
            return Err(EngineError::Config("engine endpoint is empty".to_string()));
        }
        if self.registry.project.is_empty() {
            return Err(EngineError::Config("registry project is empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let mut config = EngineConfig::default();
        assert!(config.validate().is_err()); // empty project

        config.registry.project = "chainferry".to_string();
        assert!(config.validate().is_ok());

        config.endpoint = String::new();
        assert!(config.validate().is_err());
    }
}
