//! Gateway configuration.

/// Configuration for the HTTP gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Listen address (e.g. `0.0.0.0:8080`).
    pub listen_addr: String,
    /// Maximum request body size in bytes. Build contexts and credential
    /// archives arrive as whole bodies, so this sits well above typical
    /// API defaults.
    pub max_body_bytes: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            max_body_bytes: 512 * 1024 * 1024,
        }
    }
}

impl GatewayConfig {
    /// Load configuration from environment variables.
    ///
    /// Supported variables: `LISTEN_ADDR`, `MAX_BODY_BYTES`.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("LISTEN_ADDR") {
            config.listen_addr = val;
        }
        if let Ok(val) = std::env::var("MAX_BODY_BYTES") {
            if let Ok(bytes) = val.parse() {
                config.max_body_bytes = bytes;
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.max_body_bytes, 512 * 1024 * 1024);
    }
}
