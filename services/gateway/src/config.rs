//! Gateway configuration

use poke_relay::SessionConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

use crate::error::{GatewayError, Result};

/// Environment name that restricts CORS to the configured client origin
pub const PRODUCTION_ENVIRONMENT: &str = "production";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP bind address
    pub bind_address: String,

    /// HTTP port, 0 picks a free port
    pub port: u16,

    /// Origin allowed by CORS in production
    pub client_origin: String,

    /// `production` or anything else
    pub environment: String,

    /// Largest accepted request body
    pub max_body_bytes: u64,

    pub cors_methods: Vec<String>,
    pub cors_headers: Vec<String>,
    pub cors_allow_credentials: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 5050,
            client_origin: "http://localhost:5173".to_string(),
            environment: "development".to_string(),
            max_body_bytes: 1024 * 1024,
            cors_methods: vec!["GET".into(), "POST".into(), "OPTIONS".into()],
            cors_headers: vec!["Content-Type".into(), "Authorization".into()],
            cors_allow_credentials: true,
        }
    }
}

impl ServerConfig {
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case(PRODUCTION_ENVIRONMENT)
    }

    /// `client_origin` as a serialized `scheme://host[:port]` origin
    pub fn allowed_origin(&self) -> Result<String> {
        let invalid = |reason: &str| {
            GatewayError::configuration(format!(
                "client_origin '{}' {}",
                self.client_origin, reason
            ))
        };

        let url = Url::parse(&self.client_origin).map_err(|e| invalid(&e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(invalid("must be an http or https origin"));
        }
        if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
            return Err(invalid("must not carry a path, query or fragment"));
        }
        Ok(url.origin().ascii_serialization())
    }
}

/// Defaults applied to incoming publish requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayDefaults {
    /// Used when a request omits `isQueue`
    pub default_is_queue: bool,
}

impl Default for RelayDefaults {
    fn default() -> Self {
        Self {
            default_is_queue: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub server: ServerConfig,
    pub relay: RelayDefaults,
    pub session: SessionConfig,
}

impl GatewayConfig {
    /// Load from a TOML file, or JSON when the extension is `.json`
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path).await?;
        let config: Self = if path.extension().and_then(|s| s.to_str()) == Some("json") {
            serde_json::from_str(&contents)?
        } else {
            toml::from_str(&contents)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.max_body_bytes == 0 {
            return Err(GatewayError::configuration("max_body_bytes must be positive"));
        }
        self.session
            .validate()
            .map_err(|e| GatewayError::configuration(e.to_string()))?;
        if self.server.is_production() {
            self.server.allowed_origin()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.server.port, 5050);
        assert_eq!(config.server.client_origin, "http://localhost:5173");
        assert!(!config.server.is_production());
        assert!(config.relay.default_is_queue);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_production_is_case_insensitive() {
        let server = ServerConfig {
            environment: "Production".to_string(),
            ..ServerConfig::default()
        };
        assert!(server.is_production());
    }

    #[test]
    fn test_validate_rejects_zero_timeouts() {
        let mut config = GatewayConfig::default();
        config.session.connect_timeout_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(GatewayError::Configuration { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_wildcard_queue_prefix() {
        let mut config = GatewayConfig::default();
        config.session.queue_topic_prefix = "#P2P/QUE/".to_string();
        assert!(matches!(
            config.validate(),
            Err(GatewayError::Configuration { .. })
        ));
    }

    #[test]
    fn test_production_requires_a_usable_origin() {
        let mut config = GatewayConfig::default();
        config.server.environment = "production".to_string();

        for origin in ["", "localhost:5173", "poke.example", "ftp://poke.example", "https://poke.example/app"] {
            config.server.client_origin = origin.to_string();
            assert!(
                matches!(config.validate(), Err(GatewayError::Configuration { .. })),
                "accepted {:?}",
                origin
            );
        }

        config.server.client_origin = "https://poke.example".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_allowed_origin_is_normalized() {
        let server = ServerConfig {
            client_origin: "https://Poke.Example:443/".to_string(),
            ..ServerConfig::default()
        };
        assert_eq!(server.allowed_origin().unwrap(), "https://poke.example");

        let local = ServerConfig::default();
        assert_eq!(local.allowed_origin().unwrap(), "http://localhost:5173");
    }

    #[test]
    fn test_scheme_less_origin_is_tolerated_outside_production() {
        let mut config = GatewayConfig::default();
        config.server.client_origin = "localhost:5173".to_string();
        assert!(config.validate().is_ok());
    }
}
