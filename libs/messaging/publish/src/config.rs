use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::SessionError;
use crate::message::{DeliveryMode, DEFAULT_MAX_MESSAGE_SIZE};

/// Message property tagging every publish with the authenticated user
pub const DEFAULT_USER_ID_PROPERTY: &str = "JMSXUserID";

/// Topic prefix queue destinations are published under
pub const DEFAULT_QUEUE_TOPIC_PREFIX: &str = "P2P/QUE/";

/// Per-session tuning shared by the session client and transports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Upper bound on waiting for the broker's connect notice
    pub connect_timeout_ms: u64,

    /// Upper bound on waiting for a publish to be written or acknowledged
    pub send_timeout_ms: u64,

    /// Upper bound on waiting for a disconnect to flush
    pub disconnect_timeout_ms: u64,

    pub keep_alive_secs: u64,

    /// Client ids are `<prefix>-<uuid>`
    pub client_id_prefix: String,

    /// Must not contain MQTT wildcards
    pub queue_topic_prefix: String,

    pub user_id_property: String,

    pub delivery_mode: DeliveryMode,

    pub max_message_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            send_timeout_ms: 5_000,
            disconnect_timeout_ms: 2_000,
            keep_alive_secs: 30,
            client_id_prefix: "poke".to_string(),
            queue_topic_prefix: DEFAULT_QUEUE_TOPIC_PREFIX.to_string(),
            user_id_property: DEFAULT_USER_ID_PROPERTY.to_string(),
            delivery_mode: DeliveryMode::default(),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl SessionConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn disconnect_timeout(&self) -> Duration {
        Duration::from_millis(self.disconnect_timeout_ms)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    /// Short timeouts for tests and local brokers
    pub fn fast() -> Self {
        Self {
            connect_timeout_ms: 200,
            send_timeout_ms: 200,
            disconnect_timeout_ms: 200,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), SessionError> {
        if self.connect_timeout_ms == 0 {
            return Err(SessionError::InvalidProperties(
                "connect_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.send_timeout_ms == 0 {
            return Err(SessionError::InvalidProperties(
                "send_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.queue_topic_prefix.contains(['#', '+']) {
            return Err(SessionError::InvalidProperties(format!(
                "queue_topic_prefix '{}' must not contain MQTT wildcards",
                self.queue_topic_prefix
            )));
        }
        if self.user_id_property.is_empty() {
            return Err(SessionError::InvalidProperties(
                "user_id_property must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.send_timeout(), Duration::from_secs(5));
        assert_eq!(config.user_id_property, "JMSXUserID");
        assert_eq!(config.queue_topic_prefix, "P2P/QUE/");
        assert_eq!(config.delivery_mode, DeliveryMode::Direct);
        assert_eq!(config.max_message_size, DEFAULT_MAX_MESSAGE_SIZE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_deserialize_keeps_defaults() {
        let config: SessionConfig = serde_json::from_str(
            r#"{"connect_timeout_ms": 500, "client_id_prefix": "ops", "delivery_mode": "PERSISTENT"}"#,
        )
        .unwrap();
        assert_eq!(config.connect_timeout(), Duration::from_millis(500));
        assert_eq!(config.client_id_prefix, "ops");
        assert_eq!(config.delivery_mode, DeliveryMode::Persistent);
        assert_eq!(config.disconnect_timeout_ms, 2_000);
    }

    #[test]
    fn test_wildcard_queue_prefix_is_rejected() {
        for prefix in ["#P2P/QUE/", "queues/+/"] {
            let config = SessionConfig {
                queue_topic_prefix: prefix.to_string(),
                ..SessionConfig::default()
            };
            assert!(matches!(
                config.validate(),
                Err(SessionError::InvalidProperties(_))
            ));
        }
    }

    #[test]
    fn test_zero_send_timeout_is_rejected() {
        let config = SessionConfig {
            send_timeout_ms: 0,
            ..SessionConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
