use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::client::BrokerSessionClient;
use crate::config::SessionConfig;
use crate::error::RelayError;
use crate::request::{SendOutcome, SendRequest};
use crate::session::SessionFactory;
use crate::validation::validate_send_params;

/// Validate-then-publish entry point used by request handlers
#[derive(Debug, Clone)]
pub struct RelayService {
    client: BrokerSessionClient,
}

impl RelayService {
    pub fn new(factory: Arc<dyn SessionFactory>, config: SessionConfig) -> Self {
        Self {
            client: BrokerSessionClient::new(factory, config),
        }
    }

    /// Validate canonical parameters and publish a single message.
    ///
    /// Invalid parameters fail with [`RelayError::Validation`] before any
    /// session is created.
    pub async fn send_message(&self, params: &Value) -> Result<SendOutcome, RelayError> {
        let request = validate_send_params(params).map_err(|e| {
            warn!("Rejected send request: {}", e);
            e
        })?;
        self.send_request(&request).await
    }

    /// Publish an already validated request
    pub async fn send_request(&self, request: &SendRequest) -> Result<SendOutcome, RelayError> {
        debug!(
            broker_url = %request.broker_url,
            destination = %request.destination,
            is_queue = request.is_queue,
            "Relaying message"
        );

        self.client.publish(request).await.map_err(|e| {
            error!(kind = e.kind().name(), "Relay failed: {}", e);
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ScriptedSessionFactory;
    use serde_json::json;

    #[tokio::test]
    async fn test_invalid_params_never_touch_the_broker() {
        let factory = ScriptedSessionFactory::new();
        let service = RelayService::new(Arc::new(factory.clone()), SessionConfig::fast());

        let err = service
            .send_message(&json!({"brokerUrl": "ws://localhost:8008"}))
            .await
            .unwrap_err();

        assert!(err.is_validation_error());
        assert_eq!(
            err.to_string(),
            "Parameter 'vpnName' is required and must be a string"
        );
        assert_eq!(factory.sessions_created(), 0);
    }

    #[tokio::test]
    async fn test_valid_params_publish() {
        let factory = ScriptedSessionFactory::new();
        let service = RelayService::new(Arc::new(factory.clone()), SessionConfig::fast());

        let outcome = service
            .send_message(&json!({
                "brokerUrl": "ws://localhost:8008",
                "vpnName": "default",
                "username": "admin",
                "password": "admin",
                "destination": "orders/new",
                "payload": "hello",
                "isQueue": false
            }))
            .await
            .unwrap();

        assert!(outcome.success);
        let sent = factory.last_session().unwrap().sent_messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].attachment_text(), Some("hello"));
    }
}
