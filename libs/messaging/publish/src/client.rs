//! Broker session client
//!
//! Runs one transient session per publish:
//!
//! ```text
//! Idle -> Connecting -> Connected -> Publishing -> Disconnecting -> Done
//!             |                          |
//!             +--------> Failed <--------+
//! ```
//!
//! Once a session reaches `Connected` it is always disconnected and
//! disposed before `publish` returns, whatever the publish outcome. A
//! [`SessionGuard`] disposes sessions on every other exit path, including a
//! caller dropping the future mid-flight.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{ErrorDetails, RelayError, SessionError};
use crate::message::{Destination, OutboundMessage};
use crate::request::{SendOutcome, SendRequest};
use crate::session::{
    BrokerSession, ConnectNotice, ConnectNotifier, SessionFactory, SessionProperties,
    SessionState,
};

/// Stable message for every failed connect
pub const CONNECTION_FAILED_MESSAGE: &str = "Connection to Solace broker failed";

/// Publishes single messages over fresh broker sessions
#[derive(Debug, Clone)]
pub struct BrokerSessionClient {
    factory: Arc<dyn SessionFactory>,
    config: SessionConfig,
}

impl BrokerSessionClient {
    pub fn new(factory: Arc<dyn SessionFactory>, config: SessionConfig) -> Self {
        Self { factory, config }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Connect, publish `request`, and disconnect.
    ///
    /// Fails with [`RelayError::Connection`] when the broker rejects or never
    /// acknowledges the session, and with [`RelayError::Message`] for any
    /// other failure.
    pub async fn publish(&self, request: &SendRequest) -> Result<SendOutcome, RelayError> {
        let properties = SessionProperties {
            url: request.broker_url.clone(),
            vpn_name: request.vpn_name.clone(),
            user_name: request.username.clone(),
            password: request.password.clone(),
        };

        let session = self
            .factory
            .create_session(&properties)
            .await
            .map_err(|e| message_error(request, &e))?;
        let mut guard = SessionGuard::new(session);

        if let Err(e) = self.connect(&mut guard, request).await {
            guard.state = SessionState::Failed;
            return Err(e);
        }

        let outcome = self.publish_connected(&mut guard, request).await;
        guard.release(self.config.disconnect_timeout()).await;
        guard.state = if outcome.is_ok() {
            SessionState::Done
        } else {
            SessionState::Failed
        };

        outcome
    }

    async fn connect(
        &self,
        guard: &mut SessionGuard,
        request: &SendRequest,
    ) -> Result<(), RelayError> {
        guard.state = SessionState::Connecting;
        debug!(
            broker_url = %request.broker_url,
            vpn_name = %request.vpn_name,
            "Connecting to broker"
        );

        let (notifier, notice) = ConnectNotifier::channel();
        guard
            .session
            .connect(notifier)
            .await
            .map_err(|e| connection_error(request, e))?;

        let timeout = self.config.connect_timeout();
        match tokio::time::timeout(timeout, notice).await {
            Ok(Ok(ConnectNotice::Up)) => {
                guard.state = SessionState::Connected;
                info!(broker_url = %request.broker_url, "Connected to broker");
                Ok(())
            }
            Ok(Ok(ConnectNotice::ConnectFailed(reason))) => {
                warn!(broker_url = %request.broker_url, "Connection failed: {}", reason);
                Err(connection_error(request, SessionError::ConnectFailed(reason)))
            }
            Ok(Err(_)) => Err(connection_error(
                request,
                SessionError::connect_failed("session ended without reporting a connect outcome"),
            )),
            Err(_) => {
                warn!(
                    broker_url = %request.broker_url,
                    "No connect notice within {:?}", timeout
                );
                Err(connection_error(
                    request,
                    SessionError::timeout(timeout),
                ))
            }
        }
    }

    async fn publish_connected(
        &self,
        guard: &mut SessionGuard,
        request: &SendRequest,
    ) -> Result<SendOutcome, RelayError> {
        guard.state = SessionState::Publishing;

        let message = self
            .build_message(request)
            .map_err(|e| message_error(request, &e))?;
        debug!(
            destination = message.destination.name(),
            is_queue = message.destination.is_queue(),
            size = message.size(),
            "Publishing message"
        );

        guard
            .session
            .send(message)
            .await
            .map_err(|e| message_error(request, &e))?;

        info!(
            destination = %request.destination,
            is_queue = request.is_queue,
            "Message sent"
        );
        Ok(SendOutcome::sent())
    }

    /// Build the outbound message for `request`
    pub fn build_message(&self, request: &SendRequest) -> Result<OutboundMessage, SessionError> {
        let destination = Destination::resolve(request.destination.clone(), request.is_queue);
        let attachment = request.payload.to_text()?.into_bytes();

        Ok(
            OutboundMessage::new_with_limit(destination, attachment, self.config.max_message_size)?
                .with_property(self.config.user_id_property.clone(), request.username.clone())
                .with_delivery_mode(self.config.delivery_mode),
        )
    }
}

/// Owns a session for the duration of one publish
#[derive(Debug)]
struct SessionGuard {
    session: Box<dyn BrokerSession>,
    state: SessionState,
    released: bool,
}

impl SessionGuard {
    fn new(session: Box<dyn BrokerSession>) -> Self {
        Self {
            session,
            state: SessionState::Idle,
            released: false,
        }
    }

    /// Disconnect (when connected) and dispose. Disconnect failures are
    /// logged and otherwise ignored.
    async fn release(&mut self, timeout: Duration) {
        if self.state.reached_connected() {
            self.state = SessionState::Disconnecting;
            debug!("Disconnecting from broker");
            match tokio::time::timeout(timeout, self.session.disconnect()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Error disconnecting from broker: {}", e),
                Err(_) => warn!("Disconnect did not complete within {:?}", timeout),
            }
        }

        self.session.dispose();
        self.released = true;
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if !self.released {
            self.session.dispose();
        }
    }
}

fn connection_error(request: &SendRequest, cause: SessionError) -> RelayError {
    RelayError::connection(
        CONNECTION_FAILED_MESSAGE,
        ErrorDetails::new()
            .with_broker_url(&request.broker_url)
            .with_vpn_name(&request.vpn_name)
            .with_original_error(cause),
    )
}

fn message_error(request: &SendRequest, cause: &SessionError) -> RelayError {
    RelayError::message(
        format!("Failed to send message: {}", cause),
        ErrorDetails::new()
            .with_broker_url(&request.broker_url)
            .with_destination(&request.destination)
            .with_is_queue(request.is_queue)
            .with_original_error(cause),
    )
}
