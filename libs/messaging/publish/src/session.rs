//! Broker session abstraction
//!
//! A [`SessionFactory`] creates one [`BrokerSession`] per publish. Broker
//! client libraries report the outcome of a connect asynchronously; sessions
//! deliver that outcome through a [`ConnectNotifier`], which is consumed on
//! use so at most one notice reaches the waiting caller.

use async_trait::async_trait;
use std::fmt;
use tokio::sync::oneshot;

use crate::error::SessionError;
use crate::message::OutboundMessage;

/// Properties a session is created from
#[derive(Clone, PartialEq, Eq)]
pub struct SessionProperties {
    pub url: String,
    pub vpn_name: String,
    pub user_name: String,
    pub password: String,
}

impl fmt::Debug for SessionProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionProperties")
            .field("url", &self.url)
            .field("vpn_name", &self.vpn_name)
            .field("user_name", &self.user_name)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Session lifecycle within a single publish
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Connecting,
    Connected,
    Publishing,
    Disconnecting,
    Done,
    Failed,
}

impl SessionState {
    /// Whether a disconnect is owed for this session
    pub fn reached_connected(&self) -> bool {
        matches!(
            self,
            SessionState::Connected | SessionState::Publishing | SessionState::Disconnecting
        )
    }
}

/// Outcome of a connect attempt as reported by the broker client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectNotice {
    Up,
    ConnectFailed(String),
}

/// One-shot handle a session uses to report its connect outcome
#[derive(Debug)]
pub struct ConnectNotifier {
    tx: oneshot::Sender<ConnectNotice>,
}

impl ConnectNotifier {
    /// Create a notifier and the receiver the caller awaits on
    pub fn channel() -> (Self, oneshot::Receiver<ConnectNotice>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    /// Report that the session is up
    pub fn up(self) {
        // The receiver is gone once the caller timed out; nothing to report to.
        let _ = self.tx.send(ConnectNotice::Up);
    }

    /// Report that the connect attempt failed
    pub fn failed(self, reason: impl Into<String>) {
        let _ = self.tx.send(ConnectNotice::ConnectFailed(reason.into()));
    }

    /// True when nobody is waiting for the notice anymore
    pub fn is_abandoned(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Creates broker sessions.
///
/// Implementations hold any one-time client setup; the host process builds
/// the factory once before the first publish.
#[async_trait]
pub trait SessionFactory: Send + Sync + fmt::Debug {
    /// Create an unconnected session
    async fn create_session(
        &self,
        properties: &SessionProperties,
    ) -> Result<Box<dyn BrokerSession>, SessionError>;
}

/// A single transient broker session
#[async_trait]
pub trait BrokerSession: Send + fmt::Debug {
    /// Issue the connect.
    ///
    /// Returns once the attempt is under way. The outcome arrives through
    /// `notifier`; an `Err` here means the attempt could not be started.
    async fn connect(&mut self, notifier: ConnectNotifier) -> Result<(), SessionError>;

    /// Publish one message on the connected session
    async fn send(&mut self, message: OutboundMessage) -> Result<(), SessionError>;

    /// Close the connection to the broker
    async fn disconnect(&mut self) -> Result<(), SessionError>;

    /// Release any resources still held. Must not block.
    fn dispose(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_state() {
        assert!(SessionState::Connected.reached_connected());
        assert!(SessionState::Publishing.reached_connected());
        assert!(!SessionState::Connecting.reached_connected());
        assert!(!SessionState::Idle.reached_connected());
        assert!(!SessionState::Done.reached_connected());
    }

    #[tokio::test]
    async fn test_notifier_delivers_single_notice() {
        let (notifier, rx) = ConnectNotifier::channel();
        assert!(!notifier.is_abandoned());
        notifier.failed("refused");
        assert_eq!(
            rx.await.unwrap(),
            ConnectNotice::ConnectFailed("refused".to_string())
        );
    }

    #[tokio::test]
    async fn test_dropped_notifier_closes_channel() {
        let (notifier, rx) = ConnectNotifier::channel();
        drop(notifier);
        assert!(rx.await.is_err());
    }

    #[test]
    fn test_properties_debug_redacts_password() {
        let props = SessionProperties {
            url: "tcp://localhost:1883".to_string(),
            vpn_name: "default".to_string(),
            user_name: "admin".to_string(),
            password: "secret".to_string(),
        };
        assert!(!format!("{:?}", props).contains("secret"));
    }
}
