//! Scripted broker sessions for exercising the publish pipeline without a
//! broker.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::SessionError;
use crate::message::OutboundMessage;
use crate::session::{BrokerSession, ConnectNotifier, SessionFactory, SessionProperties};

/// How a scripted session answers `connect`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectBehavior {
    /// Report up, from a spawned task
    Up,
    /// Report up after a delay
    UpAfter(Duration),
    /// Report a failed connect
    Fail(String),
    /// Hold the notifier and never report
    Silent,
    /// Drop the notifier without reporting
    DropNotifier,
    /// Refuse to start the attempt
    StartError(String),
}

/// Calls observed by one scripted session
#[derive(Debug, Default)]
pub struct SessionLog {
    properties: Mutex<Option<SessionProperties>>,
    connect_calls: AtomicUsize,
    disconnect_calls: AtomicUsize,
    dispose_calls: AtomicUsize,
    sent: Mutex<Vec<OutboundMessage>>,
}

impl SessionLog {
    pub fn properties(&self) -> Option<SessionProperties> {
        self.properties.lock().unwrap().clone()
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> usize {
        self.disconnect_calls.load(Ordering::SeqCst)
    }

    pub fn dispose_calls(&self) -> usize {
        self.dispose_calls.load(Ordering::SeqCst)
    }

    /// Messages accepted by `send`, in order
    pub fn sent_messages(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }
}

/// Factory producing [`ScriptedSession`]s that all follow the same script
#[derive(Debug, Clone)]
pub struct ScriptedSessionFactory {
    connect: ConnectBehavior,
    send_error: Option<String>,
    disconnect_error: Option<String>,
    create_error: Option<String>,
    sessions: Arc<Mutex<Vec<Arc<SessionLog>>>>,
}

impl ScriptedSessionFactory {
    /// Sessions that connect and publish successfully
    pub fn new() -> Self {
        Self {
            connect: ConnectBehavior::Up,
            send_error: None,
            disconnect_error: None,
            create_error: None,
            sessions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_connect(mut self, behavior: ConnectBehavior) -> Self {
        self.connect = behavior;
        self
    }

    pub fn with_send_error(mut self, reason: impl Into<String>) -> Self {
        self.send_error = Some(reason.into());
        self
    }

    pub fn with_disconnect_error(mut self, reason: impl Into<String>) -> Self {
        self.disconnect_error = Some(reason.into());
        self
    }

    pub fn with_create_error(mut self, reason: impl Into<String>) -> Self {
        self.create_error = Some(reason.into());
        self
    }

    pub fn sessions_created(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn last_session(&self) -> Option<Arc<SessionLog>> {
        self.sessions.lock().unwrap().last().cloned()
    }
}

impl Default for ScriptedSessionFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionFactory for ScriptedSessionFactory {
    async fn create_session(
        &self,
        properties: &SessionProperties,
    ) -> Result<Box<dyn BrokerSession>, SessionError> {
        if let Some(reason) = &self.create_error {
            return Err(SessionError::InvalidProperties(reason.clone()));
        }

        let log = Arc::new(SessionLog::default());
        *log.properties.lock().unwrap() = Some(properties.clone());
        self.sessions.lock().unwrap().push(log.clone());

        Ok(Box::new(ScriptedSession {
            script: self.clone(),
            log,
            connected: false,
            held_notifier: None,
        }))
    }
}

/// Session that follows its factory's script and records every call
#[derive(Debug)]
pub struct ScriptedSession {
    script: ScriptedSessionFactory,
    log: Arc<SessionLog>,
    connected: bool,
    held_notifier: Option<ConnectNotifier>,
}

#[async_trait]
impl BrokerSession for ScriptedSession {
    async fn connect(&mut self, notifier: ConnectNotifier) -> Result<(), SessionError> {
        self.log.connect_calls.fetch_add(1, Ordering::SeqCst);

        match self.script.connect.clone() {
            ConnectBehavior::Up => {
                self.connected = true;
                tokio::spawn(async move { notifier.up() });
            }
            ConnectBehavior::UpAfter(delay) => {
                self.connected = true;
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    notifier.up();
                });
            }
            ConnectBehavior::Fail(reason) => notifier.failed(reason),
            ConnectBehavior::Silent => self.held_notifier = Some(notifier),
            ConnectBehavior::DropNotifier => drop(notifier),
            ConnectBehavior::StartError(reason) => {
                return Err(SessionError::ConnectFailed(reason));
            }
        }
        Ok(())
    }

    async fn send(&mut self, message: OutboundMessage) -> Result<(), SessionError> {
        if !self.connected {
            return Err(SessionError::NotConnected);
        }
        if let Some(reason) = &self.script.send_error {
            return Err(SessionError::send_failed(reason.clone()));
        }
        self.log.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), SessionError> {
        self.log.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        self.connected = false;
        match &self.script.disconnect_error {
            Some(reason) => Err(SessionError::DisconnectFailed(reason.clone())),
            None => Ok(()),
        }
    }

    fn dispose(&mut self) {
        self.log.dispose_calls.fetch_add(1, Ordering::SeqCst);
        self.held_notifier = None;
    }
}
