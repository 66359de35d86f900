//! Error taxonomy for the publish pipeline
//!
//! Every failure that leaves the crate is a [`RelayError`]. Transport
//! implementations report [`SessionError`], which the session client maps
//! onto the taxonomy before returning.

use serde::Serialize;

/// Structured context attached to connection and message failures.
///
/// Never carries credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broker_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpn_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_queue: Option<bool>,

    /// Display form of the underlying cause
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_error: Option<String>,
}

impl ErrorDetails {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_broker_url(mut self, url: impl Into<String>) -> Self {
        self.broker_url = Some(url.into());
        self
    }

    pub fn with_vpn_name(mut self, vpn_name: impl Into<String>) -> Self {
        self.vpn_name = Some(vpn_name.into());
        self
    }

    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    pub fn with_is_queue(mut self, is_queue: bool) -> Self {
        self.is_queue = Some(is_queue);
        self
    }

    pub fn with_original_error(mut self, error: impl ToString) -> Self {
        self.original_error = Some(error.to_string());
        self
    }
}

/// Classification of a [`RelayError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad input, no network attempted
    Validation,
    /// Broker unreachable or rejected the session
    Connection,
    /// Message construction or publish failed
    Message,
}

impl ErrorKind {
    /// Stable name used in logs and API payloads
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Validation => "ValidationError",
            ErrorKind::Connection => "ConnectionError",
            ErrorKind::Message => "MessageError",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    #[error("{message}")]
    Validation {
        message: String,
        details: Option<ErrorDetails>,
    },

    #[error("{message}")]
    Connection {
        message: String,
        details: Option<ErrorDetails>,
    },

    #[error("{message}")]
    Message {
        message: String,
        details: Option<ErrorDetails>,
    },
}

impl RelayError {
    /// Create a validation error without details
    pub fn validation(message: impl Into<String>) -> Self {
        RelayError::Validation {
            message: message.into(),
            details: None,
        }
    }

    /// Create a connection error with context
    pub fn connection(message: impl Into<String>, details: ErrorDetails) -> Self {
        RelayError::Connection {
            message: message.into(),
            details: Some(details),
        }
    }

    /// Create a message error with context
    pub fn message(message: impl Into<String>, details: ErrorDetails) -> Self {
        RelayError::Message {
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RelayError::Validation { .. } => ErrorKind::Validation,
            RelayError::Connection { .. } => ErrorKind::Connection,
            RelayError::Message { .. } => ErrorKind::Message,
        }
    }

    /// Human-readable message, identical to the `Display` output
    pub fn message_text(&self) -> &str {
        match self {
            RelayError::Validation { message, .. }
            | RelayError::Connection { message, .. }
            | RelayError::Message { message, .. } => message,
        }
    }

    pub fn details(&self) -> Option<&ErrorDetails> {
        match self {
            RelayError::Validation { details, .. }
            | RelayError::Connection { details, .. }
            | RelayError::Message { details, .. } => details.as_ref(),
        }
    }

    pub fn is_validation_error(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }

    pub fn is_connection_error(&self) -> bool {
        self.kind() == ErrorKind::Connection
    }
}

/// Errors reported by [`crate::SessionFactory`] and [`crate::BrokerSession`]
/// implementations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Invalid session properties: {0}")]
    InvalidProperties(String),

    #[error("Unsupported broker URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Connect failed: {0}")]
    ConnectFailed(String),

    #[error("Session not connected")]
    NotConnected,

    #[error("Message too large: {size}B exceeds limit of {limit}B")]
    MessageTooLarge { size: usize, limit: usize },

    #[error("Payload serialization failed: {0}")]
    Serialization(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Disconnect failed: {0}")]
    DisconnectFailed(String),

    #[error("Timeout after {0} ms")]
    Timeout(u64),
}

impl SessionError {
    pub fn connect_failed(msg: impl Into<String>) -> Self {
        SessionError::ConnectFailed(msg.into())
    }

    pub fn send_failed(msg: impl Into<String>) -> Self {
        SessionError::SendFailed(msg.into())
    }

    pub fn message_too_large(size: usize, limit: usize) -> Self {
        SessionError::MessageTooLarge { size, limit }
    }

    /// Saturates at `u64::MAX` milliseconds
    pub fn timeout(after: std::time::Duration) -> Self {
        SessionError::Timeout(u64::try_from(after.as_millis()).unwrap_or(u64::MAX))
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::Serialization(err.to_string())
    }
}
