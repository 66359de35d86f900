use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Success text returned for every completed publish
pub const SEND_SUCCESS_MESSAGE: &str = "Message sent successfully";

/// Message body as supplied by the caller
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Sent verbatim
    Text(String),
    /// Serialized to JSON text before transmission
    Structured(Value),
}

impl Payload {
    /// Build a payload from an arbitrary JSON value.
    ///
    /// Strings are kept as text; every other value is treated as structured.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::String(text) => Payload::Text(text),
            other => Payload::Structured(other),
        }
    }

    /// Canonical text form that goes on the wire
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        match self {
            Payload::Text(text) => Ok(text.clone()),
            Payload::Structured(value) => serde_json::to_string(value),
        }
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

/// A validated publish request.
///
/// Produced by [`crate::validate_send_params`]; every string field is
/// non-empty.
#[derive(Clone, PartialEq)]
pub struct SendRequest {
    pub broker_url: String,
    pub vpn_name: String,
    pub username: String,
    pub password: String,
    pub destination: String,
    pub payload: Payload,
    pub is_queue: bool,
}

// Hand-written so the password never reaches logs.
impl fmt::Debug for SendRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendRequest")
            .field("broker_url", &self.broker_url)
            .field("vpn_name", &self.vpn_name)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("destination", &self.destination)
            .field("payload", &self.payload)
            .field("is_queue", &self.is_queue)
            .finish()
    }
}

/// Result of a completed publish
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendOutcome {
    pub success: bool,
    pub message: String,
}

impl SendOutcome {
    pub fn sent() -> Self {
        Self {
            success: true,
            message: SEND_SUCCESS_MESSAGE.to_string(),
        }
    }
}
