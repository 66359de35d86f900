use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::SessionError;

/// Maximum attachment size in bytes (16MB default)
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Where a message is published
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Destination {
    /// Point-to-point, durably addressed
    Queue(String),
    /// Publish/subscribe
    Topic(String),
}

impl Destination {
    /// Resolve a destination name by addressing style
    pub fn resolve(name: impl Into<String>, is_queue: bool) -> Self {
        if is_queue {
            Destination::Queue(name.into())
        } else {
            Destination::Topic(name.into())
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Destination::Queue(name) | Destination::Topic(name) => name,
        }
    }

    pub fn is_queue(&self) -> bool {
        matches!(self, Destination::Queue(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeliveryMode {
    /// Fire-and-forget, no acknowledgement wait
    #[default]
    Direct,
    /// Broker acknowledges and stores before delivery
    Persistent,
}

/// A message ready for a single publish on a broker session
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub destination: Destination,

    /// Raw attachment bytes
    pub attachment: Vec<u8>,

    pub delivery_mode: DeliveryMode,

    /// String properties carried alongside the attachment
    pub properties: BTreeMap<String, String>,
}

impl OutboundMessage {
    /// Create a direct-mode message, validating attachment size
    pub fn new(destination: Destination, attachment: Vec<u8>) -> Result<Self, SessionError> {
        Self::new_with_limit(destination, attachment, DEFAULT_MAX_MESSAGE_SIZE)
    }

    /// Create a direct-mode message with a custom size limit
    pub fn new_with_limit(
        destination: Destination,
        attachment: Vec<u8>,
        max_size: usize,
    ) -> Result<Self, SessionError> {
        if attachment.len() > max_size {
            return Err(SessionError::message_too_large(attachment.len(), max_size));
        }

        Ok(Self {
            destination,
            attachment,
            delivery_mode: DeliveryMode::Direct,
            properties: BTreeMap::new(),
        })
    }

    pub fn with_delivery_mode(mut self, mode: DeliveryMode) -> Self {
        self.delivery_mode = mode;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Attachment as UTF-8 text, if it is valid UTF-8
    pub fn attachment_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.attachment).ok()
    }

    pub fn size(&self) -> usize {
        self.attachment.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_resolution() {
        let queue = Destination::resolve("test-queue", true);
        assert_eq!(queue, Destination::Queue("test-queue".to_string()));
        assert!(queue.is_queue());

        let topic = Destination::resolve("test-queue", false);
        assert_eq!(topic, Destination::Topic("test-queue".to_string()));
        assert_eq!(topic.name(), "test-queue");
        assert!(!topic.is_queue());
    }

    #[test]
    fn test_message_defaults_to_direct() {
        let msg = OutboundMessage::new(Destination::resolve("a/b", false), b"hi".to_vec())
            .unwrap()
            .with_property("JMSXUserID", "admin");
        assert_eq!(msg.delivery_mode, DeliveryMode::Direct);
        assert_eq!(msg.property("JMSXUserID"), Some("admin"));
        assert_eq!(msg.attachment_text(), Some("hi"));
        assert_eq!(msg.size(), 2);
    }

    #[test]
    fn test_message_size_validation() {
        let dest = Destination::resolve("q", true);
        assert!(OutboundMessage::new_with_limit(dest.clone(), vec![0u8; 50], 100).is_ok());

        let err = OutboundMessage::new_with_limit(dest, vec![0u8; 101], 100).unwrap_err();
        assert_eq!(err, SessionError::message_too_large(101, 100));
    }
}
