//! One-shot broker publishing
//!
//! Validates a publish request, opens a transient session against the
//! broker it names, sends a single message and tears the session down.
//! Every failure surfaces as a [`RelayError`] classified as validation,
//! connection or message error.

pub mod client;
pub mod config;
pub mod error;
pub mod message;
pub mod mqtt;
pub mod request;
pub mod service;
pub mod session;
pub mod test_utils;
pub mod validation;

pub use client::{BrokerSessionClient, CONNECTION_FAILED_MESSAGE};
pub use config::{SessionConfig, DEFAULT_QUEUE_TOPIC_PREFIX, DEFAULT_USER_ID_PROPERTY};
pub use error::{ErrorDetails, ErrorKind, RelayError, SessionError};
pub use message::{DeliveryMode, Destination, OutboundMessage, DEFAULT_MAX_MESSAGE_SIZE};
pub use mqtt::{BrokerEndpoint, MqttSessionFactory, TransportKind};
pub use request::{Payload, SendOutcome, SendRequest, SEND_SUCCESS_MESSAGE};
pub use service::RelayService;
pub use session::{
    BrokerSession, ConnectNotice, ConnectNotifier, SessionFactory, SessionProperties,
    SessionState,
};
pub use validation::{validate_send_params, REQUIRED_STRING_PARAMS};
