//! MQTT broker sessions
//!
//! Solace brokers expose MQTT listeners next to SMF; this transport speaks
//! MQTT 5 through `rumqttc`. Each session owns a driver task that polls the
//! event loop, reports the connect outcome through the [`ConnectNotifier`]
//! and forwards publish progress to the session.
//!
//! Queues are addressed as topics under [`SessionConfig::queue_topic_prefix`].
//! Message properties travel as MQTT 5 user properties. The message VPN is
//! selected by the listener the URL points at, so the VPN name is only logged.

use async_trait::async_trait;
use rumqttc::v5::mqttbytes::v5::{Packet, PublishProperties};
use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::{AsyncClient, Event, EventLoop, MqttOptions};
use rumqttc::{Outgoing, Transport};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};
use url::Url;
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::message::{DeliveryMode, Destination, OutboundMessage};
use crate::session::{BrokerSession, ConnectNotifier, SessionFactory, SessionProperties};

/// Request queue depth between a session and its event loop
const REQUEST_CAPACITY: usize = 10;

/// Supported broker connection types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Tcp,
    Tls,
    WebSocket,
    SecureWebSocket,
}

/// Broker address resolved from a session URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerEndpoint {
    pub kind: TransportKind,
    /// Host for TCP transports, the full URL for WebSocket transports
    pub address: String,
    pub port: u16,
}

impl BrokerEndpoint {
    /// Parse `tcp://`, `mqtt://`, `ssl://`, `tls://`, `mqtts://`, `ws://` or
    /// `wss://` URLs
    pub fn parse(raw: &str) -> Result<Self, SessionError> {
        let url = Url::parse(raw)
            .map_err(|e| SessionError::InvalidProperties(format!("{}: {}", raw, e)))?;
        let host = url
            .host_str()
            .ok_or_else(|| SessionError::InvalidProperties(format!("{}: missing host", raw)))?
            .to_string();

        let (kind, default_port) = match url.scheme() {
            "tcp" | "mqtt" => (TransportKind::Tcp, 1883),
            "ssl" | "tls" | "mqtts" => (TransportKind::Tls, 8883),
            "ws" => (TransportKind::WebSocket, 80),
            "wss" => (TransportKind::SecureWebSocket, 443),
            other => return Err(SessionError::UnsupportedScheme(other.to_string())),
        };
        let port = url.port_or_known_default().unwrap_or(default_port);

        let address = match kind {
            TransportKind::Tcp | TransportKind::Tls => host,
            TransportKind::WebSocket | TransportKind::SecureWebSocket => url.to_string(),
        };

        Ok(Self {
            kind,
            address,
            port,
        })
    }

    fn transport(&self) -> Transport {
        match self.kind {
            TransportKind::Tcp => Transport::Tcp,
            TransportKind::Tls => Transport::tls_with_default_config(),
            TransportKind::WebSocket => Transport::Ws,
            TransportKind::SecureWebSocket => Transport::wss_with_default_config(),
        }
    }
}

/// Topic a destination is published on
pub fn topic_for(destination: &Destination, queue_prefix: &str) -> String {
    match destination {
        Destination::Queue(name) => format!("{}{}", queue_prefix, name),
        Destination::Topic(name) => name.clone(),
    }
}

fn qos_for(mode: DeliveryMode) -> QoS {
    match mode {
        DeliveryMode::Direct => QoS::AtMostOnce,
        DeliveryMode::Persistent => QoS::AtLeastOnce,
    }
}

/// Creates MQTT sessions
#[derive(Debug, Clone, Default)]
pub struct MqttSessionFactory {
    config: SessionConfig,
}

impl MqttSessionFactory {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionFactory for MqttSessionFactory {
    async fn create_session(
        &self,
        properties: &SessionProperties,
    ) -> Result<Box<dyn BrokerSession>, SessionError> {
        let endpoint = BrokerEndpoint::parse(&properties.url)?;
        let client_id = format!("{}-{}", self.config.client_id_prefix, Uuid::new_v4().simple());

        let mut options = MqttOptions::new(client_id.clone(), endpoint.address.clone(), endpoint.port);
        options
            .set_credentials(properties.user_name.clone(), properties.password.clone())
            .set_keep_alive(self.config.keep_alive())
            .set_clean_start(true)
            .set_connection_timeout(self.config.connect_timeout().as_secs().max(1))
            .set_transport(endpoint.transport());

        debug!(
            client_id = %client_id,
            transport = ?endpoint.kind,
            vpn_name = %properties.vpn_name,
            "Created MQTT session"
        );

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        Ok(Box::new(MqttSession {
            client,
            eventloop: Some(eventloop),
            driver: None,
            events: None,
            queue_prefix: self.config.queue_topic_prefix.clone(),
            send_timeout: self.config.send_timeout(),
        }))
    }
}

/// Progress reported by the driver task after the connect
#[derive(Debug, Clone, PartialEq, Eq)]
enum DriverEvent {
    /// A publish was written to the network
    Published,
    /// The broker acknowledged a QoS 1 publish
    Acked,
    Failed(String),
}

pub struct MqttSession {
    client: AsyncClient,
    eventloop: Option<EventLoop>,
    driver: Option<JoinHandle<()>>,
    events: Option<mpsc::UnboundedReceiver<DriverEvent>>,
    queue_prefix: String,
    send_timeout: Duration,
}

impl std::fmt::Debug for MqttSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttSession")
            .field("driving", &self.driver.is_some())
            .field("queue_prefix", &self.queue_prefix)
            .field("send_timeout", &self.send_timeout)
            .finish()
    }
}

#[async_trait]
impl BrokerSession for MqttSession {
    async fn connect(&mut self, notifier: ConnectNotifier) -> Result<(), SessionError> {
        let eventloop = self
            .eventloop
            .take()
            .ok_or_else(|| SessionError::connect_failed("session already connected"))?;

        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(rx);
        self.driver = Some(tokio::spawn(drive(eventloop, notifier, tx)));
        Ok(())
    }

    async fn send(&mut self, message: OutboundMessage) -> Result<(), SessionError> {
        let events = self.events.as_mut().ok_or(SessionError::NotConnected)?;
        let topic = topic_for(&message.destination, &self.queue_prefix);
        let qos = qos_for(message.delivery_mode);

        trace!(topic = %topic, ?qos, properties = ?message.properties, "MQTT publish");
        let properties = PublishProperties {
            user_properties: message.properties.into_iter().collect(),
            ..PublishProperties::default()
        };
        self.client
            .publish_with_properties(topic, qos, false, message.attachment, properties)
            .await
            .map_err(|e| SessionError::send_failed(e.to_string()))?;

        let expected = match qos {
            QoS::AtMostOnce => DriverEvent::Published,
            _ => DriverEvent::Acked,
        };
        let completion = async {
            loop {
                match events.recv().await {
                    Some(event) if event == expected => return Ok(()),
                    Some(DriverEvent::Failed(reason)) => {
                        return Err(SessionError::SendFailed(reason))
                    }
                    Some(_) => continue,
                    None => return Err(SessionError::send_failed("broker connection closed")),
                }
            }
        };

        tokio::time::timeout(self.send_timeout, completion)
            .await
            .map_err(|_| SessionError::timeout(self.send_timeout))?
    }

    async fn disconnect(&mut self) -> Result<(), SessionError> {
        self.client
            .disconnect()
            .await
            .map_err(|e| SessionError::DisconnectFailed(e.to_string()))?;

        // Polled by reference so a cancelled disconnect leaves the handle for
        // dispose to abort.
        if let Some(driver) = self.driver.as_mut() {
            if let Err(e) = driver.await {
                warn!("MQTT driver ended abnormally: {}", e);
            }
            self.driver = None;
        }
        Ok(())
    }

    fn dispose(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
        self.events = None;
        self.eventloop = None;
    }
}

async fn drive(
    mut eventloop: EventLoop,
    notifier: ConnectNotifier,
    events: mpsc::UnboundedSender<DriverEvent>,
) {
    let mut notifier = Some(notifier);

    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                trace!(?ack, "MQTT connack");
                if let Some(notifier) = notifier.take() {
                    notifier.up();
                }
            }
            // Failed reason codes surface as event loop errors
            Ok(Event::Incoming(Packet::PubAck(_))) => {
                let _ = events.send(DriverEvent::Acked);
            }
            Ok(Event::Outgoing(Outgoing::Publish(_))) => {
                let _ = events.send(DriverEvent::Published);
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!("MQTT disconnect sent");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                match notifier.take() {
                    Some(notifier) => notifier.failed(e.to_string()),
                    None => {
                        let _ = events.send(DriverEvent::Failed(e.to_string()));
                    }
                }
                break;
            }
        }
    }
}
