use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Everything a transport needs to open one connection attempt
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    /// Presigned `wss://` URL
    pub url: String,
    /// MQTT client identifier for this attempt
    pub client_id: String,
    pub keep_alive: Duration,
    pub connect_timeout: Duration,
}

/// A message delivered by the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Topic the message was published to
    pub topic: String,
    /// Raw payload bytes
    pub payload: Vec<u8>,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Payload as UTF-8 (lossy), for logging
    pub fn payload_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

/// Events surfaced by a live connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A publish arrived on a subscribed topic
    Message(InboundMessage),
    /// The connection dropped; carries the reason if known
    Lost(String),
}

/// Trait for opening pub/sub connections
///
/// The wire protocol (framing, QoS, keep-alive) lives behind this trait.
/// The session only drives it.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a connection
    ///
    /// # Returns
    /// * `Ok(connection)` - Broker accepted the connection
    /// * `Err(IotSocketError::Connect)` - Handshake or broker refusal
    async fn connect(&self, request: ConnectRequest) -> Result<Box<dyn Connection>>;
}

/// A live pub/sub connection
///
/// `next_event` is polled inside `tokio::select!` and must be cancel-safe.
#[async_trait]
pub trait Connection: Send {
    async fn subscribe(&mut self, topic: &str) -> Result<()>;

    async fn unsubscribe(&mut self, topic: &str) -> Result<()>;

    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<()>;

    /// Wait for the next inbound message or loss notification
    async fn next_event(&mut self) -> TransportEvent;

    async fn disconnect(&mut self) -> Result<()>;
}
