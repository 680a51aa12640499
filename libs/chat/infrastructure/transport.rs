//! MQTT 3.1.1 over WSS, backed by `rumqttc`
//!
//! One `rumqttc` client and event loop per connection attempt. The event
//! loop is polled until CONNACK inside `connect`, then handed to a pump
//! task that forwards publishes and reports the first error as a loss.
//! `rumqttc`'s own reconnect is never used: the session reconnects with a
//! freshly signed URL instead.

use async_trait::async_trait;
use iotsockets::{
    ConnectRequest, Connection, InboundMessage, IotSocketError, Result, Transport, TransportEvent,
};
use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Largest packet the broker accepts
const MAX_PACKET_SIZE: usize = 128 * 1024;

/// Port passed to `rumqttc`; websocket mode takes the port from the URL
const WSS_PORT: u16 = 443;

/// [`Transport`] that opens `wss://` MQTT connections with rustls
#[derive(Debug, Clone)]
pub struct RumqttTransport {
    /// Capacity of the `rumqttc` request channel
    capacity: usize,
}

impl RumqttTransport {
    pub fn new() -> Self {
        Self { capacity: 64 }
    }

    fn options(request: &ConnectRequest) -> MqttOptions {
        let mut options = MqttOptions::new(request.client_id.clone(), request.url.clone(), WSS_PORT);
        options
            .set_transport(rumqttc::Transport::wss_with_default_config())
            .set_keep_alive(request.keep_alive)
            .set_clean_session(true)
            .set_max_packet_size(MAX_PACKET_SIZE, MAX_PACKET_SIZE);
        options
    }
}

impl Default for RumqttTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for RumqttTransport {
    async fn connect(&self, request: ConnectRequest) -> Result<Box<dyn Connection>> {
        let (client, mut event_loop) = AsyncClient::new(Self::options(&request), self.capacity);

        let handshake = tokio::time::timeout(request.connect_timeout, async {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(ack))) => return Ok(ack),
                    Ok(_) => continue,
                    Err(e) => return Err(e),
                }
            }
        })
        .await;

        match handshake {
            Err(_) => {
                return Err(IotSocketError::Connect(format!(
                    "no CONNACK within {:?}",
                    request.connect_timeout
                )))
            }
            Ok(Err(e)) => return Err(IotSocketError::Connect(e.to_string())),
            Ok(Ok(ack)) if ack.code != ConnectReturnCode::Success => {
                return Err(IotSocketError::Connect(format!("broker refused: {:?}", ack.code)))
            }
            Ok(Ok(_)) => {}
        }

        debug!(client_id = %request.client_id, "MQTT session established");

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let pump = tokio::spawn(pump_events(event_loop, event_tx));

        Ok(Box::new(RumqttConnection {
            client,
            events: event_rx,
            pump,
        }))
    }
}

/// Forward incoming publishes until the event loop fails
async fn pump_events(mut event_loop: EventLoop, events: mpsc::UnboundedSender<TransportEvent>) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let message = InboundMessage::new(publish.topic, publish.payload.to_vec());
                if events.send(TransportEvent::Message(message)).is_err() {
                    break;
                }
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                let _ = events.send(TransportEvent::Lost("broker sent DISCONNECT".to_string()));
                break;
            }
            Ok(_) => {}
            Err(e) => {
                let _ = events.send(TransportEvent::Lost(e.to_string()));
                break;
            }
        }
    }
}

/// A live `rumqttc` connection
pub struct RumqttConnection {
    client: AsyncClient,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    pump: JoinHandle<()>,
}

#[async_trait]
impl Connection for RumqttConnection {
    async fn subscribe(&mut self, topic: &str) -> Result<()> {
        self.client
            .subscribe(topic, QoS::AtMostOnce)
            .await
            .map_err(|e| IotSocketError::Transport(e.to_string()))
    }

    async fn unsubscribe(&mut self, topic: &str) -> Result<()> {
        self.client
            .unsubscribe(topic)
            .await
            .map_err(|e| IotSocketError::Transport(e.to_string()))
    }

    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<()> {
        self.client
            .publish(topic, QoS::AtMostOnce, false, payload)
            .await
            .map_err(|e| IotSocketError::Transport(e.to_string()))
    }

    async fn next_event(&mut self) -> TransportEvent {
        match self.events.recv().await {
            Some(event) => event,
            None => TransportEvent::Lost("event loop stopped".to_string()),
        }
    }

    async fn disconnect(&mut self) -> Result<()> {
        let result = self.client.disconnect().await;
        // Give the DISCONNECT a moment to flush before the pump goes away
        tokio::task::yield_now().await;
        self.pump.abort();
        result.map_err(|e| {
            warn!("MQTT disconnect failed: {}", e);
            IotSocketError::Transport(e.to_string())
        })
    }
}

impl Drop for RumqttConnection {
    fn drop(&mut self) {
        self.pump.abort();
    }
}
