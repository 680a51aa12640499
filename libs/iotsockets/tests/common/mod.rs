//! Common test utilities for IoTSockets integration tests
//!
//! Provides an in-memory broker standing in for the MQTT transport, a
//! deterministic clock and credential sources that fail on demand.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use iotsockets::*;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

/// One operation a session performed on a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Subscribe(String),
    Unsubscribe(String),
    Publish(String, Vec<u8>),
    Disconnect,
}

#[derive(Default)]
struct BrokerState {
    requests: Vec<ConnectRequest>,
    ops: Vec<(usize, Op)>,
    connections: Vec<mpsc::UnboundedSender<TransportEvent>>,
    refuse_next: usize,
}

/// In-memory broker implementing [`Transport`]
///
/// Every accepted connection gets an index, in connect order. Tests push
/// messages or losses into a connection by index and inspect what the
/// session did through `ops()`.
#[derive(Clone, Default)]
pub struct MockBroker {
    inner: Arc<Mutex<BrokerState>>,
}

impl MockBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse the next `n` connects
    pub fn refuse_next(&self, n: usize) {
        self.inner.lock().refuse_next = n;
    }

    pub fn requests(&self) -> Vec<ConnectRequest> {
        self.inner.lock().requests.clone()
    }

    pub fn connection_count(&self) -> usize {
        self.inner.lock().connections.len()
    }

    pub fn ops(&self) -> Vec<(usize, Op)> {
        self.inner.lock().ops.clone()
    }

    pub fn ops_on(&self, connection: usize) -> Vec<Op> {
        self.ops()
            .into_iter()
            .filter(|(index, _)| *index == connection)
            .map(|(_, op)| op)
            .collect()
    }

    /// JSON payloads published to `topic`, across all connections
    pub fn published_to(&self, topic: &str) -> Vec<serde_json::Value> {
        self.ops()
            .into_iter()
            .filter_map(|(_, op)| match op {
                Op::Publish(t, payload) if t == topic => serde_json::from_slice(&payload).ok(),
                _ => None,
            })
            .collect()
    }

    /// Deliver a message on connection `index`
    pub fn deliver(&self, index: usize, topic: &str, payload: serde_json::Value) {
        let bytes = serde_json::to_vec(&payload).unwrap();
        self.deliver_raw(index, topic, bytes);
    }

    pub fn deliver_raw(&self, index: usize, topic: &str, payload: Vec<u8>) {
        let state = self.inner.lock();
        state.connections[index]
            .send(TransportEvent::Message(InboundMessage::new(topic, payload)))
            .unwrap();
    }

    /// Drop connection `index`
    pub fn lose(&self, index: usize, reason: &str) {
        let state = self.inner.lock();
        state.connections[index]
            .send(TransportEvent::Lost(reason.to_string()))
            .unwrap();
    }

    fn record(&self, index: usize, op: Op) {
        self.inner.lock().ops.push((index, op));
    }
}

#[async_trait]
impl Transport for MockBroker {
    async fn connect(&self, request: ConnectRequest) -> Result<Box<dyn Connection>> {
        let mut state = self.inner.lock();
        state.requests.push(request);

        if state.refuse_next > 0 {
            state.refuse_next -= 1;
            return Err(IotSocketError::Connect("connection refused".to_string()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let index = state.connections.len();
        state.connections.push(tx);

        Ok(Box::new(MockConnection {
            index,
            events: rx,
            broker: self.clone(),
        }))
    }
}

pub struct MockConnection {
    index: usize,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    broker: MockBroker,
}

#[async_trait]
impl Connection for MockConnection {
    async fn subscribe(&mut self, topic: &str) -> Result<()> {
        self.broker.record(self.index, Op::Subscribe(topic.to_string()));
        Ok(())
    }

    async fn unsubscribe(&mut self, topic: &str) -> Result<()> {
        self.broker.record(self.index, Op::Unsubscribe(topic.to_string()));
        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<()> {
        self.broker.record(self.index, Op::Publish(topic.to_string(), payload));
        Ok(())
    }

    async fn next_event(&mut self) -> TransportEvent {
        match self.events.recv().await {
            Some(event) => event,
            None => std::future::pending().await,
        }
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.broker.record(self.index, Op::Disconnect);
        Ok(())
    }
}

/// Clock that advances one second per reading
pub struct SteppingClock {
    next: AtomicI64,
}

impl SteppingClock {
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            next: AtomicI64::new(start.timestamp()),
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Utc> {
        let secs = self.next.fetch_add(1, Ordering::SeqCst);
        Utc.timestamp_opt(secs, 0).single().unwrap()
    }
}

pub fn reference_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 8, 30, 0).unwrap()
}

pub fn test_credentials() -> StaticCredentials {
    StaticCredentials::new(Credentials::new("AKIDEXAMPLE", "secret", Some("token".into())))
}

/// Credential source that always fails and counts calls
#[derive(Clone, Default)]
pub struct FailingCredentials {
    pub calls: Arc<AtomicUsize>,
}

#[async_trait]
impl CredentialProvider for FailingCredentials {
    async fn credentials(&self) -> Result<Credentials> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(IotSocketError::Credentials("identity pool unreachable".to_string()))
    }
}

/// Credential source whose call never completes
#[derive(Clone, Default)]
pub struct StallingCredentials {
    pub calls: Arc<AtomicUsize>,
}

#[async_trait]
impl CredentialProvider for StallingCredentials {
    async fn credentials(&self) -> Result<Credentials> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

/// Value of one query parameter in a signed URL
pub fn query_param(url: &str, name: &str) -> Option<String> {
    let query = url.split_once('?')?.1;
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

/// Poll the session's events until one matches or two seconds pass
pub async fn wait_for_event<F>(session: &Session, mut matches: F) -> Option<SessionEvent>
where
    F: FnMut(&SessionEvent) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        while let Some(event) = session.try_recv_event() {
            verbose_println!("  event: {:?}", event);
            if matches(&event) {
                return Some(event);
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    None
}

/// Poll until `condition` holds or two seconds pass
pub async fn wait_until<F>(mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
