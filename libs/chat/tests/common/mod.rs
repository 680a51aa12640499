//! Common test utilities for chat integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use iotsockets::*;
use parking_lot::Mutex;
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

#[derive(Default)]
struct LoopbackState {
    inbox: Vec<mpsc::UnboundedSender<TransportEvent>>,
    published: Vec<(String, Vec<u8>)>,
}

/// Transport that accepts every connect and records publishes
#[derive(Clone, Default)]
pub struct Loopback {
    inner: Arc<Mutex<LoopbackState>>,
}

impl Loopback {
    pub fn deliver(&self, topic: &str, payload: serde_json::Value) {
        let state = self.inner.lock();
        let bytes = serde_json::to_vec(&payload).unwrap();
        state
            .inbox
            .last()
            .expect("no live connection")
            .send(TransportEvent::Message(InboundMessage::new(topic, bytes)))
            .unwrap();
    }

    pub fn published(&self) -> Vec<(String, serde_json::Value)> {
        self.inner
            .lock()
            .published
            .iter()
            .filter_map(|(t, p)| serde_json::from_slice(p).ok().map(|v| (t.clone(), v)))
            .collect()
    }
}

#[async_trait]
impl Transport for Loopback {
    async fn connect(&self, _request: ConnectRequest) -> Result<Box<dyn Connection>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.lock().inbox.push(tx);
        Ok(Box::new(LoopbackConnection {
            events: rx,
            inner: Arc::clone(&self.inner),
        }))
    }
}

struct LoopbackConnection {
    events: mpsc::UnboundedReceiver<TransportEvent>,
    inner: Arc<Mutex<LoopbackState>>,
}

#[async_trait]
impl Connection for LoopbackConnection {
    async fn subscribe(&mut self, _topic: &str) -> Result<()> {
        Ok(())
    }

    async fn unsubscribe(&mut self, _topic: &str) -> Result<()> {
        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<()> {
        self.inner.lock().published.push((topic.to_string(), payload));
        Ok(())
    }

    async fn next_event(&mut self) -> TransportEvent {
        match self.events.recv().await {
            Some(event) => event,
            None => std::future::pending().await,
        }
    }

    async fn disconnect(&mut self) -> Result<()> {
        Ok(())
    }
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
