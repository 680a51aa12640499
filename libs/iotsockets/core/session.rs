use crate::config::SessionConfig;
use crate::connection_state::{AtomicMetrics, AtomicSessionState, SessionState};
use crate::core::commands::{CommandKind, Pong};
use crate::core::router::{Route, TopicRouter};
use crate::core::signer::sign;
use crate::core::topics::{ClientId, Topics};
use crate::traits::*;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::RwLock;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Internal control messages for the session task
#[derive(Debug)]
enum SessionCommand {
    /// Begin a fresh attempt, tearing down any live connection first
    Start,
    /// Publish on the live connection
    Publish { topic: String, payload: Vec<u8> },
    /// Tear down and exit
    Shutdown,
}

/// Events emitted by the session task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A connection attempt began (reconnects since the last stable connection)
    Connecting { attempt: usize },
    /// Connected, subscribed and presence announced
    Connected { client_id: String },
    /// The credential source failed; the attempt was aborted
    CredentialsFailed(String),
    /// The transport refused the connection
    ConnectFailed(String),
    /// An established connection dropped
    Lost(String),
    /// Waiting before the next attempt
    Reconnecting { attempt: usize, delay: Duration },
    /// A command arrived on the inbound topic
    CommandReceived(CommandKind),
    /// The session task exited
    Stopped,
}

/// Session metrics snapshot
#[derive(Debug, Clone)]
pub struct Metrics {
    pub messages_received: u64,
    pub messages_published: u64,
    pub commands_dispatched: u64,
    pub data_dispatched: u64,
    pub messages_discarded: u64,
    pub parse_errors: u64,
    pub connect_attempts: u64,
    pub reconnect_count: u64,
    pub state: SessionState,
}

/// Presigned pub/sub session with command and data routing
///
/// One session owns one logical connection at a time:
/// - A fresh client identity and signed URL for every attempt
/// - Subscribe to `<app>/in/<clientId>`, announce presence on `<app>/out`
/// - Route inbound messages to command handlers or the data handler
/// - On loss, tear down and reconnect after the strategy's delay
///
/// All session logic runs on a single tokio task; this handle only sends
/// control requests and reads state.
pub struct Session {
    /// Atomic session state
    state: Arc<AtomicSessionState>,
    /// Atomic metrics
    metrics: Arc<AtomicMetrics>,
    /// Identity of the live attempt, if any
    client_id: Arc<RwLock<Option<ClientId>>>,
    /// Topic layout
    topics: Topics,
    /// Control channel sender
    command_tx: mpsc::UnboundedSender<SessionCommand>,
    /// Event channel receiver
    event_rx: Receiver<SessionEvent>,
    /// Session task handle
    task_handle: Option<tokio::task::JoinHandle<()>>,
}

impl Session {
    /// Spawn the session task
    ///
    /// Called by the builder's `build()` method. The session stays `Idle`
    /// until [`Session::start`] is called.
    pub(crate) fn new(config: SessionConfig) -> Self {
        let state = Arc::new(AtomicSessionState::new(SessionState::Idle));
        let metrics = Arc::new(AtomicMetrics::new());
        let client_id = Arc::new(RwLock::new(None));
        let topics = config.topics.clone();

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = unbounded();

        let task = SessionTask {
            config,
            state: Arc::clone(&state),
            metrics: Arc::clone(&metrics),
            client_id: Arc::clone(&client_id),
            command_rx,
            event_tx,
            reconnect_attempt: 0,
            connected_at: None,
        };
        let task_handle = tokio::spawn(task.run());

        Self {
            state,
            metrics,
            client_id,
            topics,
            command_tx,
            event_rx,
            task_handle: Some(task_handle),
        }
    }

    /// Start a fresh connection attempt
    ///
    /// Supersedes any live connection: its subscription is released and its
    /// identity discarded before the new attempt begins.
    pub fn start(&self) -> Result<()> {
        self.command_tx
            .send(SessionCommand::Start)
            .map_err(|e| IotSocketError::ChannelSend(e.to_string()))
    }

    /// Publish a payload on the live connection
    ///
    /// Dropped with a warning if the session is not connected when the
    /// request is processed.
    pub fn publish(&self, topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Result<()> {
        self.command_tx
            .send(SessionCommand::Publish {
                topic: topic.into(),
                payload: payload.into(),
            })
            .map_err(|e| IotSocketError::ChannelSend(e.to_string()))
    }

    /// Serialize `value` as JSON and publish it
    pub fn publish_json<T: Serialize>(&self, topic: impl Into<String>, value: &T) -> Result<()> {
        let payload = serde_json::to_vec(value)?;
        self.publish(topic, payload)
    }

    /// Get current session state
    #[inline]
    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    /// Check if connected
    #[inline]
    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// Identity of the live connection attempt
    pub fn client_id(&self) -> Option<String> {
        self.client_id.read().as_ref().map(ClientId::to_string)
    }

    /// This client's inbound topic, while an identity is live
    pub fn inbound_topic(&self) -> Option<String> {
        self.client_id
            .read()
            .as_ref()
            .map(|id| self.topics.inbound(id))
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    /// Get current metrics
    pub fn metrics(&self) -> Metrics {
        Metrics {
            messages_received: self.metrics.messages_received(),
            messages_published: self.metrics.messages_published(),
            commands_dispatched: self.metrics.commands_dispatched(),
            data_dispatched: self.metrics.data_dispatched(),
            messages_discarded: self.metrics.messages_discarded(),
            parse_errors: self.metrics.parse_errors(),
            connect_attempts: self.metrics.connect_attempts(),
            reconnect_count: self.metrics.reconnect_count(),
            state: self.state.get(),
        }
    }

    /// Try to receive an event (non-blocking)
    pub fn try_recv_event(&self) -> Option<SessionEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Receive an event (blocking)
    pub fn recv_event(&self) -> std::result::Result<SessionEvent, crossbeam_channel::RecvError> {
        self.event_rx.recv()
    }

    /// Receive an event, giving up after `timeout` (blocking)
    pub fn recv_event_timeout(&self, timeout: Duration) -> Option<SessionEvent> {
        match self.event_rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// A second handle on the event stream, e.g. for a dedicated thread
    pub fn event_receiver(&self) -> Receiver<SessionEvent> {
        self.event_rx.clone()
    }

    /// Shut the session down
    ///
    /// Tears down the live connection (unsubscribe, disconnect) and waits for
    /// the session task to exit.
    pub async fn shutdown(mut self) -> Result<()> {
        info!("Shutting down session");

        let _ = self.command_tx.send(SessionCommand::Shutdown);

        if let Some(handle) = self.task_handle.take() {
            handle
                .await
                .map_err(|e| IotSocketError::Other(format!("session task failed: {}", e)))?;
        }

        info!("Session shut down");
        Ok(())
    }
}

/// What the task does next
enum Next {
    /// Run a connection attempt
    Attempt,
    /// Wait for the caller to start again
    Idle,
    /// Exit
    Stop,
}

/// Whether the connection survives a dispatched message
enum Flow {
    Continue,
    Restart,
}

/// State owned by the session task
struct SessionTask {
    config: SessionConfig,
    state: Arc<AtomicSessionState>,
    metrics: Arc<AtomicMetrics>,
    client_id: Arc<RwLock<Option<ClientId>>>,
    command_rx: mpsc::UnboundedReceiver<SessionCommand>,
    event_tx: Sender<SessionEvent>,
    /// Reconnect attempts since the last stable connection or explicit start
    reconnect_attempt: usize,
    /// When the live connection was established
    connected_at: Option<Instant>,
}

impl SessionTask {
    async fn run(mut self) {
        let mut next = Next::Idle;

        loop {
            next = match next {
                Next::Idle => self.idle().await,
                Next::Attempt => self.attempt().await,
                Next::Stop => break,
            };
        }

        *self.client_id.write() = None;
        self.state.set(SessionState::Stopped);
        self.emit(SessionEvent::Stopped);
        info!("Session task exiting");
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Wait for a start or shutdown request
    async fn idle(&mut self) -> Next {
        loop {
            match self.command_rx.recv().await {
                Some(SessionCommand::Start) => {
                    self.reconnect_attempt = 0;
                    return Next::Attempt;
                }
                Some(SessionCommand::Publish { topic, .. }) => {
                    warn!("Not connected, dropping publish to {}", topic);
                }
                Some(SessionCommand::Shutdown) | None => return Next::Stop,
            }
        }
    }

    /// Sleep for the strategy's delay, interruptible by start and shutdown
    async fn backoff(&mut self) -> Next {
        let Some(delay) = self.config.reconnect_strategy.next_delay(self.reconnect_attempt) else {
            warn!("Reconnection strategy exhausted, waiting for start");
            return Next::Idle;
        };

        self.reconnect_attempt += 1;
        self.metrics.increment_reconnects();
        info!(
            "Reconnecting in {:?} (attempt {})",
            delay, self.reconnect_attempt
        );
        self.emit(SessionEvent::Reconnecting {
            attempt: self.reconnect_attempt,
            delay,
        });

        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return Next::Attempt,
                cmd = self.command_rx.recv() => match cmd {
                    Some(SessionCommand::Start) => {
                        self.reconnect_attempt = 0;
                        return Next::Attempt;
                    }
                    Some(SessionCommand::Publish { topic, .. }) => {
                        warn!("Not connected, dropping publish to {}", topic);
                    }
                    Some(SessionCommand::Shutdown) | None => return Next::Stop,
                },
            }
        }
    }

    /// One connection attempt: credentials → identity → signed URL → connect
    async fn attempt(&mut self) -> Next {
        self.state.set(SessionState::Connecting);
        self.metrics.increment_connect_attempts();
        self.emit(SessionEvent::Connecting {
            attempt: self.reconnect_attempt,
        });

        let provider = Arc::clone(&self.config.credentials);
        let acquired = match self.or_control(async move { provider.credentials().await }).await {
            Ok(acquired) => acquired,
            Err(next) => return next,
        };

        let credentials = match acquired {
            Ok(credentials) if credentials.is_complete() => credentials,
            Ok(_) => {
                error!("Credential source returned an incomplete credential triple");
                self.emit(SessionEvent::CredentialsFailed(
                    "incomplete credentials".to_string(),
                ));
                return Next::Idle;
            }
            Err(e) => {
                error!("Failed to acquire credentials: {}", e);
                self.emit(SessionEvent::CredentialsFailed(e.to_string()));
                return Next::Idle;
            }
        };

        let client_id = ClientId::random();
        info!("clientId: {}", client_id);

        let url = sign(
            &self.config.host,
            &self.config.region,
            &credentials,
            self.config.clock.now(),
        );
        drop(credentials);
        debug!(host = %url.host(), date = %url.timestamp(), "Signed connection URL");

        let request = ConnectRequest {
            url: url.into_string(),
            client_id: client_id.to_string(),
            keep_alive: self.config.keep_alive,
            connect_timeout: self.config.connect_timeout,
        };

        let transport = Arc::clone(&self.config.transport);
        let connected = match self.or_control(async move { transport.connect(request).await }).await {
            Ok(connected) => connected,
            Err(next) => return next,
        };

        match connected {
            Ok(connection) => self.connected(connection, client_id).await,
            Err(e) => {
                error!("Failed to connect: {}", e);
                self.emit(SessionEvent::ConnectFailed(e.to_string()));
                if self.config.retry_failed_connects {
                    self.backoff().await
                } else {
                    Next::Idle
                }
            }
        }
    }

    /// Steady state of one live connection
    async fn connected(&mut self, mut conn: Box<dyn Connection>, client_id: ClientId) -> Next {
        let inbound = self.config.topics.inbound(&client_id);
        let outbound = self.config.topics.outbound();

        *self.client_id.write() = Some(client_id.clone());
        self.state.set(SessionState::Connected);
        self.connected_at = Some(Instant::now());
        info!("Connected as {}", client_id);

        if let Err(e) = conn.subscribe(&inbound).await {
            error!("Failed to subscribe to {}: {}", inbound, e);
            return self.lost(conn, &inbound, e.to_string()).await;
        }
        debug!("Subscribed to {}", inbound);

        match serde_json::to_vec(&self.config.presence) {
            Ok(presence) => {
                if let Err(e) = conn.publish(&outbound, presence).await {
                    error!("Failed to announce presence on {}: {}", outbound, e);
                    return self.lost(conn, &inbound, e.to_string()).await;
                }
                self.metrics.increment_published();
            }
            Err(e) => error!("Failed to encode presence: {}", e),
        }

        self.emit(SessionEvent::Connected {
            client_id: client_id.to_string(),
        });

        let router = TopicRouter::new(inbound.clone(), self.config.data_handler.is_some());

        loop {
            tokio::select! {
                event = conn.next_event() => match event {
                    TransportEvent::Message(message) => {
                        if let Flow::Restart = self.dispatch(&router, conn.as_mut(), &client_id, message).await {
                            self.teardown(conn.as_mut(), &inbound).await;
                            return Next::Attempt;
                        }
                    }
                    TransportEvent::Lost(reason) => {
                        return self.lost(conn, &inbound, reason).await;
                    }
                },
                cmd = self.command_rx.recv() => match cmd {
                    Some(SessionCommand::Start) => {
                        info!("Restart requested, releasing {}", inbound);
                        self.teardown(conn.as_mut(), &inbound).await;
                        self.reconnect_attempt = 0;
                        return Next::Attempt;
                    }
                    Some(SessionCommand::Publish { topic, payload }) => {
                        match conn.publish(&topic, payload).await {
                            Ok(()) => self.metrics.increment_published(),
                            Err(e) => warn!("Publish to {} failed: {}", topic, e),
                        }
                    }
                    Some(SessionCommand::Shutdown) | None => {
                        self.teardown(conn.as_mut(), &inbound).await;
                        return Next::Stop;
                    }
                },
            }
        }
    }

    /// Handle a loss: mark state, release the old identity, back off
    async fn lost(&mut self, mut conn: Box<dyn Connection>, inbound: &str, reason: String) -> Next {
        self.state.set(SessionState::Lost);
        if reason.is_empty() {
            warn!("Connection lost");
        } else {
            warn!("Connection lost: {}", reason);
        }

        let stable = self
            .connected_at
            .is_some_and(|at| at.elapsed() >= self.config.stable_after);
        if stable {
            self.reconnect_attempt = 0;
        }

        self.teardown(conn.as_mut(), inbound).await;
        self.emit(SessionEvent::Lost(reason));

        self.backoff().await
    }

    /// Release the subscription and identity of the current attempt
    async fn teardown(&mut self, conn: &mut dyn Connection, inbound: &str) {
        if let Err(e) = conn.unsubscribe(inbound).await {
            debug!("Unsubscribe from {} failed: {}", inbound, e);
        }
        if let Err(e) = conn.disconnect().await {
            debug!("Disconnect failed: {}", e);
        }
        *self.client_id.write() = None;
        self.connected_at = None;
    }

    /// Drive `work` while still answering control requests
    ///
    /// Returns `Err(next)` when a start or shutdown arrives first; `work` is
    /// dropped in that case.
    async fn or_control<F>(&mut self, work: F) -> std::result::Result<F::Output, Next>
    where
        F: Future,
    {
        tokio::pin!(work);

        loop {
            tokio::select! {
                output = &mut work => return Ok(output),
                cmd = self.command_rx.recv() => match cmd {
                    Some(SessionCommand::Start) => {
                        info!("Restart requested, abandoning the pending attempt");
                        self.reconnect_attempt = 0;
                        return Err(Next::Attempt);
                    }
                    Some(SessionCommand::Publish { topic, .. }) => {
                        warn!("Not connected, dropping publish to {}", topic);
                    }
                    Some(SessionCommand::Shutdown) | None => return Err(Next::Stop),
                },
            }
        }
    }

    /// Route one inbound message and run its handler
    async fn dispatch(
        &mut self,
        router: &TopicRouter,
        conn: &mut dyn Connection,
        client_id: &ClientId,
        message: InboundMessage,
    ) -> Flow {
        self.metrics.increment_received();
        debug!(
            "onMessageArrived: {} -> {}",
            message.topic,
            message.payload_lossy()
        );

        match router.route(&message) {
            Ok(Route::Command(command)) => {
                let kind = command.command.kind();
                self.metrics.increment_commands();
                self.emit(SessionEvent::CommandReceived(kind));

                let handled = self.config.commands.dispatch(command);

                match kind {
                    CommandKind::Ping => {
                        self.reply_pong(conn, client_id).await;
                        Flow::Continue
                    }
                    CommandKind::Reconnect => {
                        info!("Reconnect requested by operator");
                        Flow::Restart
                    }
                    _ => {
                        if !handled {
                            warn!("No handler configured for command: {:?}", kind);
                        }
                        Flow::Continue
                    }
                }
            }
            Ok(Route::Data(data)) => {
                if let Some(handler) = self.config.data_handler.as_mut() {
                    self.metrics.increment_data();
                    if let Err(e) = handler.on_message_arrived(data) {
                        warn!("Data handler error: {}", e);
                    }
                }
                Flow::Continue
            }
            Ok(Route::Discard) => {
                self.metrics.increment_discarded();
                info!(
                    "ignored: {} -> {}",
                    message.topic,
                    message.payload_lossy()
                );
                Flow::Continue
            }
            Err(e) => {
                self.metrics.increment_parse_errors();
                warn!("Dropping message on {}: {}", message.topic, e);
                Flow::Continue
            }
        }
    }

    async fn reply_pong(&mut self, conn: &mut dyn Connection, client_id: &ClientId) {
        let pong = Pong {
            pong: true,
            client_id: client_id.to_string(),
        };
        let outbound = self.config.topics.outbound();

        let payload = match serde_json::to_vec(&pong) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to encode pong: {}", e);
                return;
            }
        };

        match conn.publish(&outbound, payload).await {
            Ok(()) => self.metrics.increment_published(),
            Err(e) => warn!("Failed to send pong: {}", e),
        }
    }
}
