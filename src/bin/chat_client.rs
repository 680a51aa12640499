use anyhow::{Context, Result};
use iot_chat_client::bin_common::{load_config_from_env, parse_args, BinaryRunner, ConfigType, RunConfig};
use iot_chat_client::chat::{
    init_tracing, session_builder, ChatConfig, ChatCredentials, ChatState, RumqttTransport,
    SharedChatState,
};
use iot_chat_client::iotsockets::{Session, SessionEvent};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let config_path = load_config_from_env(ConfigType::from_args(&parse_args()));
    let config = ChatConfig::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    init_tracing(&config.log_level);
    info!(
        "Config: endpoint={} region={} app={} credentials={:?}",
        config.aws.endpoint, config.aws.region, config.app.name, config.aws.credentials
    );

    let state = ChatState::shared(config.app.target_language.clone(), config.app.history_size);
    let session = session_builder(&config, &state, ChatCredentials::from_config(&config))
        .build(RumqttTransport::new())
        .await?;

    let mut client = ChatClient {
        run_config: RunConfig::new("IoT Chat Client"),
        session: Some(session),
        state,
        retry_delay: config.credential_retry_delay(),
        retry_at: None,
    };

    client.execute().await
}

struct ChatClient {
    run_config: RunConfig,
    session: Option<Session>,
    state: SharedChatState,
    retry_delay: Duration,
    /// When to call `start()` again after a failed attempt
    retry_at: Option<Instant>,
}

impl ChatClient {
    fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Connecting { attempt } => info!("Connecting (attempt {})", attempt),
            SessionEvent::Connected { client_id } => {
                info!("Connected as {}", client_id);
                self.retry_at = None;
            }
            SessionEvent::CredentialsFailed(reason) => {
                warn!("Credentials unavailable: {}; retrying in {:?}", reason, self.retry_delay);
                self.retry_at = Some(Instant::now() + self.retry_delay);
            }
            SessionEvent::ConnectFailed(reason) => {
                warn!("Connect failed: {}", reason);
                if self.retry_at.is_none() {
                    self.retry_at = Some(Instant::now() + self.retry_delay);
                }
            }
            SessionEvent::Lost(reason) => warn!("Connection lost: {}", reason),
            SessionEvent::Reconnecting { attempt, delay } => {
                // The session drives this retry itself
                self.retry_at = None;
                info!("Reconnecting in {:?} (attempt {})", delay, attempt);
            }
            SessionEvent::CommandReceived(kind) => debug!("Command received: {:?}", kind),
            SessionEvent::Stopped => info!("Session stopped"),
        }
    }

    fn heartbeat(&self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let metrics = session.metrics();
        let state = self.state.read();
        info!(
            "Heartbeat: state={:?} received={} published={} data={} parse_errors={} reconnects={} history={} target={}",
            metrics.state,
            metrics.messages_received,
            metrics.messages_published,
            metrics.data_dispatched,
            metrics.parse_errors,
            metrics.reconnect_count,
            state.len(),
            state.target_language()
        );
    }
}

impl BinaryRunner for ChatClient {
    async fn run(&mut self) -> Result<()> {
        let Some(session) = self.session.as_ref() else {
            return Ok(());
        };
        session.start()?;

        let mut poll = tokio::time::interval(self.run_config.poll_interval);
        let mut heartbeat = tokio::time::interval(self.run_config.heartbeat_interval());
        heartbeat.tick().await;

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                result = &mut ctrl_c => {
                    if let Err(e) = result {
                        error!("Failed to listen for Ctrl+C: {}", e);
                    }
                    info!("Shutdown requested");
                    break;
                }
                _ = heartbeat.tick() => self.heartbeat(),
                _ = poll.tick() => {
                    let events: Vec<_> = match self.session.as_ref() {
                        Some(session) => std::iter::from_fn(|| session.try_recv_event()).collect(),
                        None => break,
                    };
                    for event in events {
                        self.handle_event(event);
                    }

                    if self.retry_at.is_some_and(|at| Instant::now() >= at) {
                        self.retry_at = None;
                        if let Some(session) = self.session.as_ref() {
                            session.start()?;
                        }
                    }
                }
            }
        }

        if let Some(session) = self.session.take() {
            session.shutdown().await?;
        }
        Ok(())
    }

    fn config(&self) -> &RunConfig {
        &self.run_config
    }

    fn stats(&self) -> Option<String> {
        let state = self.state.read();
        Some(format!(
            "Chat lines kept: {}, notices: {}",
            state.len(),
            state.notices().count()
        ))
    }
}
