pub mod states;

use crate::config::SessionConfig;
use crate::core::commands::{CommandKind, Presence};
use crate::core::router::CommandTable;
use crate::core::session::Session;
use crate::core::topics::{Topics, DEFAULT_APP_NAME};
use crate::traits::*;
use states::*;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(30);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
const DEFAULT_STABLE_AFTER: Duration = Duration::from_secs(30);

/// Type-state builder for [`Session`]
///
/// The endpoint and the credential source must both be set before
/// `build()` becomes available. Everything else has a default.
pub struct SessionBuilder<E, C>
where
    E: EndpointState,
    C: CredentialsState,
{
    _state: TypeState<E, C>,
    host: Option<String>,
    region: Option<String>,
    credentials: Option<Arc<dyn CredentialProvider>>,
    clock: Option<Arc<dyn Clock>>,
    app_name: String,
    presence: Option<Presence>,
    commands: CommandTable,
    data_handler: Option<Box<dyn DataHandler>>,
    reconnect_strategy: Option<Box<dyn ReconnectionStrategy>>,
    retry_failed_connects: bool,
    keep_alive: Duration,
    connect_timeout: Duration,
    stable_after: Duration,
}

impl SessionBuilder<NoEndpoint, NoCredentials> {
    /// Create a new builder instance
    pub fn new() -> Self {
        Self {
            _state: TypeState::new(),
            host: None,
            region: None,
            credentials: None,
            clock: None,
            app_name: DEFAULT_APP_NAME.to_string(),
            presence: None,
            commands: CommandTable::new(),
            data_handler: None,
            reconnect_strategy: None,
            retry_failed_connects: false,
            keep_alive: DEFAULT_KEEP_ALIVE,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            stable_after: DEFAULT_STABLE_AFTER,
        }
    }
}

impl Default for SessionBuilder<NoEndpoint, NoCredentials> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E, C> SessionBuilder<E, C>
where
    E: EndpointState,
    C: CredentialsState,
{
    fn retype<E2, C2>(self) -> SessionBuilder<E2, C2>
    where
        E2: EndpointState,
        C2: CredentialsState,
    {
        SessionBuilder {
            _state: TypeState::new(),
            host: self.host,
            region: self.region,
            credentials: self.credentials,
            clock: self.clock,
            app_name: self.app_name,
            presence: self.presence,
            commands: self.commands,
            data_handler: self.data_handler,
            reconnect_strategy: self.reconnect_strategy,
            retry_failed_connects: self.retry_failed_connects,
            keep_alive: self.keep_alive,
            connect_timeout: self.connect_timeout,
            stable_after: self.stable_after,
        }
    }

    /// Application name used as the topic prefix (default `chat`)
    pub fn app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }

    /// Presence announced after every successful connect
    ///
    /// Defaults to the machine's `HOSTNAME` and path `/`.
    pub fn presence(mut self, host: impl Into<String>, path: impl Into<String>) -> Self {
        self.presence = Some(Presence::connected(host, path));
        self
    }

    /// Register the handler for one command kind
    ///
    /// `ping` and `reconnect` keep their built-in behavior; a handler
    /// registered for them runs in addition to it.
    pub fn command<H>(mut self, kind: CommandKind, handler: H) -> Self
    where
        H: CommandHandler,
    {
        self.commands.insert(kind, handler);
        self
    }

    /// Register the data handler
    ///
    /// Without one, messages that are not commands are discarded.
    pub fn data_handler(mut self, handler: impl DataHandler) -> Self {
        self.data_handler = Some(Box::new(handler));
        self
    }

    pub fn reconnect_strategy(mut self, strategy: impl ReconnectionStrategy + 'static) -> Self {
        self.reconnect_strategy = Some(Box::new(strategy));
        self
    }

    /// Route failed connects through the reconnection strategy
    ///
    /// Off by default: a refused connection leaves the session in
    /// `Connecting` until `start()` is called again.
    pub fn retry_failed_connects(mut self, retry: bool) -> Self {
        self.retry_failed_connects = retry;
        self
    }

    pub fn keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Minimum lifetime of a connection before its loss resets the backoff
    ///
    /// A connection dropped sooner than this (a broker that accepts and then
    /// rejects the subscription, say) keeps growing the reconnect delay.
    /// Defaults to 30 seconds.
    pub fn stable_after(mut self, duration: Duration) -> Self {
        self.stable_after = duration;
        self
    }

    /// Clock used for signing (defaults to the system clock)
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }
}

// Endpoint setting
impl<C> SessionBuilder<NoEndpoint, C>
where
    C: CredentialsState,
{
    /// Broker host and signing region
    pub fn endpoint(
        mut self,
        host: impl Into<String>,
        region: impl Into<String>,
    ) -> SessionBuilder<HasEndpoint, C> {
        self.host = Some(host.into());
        self.region = Some(region.into());
        self.retype()
    }
}

// Credential source setting
impl<E> SessionBuilder<E, NoCredentials>
where
    E: EndpointState,
{
    pub fn credentials(
        mut self,
        provider: impl CredentialProvider + 'static,
    ) -> SessionBuilder<E, HasCredentials> {
        self.credentials = Some(Arc::new(provider));
        self.retype()
    }
}

// Build method - only available when all required fields are set
impl SessionBuilder<HasEndpoint, HasCredentials> {
    /// Build the session and spawn its task
    ///
    /// The session starts `Idle`; call [`Session::start`] to connect.
    /// Must be called from within a tokio runtime.
    pub async fn build(self, transport: impl Transport + 'static) -> Result<Session> {
        let host = self.host.unwrap_or_default();
        let region = self.region.unwrap_or_default();
        if host.is_empty() {
            return Err(IotSocketError::Configuration("endpoint host is empty".to_string()));
        }
        if region.is_empty() {
            return Err(IotSocketError::Configuration("region is empty".to_string()));
        }
        if self.app_name.is_empty() {
            return Err(IotSocketError::Configuration("app name is empty".to_string()));
        }

        let credentials = self.credentials.ok_or_else(|| {
            IotSocketError::Configuration("credential source must be set".to_string())
        })?;

        let reconnect_strategy = self.reconnect_strategy.unwrap_or_else(|| {
            Box::new(
                ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(60), None)
                    .with_jitter(0.3),
            )
        });

        let presence = self.presence.unwrap_or_else(|| {
            let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
            Presence::connected(hostname, "/")
        });

        let config = SessionConfig {
            host,
            region,
            credentials,
            transport: Arc::new(transport),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            topics: Topics::new(self.app_name),
            presence,
            commands: self.commands,
            data_handler: self.data_handler,
            reconnect_strategy,
            retry_failed_connects: self.retry_failed_connects,
            keep_alive: self.keep_alive,
            connect_timeout: self.connect_timeout,
            stable_after: self.stable_after,
        };

        Ok(Session::new(config))
    }
}
