use crate::core::commands::Presence;
use crate::core::router::CommandTable;
use crate::core::topics::Topics;
use crate::traits::*;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for a Session
///
/// Everything the session task needs for its whole lifetime. Built by
/// the type-state builder and owned exclusively by the session task.
pub struct SessionConfig {
    /// Broker endpoint host, e.g. `abc123-ats.iot.us-east-1.amazonaws.com`
    pub(crate) host: String,

    /// Signing region
    pub(crate) region: String,

    /// Source of short-lived credentials, asked once per attempt
    pub(crate) credentials: Arc<dyn CredentialProvider>,

    /// Transport used to open connections
    pub(crate) transport: Arc<dyn Transport>,

    /// Clock used for signing
    pub(crate) clock: Arc<dyn Clock>,

    /// Topic layout
    pub(crate) topics: Topics,

    /// Presence announced on the outbound topic after connecting
    pub(crate) presence: Presence,

    /// Registered command handlers
    pub(crate) commands: CommandTable,

    /// Optional data handler
    pub(crate) data_handler: Option<Box<dyn DataHandler>>,

    /// Reconnection strategy applied after a loss
    pub(crate) reconnect_strategy: Box<dyn ReconnectionStrategy>,

    /// Route failed connects through the reconnection strategy too
    pub(crate) retry_failed_connects: bool,

    /// MQTT keep-alive
    pub(crate) keep_alive: Duration,

    /// Connect timeout handed to the transport
    pub(crate) connect_timeout: Duration,

    /// How long a connection must live before a loss restarts the backoff
    pub(crate) stable_after: Duration,
}
