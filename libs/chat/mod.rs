//! Chat client application layer
//!
//! Wires the `iotsockets` session to the outside world: YAML configuration,
//! logging, a `rumqttc` WebSocket transport, identity-pool credentials and
//! the handlers that consume chat messages and operator commands.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use application::{session_builder, ChatCredentials};
pub use config::{ChatConfig, ConfigError, CredentialSource};
pub use domain::{ChatLine, ChatRenderer, ChatState, NotifyHandler, SharedChatState, TargetLanguageHandler};
pub use infrastructure::{
    init_tracing, CognitoCredentials, CredentialError, EnvCredentials, RumqttTransport,
};
