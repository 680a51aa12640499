//! Payload types carried over the two logical channels

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Closed set of operations an operator may trigger on one client
///
/// Decoded from the `run` field of a payload on the client's own inbound
/// topic. Anything outside this set is rejected, never evaluated.
///
/// ```json
/// {"run": "notify", "text": "maintenance at 18:00"}
/// {"run": "set_target_language", "language": "de"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "run", rename_all = "snake_case")]
pub enum Command {
    /// Reply with a pong on the outbound topic
    Ping,
    /// Show a notice to the user
    Notify { text: String },
    /// Switch the language chat messages are rendered in
    SetTargetLanguage { language: String },
    /// Tear down and reconnect with a fresh identity
    Reconnect,
}

impl Command {
    /// Lookup key for the command table
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Ping => CommandKind::Ping,
            Command::Notify { .. } => CommandKind::Notify,
            Command::SetTargetLanguage { .. } => CommandKind::SetTargetLanguage,
            Command::Reconnect => CommandKind::Reconnect,
        }
    }
}

/// Discriminant of [`Command`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Ping,
    Notify,
    SetTargetLanguage,
    Reconnect,
}

/// A decoded command plus the payload it came in
#[derive(Debug, Clone, PartialEq)]
pub struct CommandMessage {
    pub command: Command,
    pub payload: Value,
}

/// Message timestamp as the sender put it
///
/// Integral epoch millis decode as `Millis`; any other number (fractional,
/// beyond `i64`) is kept verbatim. `null` or a missing field is `Missing`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum MessageTimestamp {
    Millis(i64),
    Number(serde_json::Number),
    Text(String),
    #[default]
    Missing,
}

/// Chat payload nested under `message`
///
/// Fields this crate does not interpret are kept in `extra` so the data
/// handler sees the whole nested object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub text: String,
    pub source_lang: String,
    #[serde(default)]
    pub custom_term: String,
    #[serde(default)]
    pub timestamp: MessageTimestamp,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// What the data handler receives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataMessage {
    pub destination_topic: String,
    pub message: ChatMessage,
}

/// Announcement published on the outbound topic after connecting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presence {
    pub connected: bool,
    pub host: String,
    pub path: String,
}

impl Presence {
    pub fn connected(host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            connected: true,
            host: host.into(),
            path: path.into(),
        }
    }
}

/// Reply to [`Command::Ping`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pong {
    pub pong: bool,
    pub client_id: String,
}
