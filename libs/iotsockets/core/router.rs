//! Message Routing
//!
//! Every inbound message is classified before anything runs:
//!
//! ```text
//! InboundMessage → parse JSON ─┬─ own inbound topic + `run` field → Route::Command
//!                              ├─ data handler registered         → Route::Data
//!                              └─ otherwise                       → Route::Discard
//! ```
//!
//! The command check wins even when the payload also carries a `message`.
//! Routing is a pure step; dispatching to handlers happens in the session.

use crate::core::commands::{ChatMessage, Command, CommandKind, CommandMessage, DataMessage};
use crate::traits::{CommandHandler, InboundMessage, IotSocketError, Result};
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

/// Name of the field that marks a command payload
pub const COMMAND_FIELD: &str = "run";
/// Name of the field holding the chat payload
pub const MESSAGE_FIELD: &str = "message";

/// Routing decision for one inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    Command(CommandMessage),
    Data(DataMessage),
    Discard,
}

/// Classifies inbound messages for one connection attempt
///
/// Built per attempt because the inbound topic changes with every new
/// client identity.
#[derive(Debug, Clone)]
pub struct TopicRouter {
    inbound_topic: String,
    data_enabled: bool,
}

impl TopicRouter {
    /// # Arguments
    /// * `inbound_topic` - This client's own `<app>/in/<clientId>` topic
    /// * `data_enabled` - Whether a data handler is registered
    pub fn new(inbound_topic: impl Into<String>, data_enabled: bool) -> Self {
        Self {
            inbound_topic: inbound_topic.into(),
            data_enabled,
        }
    }

    pub fn inbound_topic(&self) -> &str {
        &self.inbound_topic
    }

    /// Classify a message
    ///
    /// # Errors
    /// * `ParseError` - payload is not JSON, or a data payload lacks a valid `message`
    /// * `UnknownCommand` - `run` names something outside the command set
    pub fn route(&self, message: &InboundMessage) -> Result<Route> {
        let payload: Value = serde_json::from_slice(&message.payload)?;

        if message.topic == self.inbound_topic && payload.get(COMMAND_FIELD).is_some() {
            let command: Command = serde_json::from_value(payload.clone()).map_err(|e| {
                IotSocketError::UnknownCommand(format!(
                    "{} ({})",
                    payload.get(COMMAND_FIELD).cloned().unwrap_or(Value::Null),
                    e
                ))
            })?;
            return Ok(Route::Command(CommandMessage { command, payload }));
        }

        if self.data_enabled {
            let nested = payload.get(MESSAGE_FIELD).cloned().ok_or_else(|| {
                IotSocketError::ParseError(format!(
                    "data payload on {} has no `{}` object",
                    message.topic, MESSAGE_FIELD
                ))
            })?;
            let chat: ChatMessage = serde_json::from_value(nested)?;
            return Ok(Route::Data(DataMessage {
                destination_topic: message.topic.clone(),
                message: chat,
            }));
        }

        Ok(Route::Discard)
    }
}

/// Lookup table from command kind to its handler
#[derive(Default)]
pub struct CommandTable {
    handlers: HashMap<CommandKind, Box<dyn CommandHandler>>,
}

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the handler for a command kind
    pub fn insert<H>(&mut self, kind: CommandKind, handler: H)
    where
        H: CommandHandler,
    {
        self.handlers.insert(kind, Box::new(handler));
    }

    pub fn contains(&self, kind: CommandKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run the handler registered for this command
    ///
    /// Returns `false` when no handler is registered. Handler errors are
    /// logged and swallowed.
    pub fn dispatch(&mut self, message: CommandMessage) -> bool {
        let kind = message.command.kind();
        match self.handlers.get_mut(&kind) {
            Some(handler) => {
                if let Err(e) = handler.handle(message) {
                    warn!("Command handler error for {:?}: {}", kind, e);
                }
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for CommandTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandTable")
            .field("kinds", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
