//! Session handlers for chat data and operator commands

use crate::domain::state::{ChatLine, SharedChatState};
use iotsockets::{Command, CommandHandler, CommandMessage, DataHandler, DataMessage, IotSocketError, Result};
use tracing::{info, warn};

/// Data handler: records chat messages for rendering
///
/// Translation itself happens outside this crate; the renderer only marks
/// which lines need it and which sender terminology applies.
#[derive(Clone)]
pub struct ChatRenderer {
    state: SharedChatState,
}

impl ChatRenderer {
    pub fn new(state: SharedChatState) -> Self {
        Self { state }
    }
}

impl DataHandler for ChatRenderer {
    fn on_message_arrived(&mut self, message: DataMessage) -> Result<()> {
        let DataMessage {
            destination_topic,
            message,
        } = message;

        let mut state = self.state.write();
        let needs_translation = message.source_lang != state.target_language();
        let terminology = (!message.custom_term.is_empty())
            .then(|| format!("{}-{}", message.custom_term, message.source_lang));

        info!(
            topic = %destination_topic,
            lang = %message.source_lang,
            "{}",
            message.text
        );

        state.push_line(ChatLine {
            topic: destination_topic,
            text: message.text,
            source_lang: message.source_lang,
            terminology,
            timestamp: message.timestamp,
            needs_translation,
        });
        Ok(())
    }
}

/// Handles `notify`: keeps the notice and logs it
#[derive(Clone)]
pub struct NotifyHandler {
    state: SharedChatState,
}

impl NotifyHandler {
    pub fn new(state: SharedChatState) -> Self {
        Self { state }
    }
}

impl CommandHandler for NotifyHandler {
    fn handle(&mut self, message: CommandMessage) -> Result<()> {
        let kind = message.command.kind();
        let Command::Notify { text } = message.command else {
            return Err(IotSocketError::Handler(format!("notify handler got {:?}", kind)));
        };

        warn!("Operator notice: {}", text);
        self.state.write().push_notice(text);
        Ok(())
    }
}

/// Handles `set_target_language`
#[derive(Clone)]
pub struct TargetLanguageHandler {
    state: SharedChatState,
}

impl TargetLanguageHandler {
    pub fn new(state: SharedChatState) -> Self {
        Self { state }
    }
}

impl CommandHandler for TargetLanguageHandler {
    fn handle(&mut self, message: CommandMessage) -> Result<()> {
        let kind = message.command.kind();
        let Command::SetTargetLanguage { language } = message.command else {
            return Err(IotSocketError::Handler(format!(
                "target language handler got {:?}",
                kind
            )));
        };

        let language = language.trim();
        if language.is_empty() {
            return Err(IotSocketError::Handler("empty target language".to_string()));
        }

        info!("Target language set to {}", language);
        self.state.write().set_target_language(language);
        Ok(())
    }
}
