use chrono::{DateTime, Utc};
use iotsockets::commands::MessageTimestamp;
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;

/// Chat state shared between the handlers and the rest of the app
pub type SharedChatState = Arc<RwLock<ChatState>>;

/// One received chat message, ready for rendering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLine {
    pub topic: String,
    pub text: String,
    pub source_lang: String,
    /// Sender's terminology name, `<custom_term>-<source_lang>`
    pub terminology: Option<String>,
    pub timestamp: MessageTimestamp,
    /// Source and target language differ
    pub needs_translation: bool,
}

/// An operator notice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub text: String,
    pub received_at: DateTime<Utc>,
}

/// Rendering state: language preference plus bounded histories
#[derive(Debug, Clone)]
pub struct ChatState {
    target_language: String,
    capacity: usize,
    history: VecDeque<ChatLine>,
    notices: VecDeque<Notice>,
}

impl ChatState {
    pub fn new(target_language: impl Into<String>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            target_language: target_language.into(),
            capacity,
            history: VecDeque::with_capacity(capacity),
            notices: VecDeque::new(),
        }
    }

    pub fn shared(target_language: impl Into<String>, capacity: usize) -> SharedChatState {
        Arc::new(RwLock::new(Self::new(target_language, capacity)))
    }

    pub fn target_language(&self) -> &str {
        &self.target_language
    }

    pub fn set_target_language(&mut self, language: impl Into<String>) {
        self.target_language = language.into();
    }

    /// Append a line, evicting the oldest past capacity
    pub fn push_line(&mut self, line: ChatLine) {
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(line);
    }

    pub fn push_notice(&mut self, text: impl Into<String>) {
        if self.notices.len() == self.capacity {
            self.notices.pop_front();
        }
        self.notices.push_back(Notice {
            text: text.into(),
            received_at: Utc::now(),
        });
    }

    pub fn history(&self) -> impl Iterator<Item = &ChatLine> {
        self.history.iter()
    }

    pub fn notices(&self) -> impl Iterator<Item = &Notice> {
        self.notices.iter()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}
