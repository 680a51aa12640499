//! Domain Layer
//!
//! Chat state and the handlers the session dispatches into.

pub mod handlers;
pub mod state;

pub use handlers::{ChatRenderer, NotifyHandler, TargetLanguageHandler};
pub use state::{ChatLine, ChatState, SharedChatState};
