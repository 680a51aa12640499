//! Inbound message handlers
//!
//! Routed messages end up in one of two handler kinds:
//!
//! ```text
//! Transport → TopicRouter → Route::Command → CommandTable[kind] → CommandHandler
//!                         → Route::Data    → DataHandler
//!                         → Route::Discard → (logged)
//! ```
//!
//! Handlers run on the session task, one message at a time, in the order
//! the transport delivered them.

use crate::core::commands::{CommandMessage, DataMessage};
use crate::error::Result;

/// Handler for one kind of remote command
///
/// Registered per `CommandKind` through the session builder.
///
/// # Example
///
/// ```ignore
/// struct NotifyHandler;
///
/// impl CommandHandler for NotifyHandler {
///     fn handle(&mut self, message: CommandMessage) -> Result<()> {
///         if let Command::Notify { text } = &message.command {
///             println!("notice: {}", text);
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait CommandHandler: Send + 'static {
    /// Handle a decoded command
    ///
    /// # Errors
    /// If this returns an error, it will be logged and the session carries on.
    fn handle(&mut self, message: CommandMessage) -> Result<()>;
}

/// Handler for data (chat) messages
///
/// At most one is registered per session.
pub trait DataHandler: Send + 'static {
    /// Called for every data message once the session is connected
    fn on_message_arrived(&mut self, message: DataMessage) -> Result<()>;
}

impl<F> CommandHandler for F
where
    F: FnMut(CommandMessage) -> Result<()> + Send + 'static,
{
    fn handle(&mut self, message: CommandMessage) -> Result<()> {
        self(message)
    }
}
