//! # IoTSockets core
//!
//! Request signing, message routing and the session state machine.
//!
//! ## Example
//!
//! ```rust,ignore
//! use iotsockets::*;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let session = iotsockets::builder()
//!         .endpoint("abc123-ats.iot.us-east-1.amazonaws.com", "us-east-1")
//!         .credentials(StaticCredentials::new(Credentials::new("AK", "SK", None)))
//!         .app_name("chat")
//!         .data_handler(MyRenderer)
//!         .command(CommandKind::Notify, MyNotifier)
//!         .reconnect_strategy(
//!             ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(60), None)
//!                 .with_jitter(0.3),
//!         )
//!         .build(MyTransport)
//!         .await?;
//!
//!     session.start()?;
//!
//!     while let Ok(event) = session.recv_event() {
//!         println!("Event: {:?}", event);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod commands;
pub mod config;
pub mod connection_state;
pub mod router;
pub mod session;
pub mod signer;
pub mod topics;

// Re-export main types
pub use builder::{states, SessionBuilder};
pub use commands::{ChatMessage, Command, CommandKind, CommandMessage, DataMessage, Presence};
pub use config::SessionConfig;
pub use connection_state::{AtomicMetrics, AtomicSessionState, SessionState};
pub use router::{CommandTable, Route, TopicRouter};
pub use session::{Metrics, Session, SessionEvent};
pub use signer::{sign, SignedUrl, SigningContext};
pub use topics::{ClientId, Topics};

// Re-export traits for convenience
pub use crate::traits::*;

/// Create a new session builder
///
/// # Example
/// ```ignore
/// let session = iotsockets::builder()
///     .endpoint("abc123-ats.iot.eu-west-1.amazonaws.com", "eu-west-1")
///     .credentials(provider)
///     .build(transport)
///     .await?;
/// ```
pub fn builder() -> SessionBuilder<builder::states::NoEndpoint, builder::states::NoCredentials> {
    SessionBuilder::new()
}
