//! # IoTSockets Traits
//!
//! Core traits and types for the IoTSockets session client.
//!
//! The session talks to the outside world only through these seams:
//!
//! - **CredentialProvider**: Hand out short-lived signing credentials
//! - **Transport / Connection**: Open and drive a pub/sub connection
//! - **Clock**: Supply the signing instant
//! - **ReconnectionStrategy**: Control reconnection behavior
//! - **CommandHandler / DataHandler**: Consume routed inbound messages
//!
//! ## Example
//!
//! ```rust,ignore
//! use iotsockets::*;
//!
//! struct Renderer;
//!
//! impl DataHandler for Renderer {
//!     fn on_message_arrived(&mut self, message: DataMessage) -> Result<()> {
//!         println!("{}: {}", message.destination_topic, message.message.text);
//!         Ok(())
//!     }
//! }
//! ```

pub mod clock;
pub mod credentials;
pub mod error;
pub mod handler;
pub mod reconnect;
pub mod transport;

// Re-export commonly used types
pub use clock::{Clock, SystemClock};
pub use credentials::{CredentialProvider, Credentials, StaticCredentials};
pub use error::{IotSocketError, Result};
pub use handler::{CommandHandler, DataHandler};
pub use reconnect::{ExponentialBackoff, FixedDelay, NeverReconnect, ReconnectionStrategy};
pub use transport::{ConnectRequest, Connection, InboundMessage, Transport, TransportEvent};
