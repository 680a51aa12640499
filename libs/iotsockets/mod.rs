//! # IoTSockets
//!
//! A presigned MQTT-over-WebSocket session client for managed pub/sub brokers.
//!
//! ## Features
//!
//! - **SigV4 presigning**: connection URLs signed with short-lived credentials,
//!   the secret key never leaves the process
//! - **Session state machine**: connect, subscribe, announce presence, detect
//!   loss and reconnect with a fresh identity
//! - **Two logical channels**: a closed command set addressed to one client
//!   instance and a data channel for chat payloads
//! - **Modular design**: pluggable credentials, transport, clock and
//!   reconnection strategies

pub mod traits;
pub mod core;

// Re-export all traits
pub use traits::*;

// Re-export core session functionality
pub use core::{
    builder, commands, config, connection_state, router, session, signer, topics,
    builder::{states, SessionBuilder},
    commands::{ChatMessage, Command, CommandKind, CommandMessage, DataMessage, Presence},
    config::SessionConfig,
    connection_state::{AtomicMetrics, AtomicSessionState, SessionState},
    router::{CommandTable, Route, TopicRouter},
    session::{Metrics, Session, SessionEvent},
    signer::{sign, SignedUrl, SigningContext},
    topics::{ClientId, Topics},
};

// Convenience function
pub use core::builder as session_builder;

/// Type alias for Result with IotSocketError
pub type Result<T> = std::result::Result<T, traits::IotSocketError>;
