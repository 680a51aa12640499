use thiserror::Error;

/// Main error type for iotsockets
#[derive(Error, Debug)]
pub enum IotSocketError {
    /// Credential acquisition failed
    #[error("Credential acquisition failed: {0}")]
    Credentials(String),

    /// Transport refused or failed to open the connection
    #[error("Connect failed: {0}")]
    Connect(String),

    /// Subscribe/publish/unsubscribe failure on a live connection
    #[error("Transport error: {0}")]
    Transport(String),

    /// Payload could not be parsed
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Payload named a command outside the known set
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// A registered handler failed
    #[error("Handler error: {0}")]
    Handler(String),

    /// Channel send error
    #[error("Channel send error: {0}")]
    ChannelSend(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Generic error
    #[error("Error: {0}")]
    Other(String),
}

impl From<serde_json::Error> for IotSocketError {
    fn from(e: serde_json::Error) -> Self {
        IotSocketError::ParseError(e.to_string())
    }
}

/// Result type for iotsockets operations
pub type Result<T> = std::result::Result<T, IotSocketError>;
