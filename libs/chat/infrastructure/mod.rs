//! Infrastructure Layer
//!
//! Implementations of the session's external seams (transport, credential
//! sources) plus process setup such as logging.

pub mod credentials;
pub mod logging;
pub mod transport;

pub use credentials::{CognitoCredentials, CredentialError, EnvCredentials};
pub use logging::init_tracing;
pub use transport::RumqttTransport;
