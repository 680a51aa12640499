//! IoT Chat Client - Main Library
//!
//! ## Architecture
//!
//! - **bin_common**: Common utilities for binary executables (CLI, runners)
//! - **chat**: Configuration, credentials, transport and handlers (re-exported from workspace)
//! - **iotsockets**: Presigned session library (re-exported from workspace)
//!
//! ## Usage in Binaries
//!
//! ```rust,ignore
//! use iot_chat_client::bin_common::{load_config_from_env, ConfigType};
//! use iot_chat_client::chat::ChatConfig;
//! ```

// Re-export workspace libraries for convenience
pub use chat;
pub use iotsockets;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;
    pub mod runner;

    pub use cli::{load_config_from_env, parse_args, ConfigType};
    pub use runner::{BinaryRunner, RunConfig};
}
