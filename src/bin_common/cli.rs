//! CLI utilities for binaries
//!
//! Resolves the configuration path from the command line, the
//! environment or a default.

use std::path::PathBuf;

/// Type of configuration to load
#[derive(Debug, Clone)]
pub enum ConfigType {
    /// Chat client configuration (chat_config.yaml)
    Chat,
    /// Custom path
    Custom(String),
}

impl ConfigType {
    /// Get the default path for this config type
    pub fn default_path(&self) -> &str {
        match self {
            ConfigType::Chat => "config/chat_config.yaml",
            ConfigType::Custom(path) => path,
        }
    }

    /// Get the environment variable name for this config type
    pub fn env_var_name(&self) -> &str {
        match self {
            ConfigType::Chat => "CHAT_CONFIG_PATH",
            ConfigType::Custom(_) => "CONFIG_PATH",
        }
    }

    /// Pick the config type from command line arguments
    ///
    /// The first argument, if present, is taken as a config path.
    pub fn from_args(args: &[String]) -> Self {
        match args.first() {
            Some(path) => ConfigType::Custom(path.clone()),
            None => ConfigType::Chat,
        }
    }
}

/// Load configuration path from environment or use default
///
/// A [`ConfigType::Custom`] path is used as given.
pub fn load_config_from_env(config_type: ConfigType) -> PathBuf {
    if let ConfigType::Custom(path) = &config_type {
        return PathBuf::from(path);
    }
    std::env::var(config_type.env_var_name())
        .ok()
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| config_type.default_path().to_string())
        .into()
}

/// Parse command line arguments for a binary
///
/// Returns a vector of arguments (excluding the program name)
pub fn parse_args() -> Vec<String> {
    std::env::args().skip(1).collect()
}
