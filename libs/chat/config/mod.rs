use iotsockets::ExponentialBackoff;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarMissing(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Main chat client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    pub aws: AwsConfig,
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    pub region: String,
    /// IoT data endpoint, e.g. `abc123-ats.iot.us-east-1.amazonaws.com`
    pub endpoint: String,
    #[serde(default)]
    pub identity_pool_id: String,
    #[serde(default)]
    pub credentials: CredentialSource,
}

/// Where signing credentials come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSource {
    /// Unauthenticated identity from a Cognito identity pool
    #[default]
    Cognito,
    /// `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` / `AWS_SESSION_TOKEN`
    Env,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub name: String,
    /// Host announced in presence; defaults to the machine's hostname
    pub presence_host: Option<String>,
    pub presence_path: String,
    pub target_language: String,
    pub history_size: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: iotsockets::topics::DEFAULT_APP_NAME.to_string(),
            presence_host: None,
            presence_path: "/".to_string(),
            target_language: "en".to_string(),
            history_size: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    pub keep_alive_secs: u64,
    pub connect_timeout_secs: u64,
    pub retry_failed_connects: bool,
    /// Delay before the binary asks for credentials again after a failure
    pub credential_retry_secs: u64,
    /// Connection lifetime after which a loss restarts the reconnect backoff
    #[serde(default = "default_stable_after_secs")]
    pub stable_after_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            keep_alive_secs: 30,
            connect_timeout_secs: 3,
            retry_failed_connects: false,
            credential_retry_secs: 5,
            stable_after_secs: default_stable_after_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_attempts: Option<usize>,
    pub jitter: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1_000,
            max_delay_ms: 60_000,
            max_attempts: None,
            jitter: 0.3,
        }
    }
}

fn default_stable_after_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

impl ChatConfig {
    /// Load configuration from YAML file
    ///
    /// Environment overrides are applied before validation.
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let yaml_content = std::fs::read_to_string(config_path)?;
        let mut config = Self::from_yaml_str(&yaml_content)?;

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parse configuration without touching the environment or validating
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Override values from process environment variables
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Override values from any key lookup
    ///
    /// Recognised keys: `AWS_REGION`, `AWS_IOT_ENDPOINT`,
    /// `AWS_IDENTITY_POOL_ID`, `CHAT_APP_NAME`. Empty values are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(region) = get("AWS_REGION") {
            self.aws.region = region;
        }
        if let Some(endpoint) = get("AWS_IOT_ENDPOINT") {
            self.aws.endpoint = endpoint;
        }
        if let Some(pool) = get("AWS_IDENTITY_POOL_ID") {
            self.aws.identity_pool_id = pool;
        }
        if let Some(name) = get("CHAT_APP_NAME") {
            self.app.name = name;
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.aws.region.trim().is_empty() {
            return Err(ConfigError::ValidationError("aws.region must be set".to_string()));
        }

        if self.aws.endpoint.trim().is_empty() {
            return Err(ConfigError::ValidationError("aws.endpoint must be set".to_string()));
        }

        if self.aws.endpoint.contains("://") || self.aws.endpoint.contains('/') {
            return Err(ConfigError::ValidationError(
                "aws.endpoint must be a bare host name".to_string(),
            ));
        }

        if self.aws.credentials == CredentialSource::Cognito
            && self.aws.identity_pool_id.trim().is_empty()
        {
            return Err(ConfigError::EnvVarMissing("AWS_IDENTITY_POOL_ID".to_string()));
        }

        if self.app.name.is_empty() || self.app.name.contains(|c: char| matches!(c, '/' | '+' | '#')) {
            return Err(ConfigError::ValidationError(
                "app.name must be a non-empty topic segment".to_string(),
            ));
        }

        if self.session.keep_alive_secs == 0 {
            return Err(ConfigError::ValidationError(
                "session.keep_alive_secs must be greater than 0".to_string(),
            ));
        }

        if self.session.connect_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "session.connect_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.reconnect.jitter) {
            return Err(ConfigError::ValidationError(
                "reconnect.jitter must be between 0 and 1".to_string(),
            ));
        }

        if self.reconnect.initial_delay_ms > self.reconnect.max_delay_ms {
            return Err(ConfigError::ValidationError(
                "reconnect.initial_delay_ms must not exceed reconnect.max_delay_ms".to_string(),
            ));
        }

        Ok(())
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.session.keep_alive_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.session.connect_timeout_secs)
    }

    pub fn stable_after(&self) -> Duration {
        Duration::from_secs(self.session.stable_after_secs)
    }

    pub fn credential_retry_delay(&self) -> Duration {
        Duration::from_secs(self.session.credential_retry_secs)
    }

    /// Backoff applied by the session after a connection loss
    pub fn reconnect_strategy(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(
            Duration::from_millis(self.reconnect.initial_delay_ms),
            Duration::from_millis(self.reconnect.max_delay_ms),
            self.reconnect.max_attempts,
        )
        .with_jitter(self.reconnect.jitter)
    }
}
