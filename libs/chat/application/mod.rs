//! Application Layer
//!
//! Assembles a session from configuration: credential source, handlers,
//! reconnect policy and presence.

use crate::config::{ChatConfig, CredentialSource};
use crate::domain::{ChatRenderer, NotifyHandler, SharedChatState, TargetLanguageHandler};
use crate::infrastructure::{CognitoCredentials, EnvCredentials};
use async_trait::async_trait;
use iotsockets::states::{HasCredentials, HasEndpoint};
use iotsockets::{CommandKind, CredentialProvider, Credentials, SessionBuilder};

/// Credential source selected by configuration
pub enum ChatCredentials {
    Cognito(CognitoCredentials),
    Env(EnvCredentials),
}

impl ChatCredentials {
    pub fn from_config(config: &ChatConfig) -> Self {
        match config.aws.credentials {
            CredentialSource::Cognito => ChatCredentials::Cognito(CognitoCredentials::new(
                &config.aws.region,
                config.aws.identity_pool_id.clone(),
            )),
            CredentialSource::Env => ChatCredentials::Env(EnvCredentials::new()),
        }
    }
}

#[async_trait]
impl CredentialProvider for ChatCredentials {
    async fn credentials(&self) -> iotsockets::Result<Credentials> {
        match self {
            ChatCredentials::Cognito(provider) => provider.credentials().await,
            ChatCredentials::Env(provider) => provider.credentials().await,
        }
    }
}

/// Host announced in presence when none is configured
pub fn default_presence_host() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

/// Session builder wired with the chat handlers
///
/// Registers `ChatRenderer` as the data handler plus the `notify` and
/// `set_target_language` command handlers, all sharing `state`.
pub fn session_builder<P>(
    config: &ChatConfig,
    state: &SharedChatState,
    credentials: P,
) -> SessionBuilder<HasEndpoint, HasCredentials>
where
    P: CredentialProvider + 'static,
{
    let presence_host = config
        .app
        .presence_host
        .clone()
        .unwrap_or_else(default_presence_host);

    iotsockets::builder()
        .endpoint(config.aws.endpoint.clone(), config.aws.region.clone())
        .credentials(credentials)
        .app_name(config.app.name.clone())
        .presence(presence_host, config.app.presence_path.clone())
        .data_handler(ChatRenderer::new(state.clone()))
        .command(CommandKind::Notify, NotifyHandler::new(state.clone()))
        .command(
            CommandKind::SetTargetLanguage,
            TargetLanguageHandler::new(state.clone()),
        )
        .reconnect_strategy(config.reconnect_strategy())
        .retry_failed_connects(config.session.retry_failed_connects)
        .keep_alive(config.keep_alive())
        .connect_timeout(config.connect_timeout())
        .stable_after(config.stable_after())
}
