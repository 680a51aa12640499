//! Topic naming and per-attempt client identity

use rand::Rng;
use std::fmt;

/// Default application prefix for topics
pub const DEFAULT_APP_NAME: &str = "chat";

/// Ephemeral client identifier
///
/// Generated fresh for every connection attempt and never reused, so
/// commands addressed to a previous identity stop being routed here.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientId(String);

impl ClientId {
    /// Random 17-digit decimal identifier
    pub fn random() -> Self {
        let n: u64 = rand::thread_rng().gen_range(10_000_000_000_000_000..100_000_000_000_000_000);
        Self(n.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ClientId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Topic layout shared with the operator side
///
/// - `<app>/in/<clientId>`: commands and data for one client
/// - `<app>/out`: presence and replies from all clients
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    app: String,
}

impl Topics {
    pub fn new(app: impl Into<String>) -> Self {
        Self { app: app.into() }
    }

    pub fn app(&self) -> &str {
        &self.app
    }

    pub fn inbound(&self, client_id: &ClientId) -> String {
        format!("{}/in/{}", self.app, client_id)
    }

    pub fn outbound(&self) -> String {
        format!("{}/out", self.app)
    }
}

impl Default for Topics {
    fn default() -> Self {
        Self::new(DEFAULT_APP_NAME)
    }
}
