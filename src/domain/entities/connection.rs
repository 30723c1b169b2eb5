use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix the relay expects on the credential line.
pub const TOKEN_PREFIX: &str = "oauth:";

/// Operator-supplied credentials, persisted as the `config` document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(rename = "oauth_token", default)]
    pub token: String,
    #[serde(default)]
    pub channel: String,
}

impl ConnectionConfig {
    pub fn new(token: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            channel: channel.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.token.trim().is_empty() && !self.channel.trim().is_empty()
    }

    /// Token with the `oauth:` prefix applied.
    pub fn normalized_token(&self) -> String {
        let token = self.token.trim();
        if token.starts_with(TOKEN_PREFIX) {
            token.to_string()
        } else {
            format!("{}{}", TOKEN_PREFIX, token)
        }
    }

    /// Channel without a leading `#`, lower-cased.
    pub fn normalized_channel(&self) -> String {
        self.channel.trim().trim_start_matches('#').to_lowercase()
    }
}

/// Lifecycle of the relay connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
