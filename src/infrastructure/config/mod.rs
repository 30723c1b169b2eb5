//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::application::errors::ConfigError;
use crate::infrastructure::adapters::twitch::{protocol, RelayEndpoint};

/// Bot configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub bot: BotConfig,
    pub relay: RelayConfig,
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BotConfig {
    pub name: String,
    /// Directory holding config.json, commands.json and auto_messages.json
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct SchedulerConfig {
    pub poll_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot: BotConfig {
                name: "twitch-chat-bot".to_string(),
                data_dir: PathBuf::from("./data"),
            },
            relay: RelayConfig {
                host: protocol::DEFAULT_HOST.to_string(),
                port: protocol::DEFAULT_PORT,
                connect_timeout_secs: 10,
            },
            scheduler: SchedulerConfig {
                poll_interval_secs: 10,
            },
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Parse(format!("Failed to read config: {}", e)))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.relay.host.trim().is_empty() {
            return Err(ConfigError::MissingField("relay.host".to_string()));
        }
        if self.relay.port == 0 {
            return Err(ConfigError::InvalidValue("relay.port must be non-zero".to_string()));
        }
        if self.scheduler.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "scheduler.poll-interval-secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Defaults overridden by environment variables
    pub fn load_env() -> Self {
        let mut config = Config::default();

        if let Ok(host) = std::env::var("RELAY_HOST") {
            config.relay.host = host;
        }

        if let Some(port) = std::env::var("RELAY_PORT").ok().and_then(|p| p.parse().ok()) {
            config.relay.port = port;
        }

        if let Ok(dir) = std::env::var("BOT_DATA_DIR") {
            config.bot.data_dir = PathBuf::from(dir);
        }

        if let Some(secs) = std::env::var("AUTO_MESSAGE_POLL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|s| *s > 0)
        {
            config.scheduler.poll_interval_secs = secs;
        }

        config
    }

    pub fn relay_endpoint(&self) -> RelayEndpoint {
        RelayEndpoint {
            host: self.relay.host.clone(),
            port: self.relay.port,
            connect_timeout: Duration::from_secs(self.relay.connect_timeout_secs.max(1)),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler.poll_interval_secs)
    }
}
