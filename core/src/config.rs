//! Configuration management

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Bot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Connection settings
    pub connection: ConnectionConfig,
    /// Chat session settings
    pub session: SessionConfig,
}

/// Connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Chat server hostname
    pub host: String,
    /// Chat server port
    pub port: u16,
}

/// Chat session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Channel to join (with or without the leading `#`)
    pub channel: String,
    /// Account nickname
    pub nickname: String,
    /// OAuth token for the account
    pub token: String,
    /// Emote tokens to track, in display order
    pub emotes: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig {
                host: "irc.chat.twitch.tv".to_string(),
                port: 6667,
            },
            session: SessionConfig {
                channel: String::new(),
                nickname: String::new(),
                token: String::new(),
                emotes: Vec::new(),
            },
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Write configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.connection.host.is_empty() {
            return Err(Error::Config("server host must not be empty".to_string()));
        }
        if self.session.channel.trim().is_empty() {
            return Err(Error::Config("channel must not be empty".to_string()));
        }
        if self.session.nickname.trim().is_empty() {
            return Err(Error::Config("nickname must not be empty".to_string()));
        }
        if self.session.token.trim().is_empty() {
            return Err(Error::Config("oauth token must not be empty".to_string()));
        }
        if self.session.emotes.is_empty() {
            return Err(Error::Config(
                "at least one emote must be tracked".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for emote in &self.session.emotes {
            if emote.trim().is_empty() {
                return Err(Error::Config("emote tokens must not be empty".to_string()));
            }
            if !seen.insert(emote.as_str()) {
                return Err(Error::Config(format!("duplicate emote token: {}", emote)));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.session.channel = "somechannel".to_string();
        config.session.nickname = "somebot".to_string();
        config.session.token = "oauth:abc123".to_string();
        config.session.emotes = vec!["Kappa".to_string(), "PogChamp".to_string()];
        config
    }

    #[test]
    fn test_default_config_is_incomplete() {
        assert!(Config::default().validate().is_err());
    }

    #[test]
    fn test_valid_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_duplicate_emotes_rejected() {
        let mut config = valid_config();
        config.session.emotes.push("Kappa".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_emote_rejected() {
        let mut config = valid_config();
        config.session.emotes.push("  ".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = valid_config();
        config.to_file(&path).unwrap();
        let loaded = Config::from_file(&path).unwrap();

        assert_eq!(loaded.connection.host, config.connection.host);
        assert_eq!(loaded.connection.port, config.connection.port);
        assert_eq!(loaded.session.channel, config.session.channel);
        assert_eq!(loaded.session.emotes, config.session.emotes);
    }
}
