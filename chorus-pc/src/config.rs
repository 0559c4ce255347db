//! Configuration for the chorus-pc playback coordinator
//!
//! A single TOML file covers bootstrap concerns: listen port, collaborator
//! endpoints and logging. Every field has a built-in default so an empty
//! file (or none at all) yields a working local configuration.
//!
//! Settings priority:
//! 1. Command-line arguments (--port, --config)
//! 2. Environment variables (CHORUS_PC_PORT, CHORUS_PC_CONFIG)
//! 3. TOML configuration file
//! 4. Built-in defaults

use crate::error::Result;
use chorus_common::Error as CommonError;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Bootstrap configuration loaded from TOML
///
/// These settings cannot change during runtime; restart to pick up edits.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Audio node collaborator
    #[serde(default)]
    pub node: NodeConfig,

    /// Membership directory collaborator
    #[serde(default)]
    pub membership: MembershipConfig,

    /// Period of the coalesced session-refresh task, in seconds
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// Event bus buffer size per subscriber
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Audio node endpoint settings
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// Base URL of the audio node REST API
    #[serde(default = "default_node_url")]
    pub base_url: String,

    /// Shared secret sent in the Authorization header
    #[serde(default)]
    pub password: Option<String>,

    /// Retries (beyond the first attempt) for node commands
    #[serde(default = "default_retry_limit")]
    pub retry_limit: usize,
}

/// Membership directory endpoint settings
#[derive(Debug, Clone, Deserialize)]
pub struct MembershipConfig {
    /// Base URL of the membership directory REST API
    #[serde(default = "default_membership_url")]
    pub base_url: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_port() -> u16 {
    5750
}

fn default_refresh_interval_secs() -> u64 {
    10
}

fn default_event_capacity() -> usize {
    100
}

fn default_node_url() -> String {
    "http://127.0.0.1:2333".to_string()
}

fn default_membership_url() -> String {
    "http://127.0.0.1:5760".to_string()
}

fn default_retry_limit() -> usize {
    2
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TomlConfig {
    fn default() -> Self {
        toml::from_str("").expect("empty config parses to defaults")
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            base_url: default_node_url(),
            password: None,
            retry_limit: default_retry_limit(),
        }
    }
}

impl Default for MembershipConfig {
    fn default() -> Self {
        Self {
            base_url: default_membership_url(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl TomlConfig {
    /// Load the configuration from a TOML file
    pub async fn load(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            CommonError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        let config: TomlConfig = toml::from_str(&text)
            .map_err(|e| CommonError::Config(format!("Failed to parse TOML: {}", e)))?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: TomlConfig = toml::from_str("").unwrap();
        assert_eq!(config.port, 5750);
        assert_eq!(config.node.retry_limit, 2);
        assert_eq!(config.refresh_interval_secs, 10);
        assert_eq!(config.logging.level, "info");
        assert!(config.node.password.is_none());
    }

    #[test]
    fn test_full_config_parses() {
        let text = r#"
            port = 8080
            refresh_interval_secs = 5

            [node]
            base_url = "http://node:9000"
            password = "secret"
            retry_limit = 4

            [membership]
            base_url = "http://members:9001"

            [logging]
            level = "debug"
        "#;
        let config: TomlConfig = toml::from_str(text).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.node.base_url, "http://node:9000");
        assert_eq!(config.node.password.as_deref(), Some("secret"));
        assert_eq!(config.node.retry_limit, 4);
        assert_eq!(config.membership.base_url, "http://members:9001");
        assert_eq!(config.refresh_interval(), Duration::from_secs(5));
        assert_eq!(config.logging.level, "debug");
    }
}
