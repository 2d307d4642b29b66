//! Configuration file management.
//!
//! Settings are resolved in order: command-line flag, environment variable,
//! config file, built-in default.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use auralink_core::TransportMode;
use auralink_core::http::DEFAULT_BASE_URL;
use auralink_core::router::TopicConfig;

/// Path of the push endpoint below the base URL.
const PUSH_PATH: &str = "/ws";

/// Configuration file structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Backend base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Push endpoint, when it does not live at `<url>/ws`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Push channel transport
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<TransportMode>,

    /// Device followed by `watch` when none is given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,

    /// Disable colored output
    #[serde(default)]
    pub no_color: bool,

    /// Broker destination overrides
    #[serde(default)]
    pub topics: TopicOverrides,
}

/// Optional overrides of the broker destinations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopicOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensors: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handshake: Option<String>,
}

impl TopicOverrides {
    pub fn apply(&self) -> TopicConfig {
        let mut topics = TopicConfig::default();
        if let Some(sensors) = &self.sensors {
            topics.sensors = sensors.clone();
        }
        if let Some(status) = &self.status {
            topics.status = status.clone();
        }
        if let Some(handshake) = &self.handshake {
            topics.handshake = handshake.clone();
        }
        topics
    }
}

impl Config {
    /// Get the config file path
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("auralink")
            .join("config.toml")
    }

    /// Load config from file, or return default if not found
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => return config,
                Err(e) => eprintln!("Warning: Failed to parse config: {}", e),
            },
            Err(e) => eprintln!("Warning: Failed to read config: {}", e),
        }
        Self::default()
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }
}

/// Resolve the backend base URL: flag or env var, then config, then default.
pub fn resolve_url(arg: Option<&str>, config: &Config) -> String {
    arg.or(config.url.as_deref())
        .unwrap_or(DEFAULT_BASE_URL)
        .trim_end_matches('/')
        .to_string()
}

/// Resolve the push endpoint for `base_url`.
pub fn resolve_endpoint(base_url: &str, config: &Config) -> String {
    match &config.endpoint {
        Some(endpoint) => endpoint.clone(),
        None => format!("{}{}", base_url.trim_end_matches('/'), PUSH_PATH),
    }
}

pub fn resolve_transport(arg: Option<TransportMode>, config: &Config) -> TransportMode {
    arg.or(config.transport).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_url_precedence() {
        let config = Config {
            url: Some("http://config:8080/".to_string()),
            ..Default::default()
        };
        assert_eq!(resolve_url(Some("http://flag:1"), &config), "http://flag:1");
        assert_eq!(resolve_url(None, &config), "http://config:8080");
        assert_eq!(resolve_url(None, &Config::default()), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_resolve_endpoint() {
        assert_eq!(
            resolve_endpoint("http://host:8080/", &Config::default()),
            "http://host:8080/ws"
        );
        let config = Config {
            endpoint: Some("https://push.example.com/stomp".to_string()),
            ..Default::default()
        };
        assert_eq!(
            resolve_endpoint("http://host:8080", &config),
            "https://push.example.com/stomp"
        );
    }

    #[test]
    fn test_resolve_transport() {
        let config = Config {
            transport: Some(TransportMode::WebSocket),
            ..Default::default()
        };
        assert_eq!(resolve_transport(None, &config), TransportMode::WebSocket);
        assert_eq!(
            resolve_transport(Some(TransportMode::SockJs), &config),
            TransportMode::SockJs
        );
        assert_eq!(resolve_transport(None, &Config::default()), TransportMode::SockJs);
    }

    #[test]
    fn test_topic_overrides() {
        let overrides = TopicOverrides {
            sensors: Some("/topic/readings".to_string()),
            ..Default::default()
        };
        let topics = overrides.apply();
        assert_eq!(topics.sensors, "/topic/readings");
        assert_eq!(topics.status, "/topic/status");
        assert!(topics.validate().is_ok());
    }

    #[test]
    fn test_parse_config_file() {
        let config: Config = toml::from_str(
            r#"
            url = "http://sensors.local:8080"
            transport = "websocket"
            no_color = true

            [topics]
            status = "/topic/device-status"
            "#,
        )
        .unwrap();
        assert_eq!(config.url.as_deref(), Some("http://sensors.local:8080"));
        assert_eq!(config.transport, Some(TransportMode::WebSocket));
        assert!(config.no_color);
        assert_eq!(config.topics.status.as_deref(), Some("/topic/device-status"));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config {
            url: Some("http://example.com".to_string()),
            device: Some("esp32-lab".to_string()),
            ..Default::default()
        };

        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path), config);
    }

    #[test]
    fn test_load_missing_or_invalid_file_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        assert_eq!(Config::load_from(&path), Config::default());

        fs::write(&path, "url = [not toml").unwrap();
        assert_eq!(Config::load_from(&path), Config::default());
    }
}
