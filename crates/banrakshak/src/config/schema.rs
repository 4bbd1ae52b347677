use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Environment variable holding the backend base URL.
pub const API_URL_ENV: &str = "BANRAKSHAK_API_URL";

/// Fallback variable used by the web frontend deployment.
pub const LEGACY_API_URL_ENV: &str = "NEXT_PUBLIC_API_URL";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_max_poll_duration_secs")]
    pub max_poll_duration_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_max_poll_duration_secs() -> u64 {
    600
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_language() -> String {
    "English".to_string()
}

fn default_event_capacity() -> usize {
    100
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_duration_secs: default_max_poll_duration_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            language: default_language(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl ClientConfig {
    /// Builds a config with defaults and the base URL taken from the environment.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Overrides `base_url` from the environment when a non-blank value is set.
    pub fn with_env_overrides(mut self) -> Self {
        let from_env = [API_URL_ENV, LEGACY_API_URL_ENV]
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .find(|value| !value.trim().is_empty());

        if let Some(url) = from_env {
            self.base_url = Some(url);
        }
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Returns the normalized base URL, or `MissingBaseUrl` when unset or blank.
    pub fn require_base_url(&self) -> Result<String, ConfigError> {
        let raw = self
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingBaseUrl)?;

        if !(raw.starts_with("http://") || raw.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl {
                url: raw.to_string(),
                reason: "must start with http:// or https://".to_string(),
            });
        }

        Ok(raw.trim_end_matches('/').to_string())
    }

    pub fn has_base_url(&self) -> bool {
        self.base_url
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_poll_duration(&self) -> Duration {
        Duration::from_secs(self.max_poll_duration_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, None);
        assert_eq!(config.poll_interval(), Duration::from_secs(2));
        assert_eq!(config.max_poll_duration(), Duration::from_secs(600));
        assert_eq!(config.language, "English");
    }

    #[test]
    fn test_require_base_url_missing() {
        let config = ClientConfig::default();
        assert!(matches!(
            config.require_base_url(),
            Err(ConfigError::MissingBaseUrl)
        ));

        let config = ClientConfig::default().with_base_url("   ");
        assert!(matches!(
            config.require_base_url(),
            Err(ConfigError::MissingBaseUrl)
        ));
        assert!(!config.has_base_url());
    }

    #[test]
    fn test_require_base_url_trims_trailing_slash() {
        let config = ClientConfig::default().with_base_url("http://localhost:8000/");
        assert_eq!(config.require_base_url().unwrap(), "http://localhost:8000");
    }

    #[test]
    fn test_require_base_url_rejects_scheme() {
        let config = ClientConfig::default().with_base_url("localhost:8000");
        assert!(matches!(
            config.require_base_url(),
            Err(ConfigError::InvalidBaseUrl { .. })
        ));
    }
}
