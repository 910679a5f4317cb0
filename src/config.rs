//! Configuration management for ReelStream
//!
//! Handles config file loading and environment overrides.
//! Config is stored at ~/.config/reelstream/config.toml

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::consumet::DEFAULT_BASE_URL;
use crate::api::ConsumetClient;
use crate::playback::session::DEFAULT_MAX_RETRIES;
use crate::playback::{PlayerType, RecoveryPolicy};

/// Environment variable overriding the API base URL
pub const BASE_URL_ENV: &str = "REELSTREAM_BASE_URL";

/// Recovery mode as written in the config file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryMode {
    /// Move to the next source on any failure
    #[default]
    Advance,
    /// Retry network failures in place first
    Retry,
}

/// Local player as written in the config file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerChoice {
    #[default]
    Vlc,
    Mpv,
}

impl From<PlayerChoice> for PlayerType {
    fn from(choice: PlayerChoice) -> Self {
        match choice {
            PlayerChoice::Vlc => PlayerType::Vlc,
            PlayerChoice::Mpv => PlayerType::Mpv,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Consumet deployment to talk to
    pub base_url: Option<String>,
    /// Local player used by `play`
    pub player: PlayerChoice,
    /// Source failure handling
    pub recovery: RecoveryMode,
    /// In-place retry cap for `recovery = "retry"`
    pub max_retries: Option<u32>,
    /// Per-request HTTP timeout
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    /// Get config file path (~/.config/reelstream/config.toml)
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("reelstream").join("config.toml"))
    }

    /// Load config from the default location, or defaults if absent
    pub fn load() -> Self {
        Self::path()
            .map(|p| Self::load_from(&p))
            .unwrap_or_default()
    }

    /// Load config from a file; a missing or broken file yields defaults
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(s) => match toml::from_str(&s) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Ignoring invalid config");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Load from an explicit path or the default location
    pub fn load_or_default(path: Option<&Path>) -> Self {
        match path {
            Some(p) => Self::load_from(p),
            None => Self::load(),
        }
    }

    /// API base URL with fallback chain:
    /// 1. Environment variable REELSTREAM_BASE_URL
    /// 2. Config file
    /// 3. Public deployment
    pub fn base_url(&self) -> String {
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            if !url.trim().is_empty() {
                return url;
            }
        }
        self.base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(30))
    }

    pub fn recovery_policy(&self) -> RecoveryPolicy {
        match self.recovery {
            RecoveryMode::Advance => RecoveryPolicy::AdvanceImmediately,
            RecoveryMode::Retry => RecoveryPolicy::RetryInPlace {
                max_retries: self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            },
        }
    }

    /// API client built from this config
    pub fn client(&self) -> ConsumetClient {
        ConsumetClient::with_base_url(self.base_url()).with_timeout(self.request_timeout())
    }
}
