//! Application configuration.
//!
//! Settings are read from a TOML file (`$TANYA_CONFIG`, falling back to
//! `<config dir>/tanya/config.toml`), with environment overrides for the
//! backend URL. Missing files yield the defaults; malformed files are errors.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::chat::ChatTiming;
use crate::error::Result;

/// Root configuration for the client.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub backend: BackendSettings,
    #[serde(default)]
    pub chat: ChatSettings,
}

/// Connection settings for the QA backend.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct BackendSettings {
    /// Base URL of the inference backend.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Timing knobs for the conversation state machine.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ChatSettings {
    /// Perceived-latency pause before the pending placeholder appears.
    #[serde(default = "default_composing_delay_ms")]
    pub composing_delay_ms: u64,
    /// Interval between typewriter reveal steps.
    #[serde(default = "default_reveal_tick_ms")]
    pub reveal_tick_ms: u64,
    /// Delay before re-reading history after a successful turn, giving the
    /// backend time to persist it.
    #[serde(default = "default_history_refresh_delay_ms")]
    pub history_refresh_delay_ms: u64,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_composing_delay_ms() -> u64 {
    500
}

fn default_reveal_tick_ms() -> u64 {
    5
}

fn default_history_refresh_delay_ms() -> u64 {
    1500
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            composing_delay_ms: default_composing_delay_ms(),
            reveal_tick_ms: default_reveal_tick_ms(),
            history_refresh_delay_ms: default_history_refresh_delay_ms(),
        }
    }
}

impl BackendSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ChatSettings {
    /// Converts the millisecond knobs into the durations the conversation
    /// state machine works with.
    pub fn timing(&self) -> ChatTiming {
        ChatTiming {
            composing_delay: Duration::from_millis(self.composing_delay_ms),
            reveal_tick: Duration::from_millis(self.reveal_tick_ms),
            history_refresh_delay: Duration::from_millis(self.history_refresh_delay_ms),
        }
    }
}

impl AppConfig {
    /// Loads configuration from the default location.
    ///
    /// Priority: `$TANYA_CONFIG` path, then `<config dir>/tanya/config.toml`,
    /// then built-in defaults. `$TANYA_API_URL` overrides the backend URL.
    pub fn load() -> Result<Self> {
        let mut config = match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path)?,
            _ => Self::default(),
        };

        if let Ok(url) = std::env::var("TANYA_API_URL")
            && !url.is_empty()
        {
            config.backend.base_url = url;
        }

        Ok(config)
    }

    /// Loads configuration from an explicit TOML file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config = toml::from_str(&raw)?;
        Ok(config)
    }

    fn config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("TANYA_CONFIG") {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|dir| dir.join("tanya").join("config.toml"))
    }
}
