//! Front-end configuration loaded from TOML.
//!
//! ```toml
//! settings_path = "/home/me/.config/ezshark/settings.json"
//! close_gate_timeout_ms = 30000
//! default_port = 8081
//! event_buffer = 256
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

/// Overrides the config file location.
pub const CONFIG_ENV: &str = "EZSHARK_CONFIG";

/// Overrides the settings file location.
pub const SETTINGS_ENV: &str = "EZSHARK_SETTINGS";

const APP_DIR: &str = "ezshark";
const CONFIG_FILE: &str = "config.toml";
const SETTINGS_FILE: &str = "settings.json";

/// Default proxy port written to settings on first start.
pub const DEFAULT_PORT: u16 = 8081;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectorConfig {
    /// Durable settings file.
    pub settings_path: PathBuf,
    /// Time one close gate may take before it counts as a denial.
    pub close_gate_timeout_ms: u64,
    pub default_port: u16,
    /// Capacity of the backend push and message bus channels.
    pub event_buffer: usize,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            settings_path: app_dir().join(SETTINGS_FILE),
            close_gate_timeout_ms: 30_000,
            default_port: DEFAULT_PORT,
            event_buffer: 256,
        }
    }
}

impl InspectorConfig {
    /// Default config file location (`<config_dir>/ezshark/config.toml`).
    pub fn default_path() -> PathBuf {
        app_dir().join(CONFIG_FILE)
    }

    /// Loads the config from `EZSHARK_CONFIG` or the default path, then
    /// applies `EZSHARK_SETTINGS`.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(Self::default_path);
        let mut config = Self::load_from(&path)?;
        if let Some(settings) = std::env::var_os(SETTINGS_ENV) {
            config.settings_path = PathBuf::from(settings);
        }
        Ok(config)
    }

    /// Loads from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn close_gate_timeout(&self) -> Duration {
        Duration::from_millis(self.close_gate_timeout_ms)
    }
}

fn app_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}
