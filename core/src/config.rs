//! Configuration management
//!
//! YAML configuration file holding the server endpoint, output location
//! and timing defaults. Command-line flags override file values; a missing
//! file falls back to defaults.

use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Default configuration file name
const CONFIG_FILE_NAME: &str = "heatlink.yaml";

/// Default config directory name
const CONFIG_DIR_NAME: &str = "heatlink";

/// Main configuration structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Server to drive, bare host or full URL
    #[serde(default = "default_server")]
    pub server: String,

    /// Directory frames and the summary record are written to
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Generation window in seconds
    #[serde(default = "default_duration_seconds")]
    pub duration_seconds: u64,

    /// Step between generated frames in seconds
    #[serde(default = "default_step_seconds")]
    pub step_seconds: u64,

    /// Seconds to wait for each inbound stream message
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,

    /// Seconds to wait for the websocket to open
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_server() -> String {
    "localhost:5000".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output/received_frames")
}

fn default_duration_seconds() -> u64 {
    3600
}

fn default_step_seconds() -> u64 {
    10
}

fn default_read_timeout_secs() -> u64 {
    10
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: default_server(),
            output_dir: default_output_dir(),
            duration_seconds: default_duration_seconds(),
            step_seconds: default_step_seconds(),
            read_timeout_secs: default_read_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl Config {
    /// Path of the configuration file, if a config dir exists on this
    /// platform.
    pub fn config_path() -> Option<PathBuf> {
        config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load configuration, falling back to defaults when no file exists.
    pub fn load() -> Result<Self> {
        let Some(path) = Self::config_path() else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_yml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server, "localhost:5000");
        assert_eq!(config.duration_seconds, 3600);
        assert_eq!(config.step_seconds, 10);
        assert_eq!(config.read_timeout_secs, 10);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config: Config =
            serde_yml::from_str("server: heatmaps.example.com\nstep_seconds: 30\n").unwrap();
        assert_eq!(config.server, "heatmaps.example.com");
        assert_eq!(config.step_seconds, 30);
        // untouched fields keep their defaults
        assert_eq!(config.duration_seconds, 3600);
        assert_eq!(config.output_dir, PathBuf::from("output/received_frames"));
    }
}
