//! Layered configuration: optional file, then `DROWSY__*` environment overrides

use alerting::AlertConfig;
use config::{Config, ConfigError, Environment, File};
use dms::DmsConfig;
use serde::{Deserialize, Serialize};

/// Looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "drowsy-monitor";

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub bind_addr: String,
    /// Quality of annotated frames sent back to clients
    pub jpeg_quality: u8,
    /// Emit logs as JSON lines
    pub log_json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            jpeg_quality: 85,
            log_json: false,
        }
    }
}

/// Complete application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerConfig,
    pub dms: DmsConfig,
    pub alert: AlertConfig,
}

impl Settings {
    /// Load settings from `path` (required) or the default file (optional),
    /// then apply environment overrides such as `DROWSY__DMS__SAMPLE_INTERVAL=5`
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::with_name(path),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("DROWSY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
