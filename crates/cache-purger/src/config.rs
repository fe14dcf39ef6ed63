//! Configuration loading

use anyhow::{Context, Result, anyhow, bail};
use purger_core::{CachePurgingSettings, PurgerConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    /// Dispatcher, connection and worker settings
    #[serde(default)]
    pub purger: PurgerConfig,
    /// Which proxies receive purges and how paths are rewritten
    #[serde(default)]
    pub purging: CachePurgingSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// `pretty` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8090
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &str) -> Result<Self> {
        let config_path = Path::new(path);

        // Check if config file exists
        if !config_path.exists() {
            info!("Config file not found at {}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;
        config.validate()?;

        info!("Loaded configuration from {}", path);
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.purger.http_verb.trim().is_empty() {
            bail!("purger.http_verb must not be empty");
        }

        self.purger
            .timeout
            .validate()
            .map_err(|e| anyhow!("purger.{}", e))?;

        for proxy in &self.purging.caching_proxies {
            url::Url::parse(proxy)
                .with_context(|| format!("Invalid caching proxy URL: {}", proxy))?;
        }

        match self.logging.format.as_str() {
            "pretty" | "json" => Ok(()),
            other => bail!("Unknown logging format '{}' (expected pretty or json)", other),
        }
    }
}
