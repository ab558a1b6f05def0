use crate::error::{AppError, Result};
use crate::ws::protocol::WireProtocol;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable that overrides `server.url` after the file is loaded
pub const URL_OVERRIDE_ENV: &str = "GRIDX_WS_URL";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub trend: TrendConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub url: String,
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default)]
    pub protocol: WireProtocol,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendConfig {
    #[serde(default = "default_trend_capacity")]
    pub capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_report_interval_secs")]
    pub report_interval_secs: u64,
}

fn default_reconnect_delay_secs() -> u64 {
    3
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_trend_capacity() -> usize {
    crate::trend::DEFAULT_CAPACITY
}

fn default_report_interval_secs() -> u64 {
    5
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            capacity: default_trend_capacity(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            report_interval_secs: default_report_interval_secs(),
        }
    }
}

impl ServerConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Config {
    /// Load configuration from a YAML file with environment variable substitution
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text, expanding $(VAR_NAME) placeholders
    pub fn from_yaml(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content)?;

        let mut config: Config = serde_yaml::from_str(&expanded)?;

        if let Ok(url) = std::env::var(URL_OVERRIDE_ENV) {
            config.server.url = url;
        }

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.server.url.is_empty() {
            return Err(AppError::Config("Server url cannot be empty".to_string()));
        }

        if !self.server.url.starts_with("ws://") && !self.server.url.starts_with("wss://") {
            return Err(AppError::Config(format!(
                "Server url must use ws:// or wss://, got: {}",
                self.server.url
            )));
        }

        if self.server.reconnect_delay_secs == 0 {
            return Err(AppError::Config(
                "reconnect_delay_secs must be greater than 0".to_string(),
            ));
        }

        if self.server.connect_timeout_secs == 0 {
            return Err(AppError::Config(
                "connect_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.trend.capacity == 0 {
            return Err(AppError::Config(
                "Trend capacity must be greater than 0".to_string(),
            ));
        }

        if self.display.report_interval_secs == 0 {
            return Err(AppError::Config(
                "report_interval_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Expand environment variables in the format $(VAR_NAME)
fn expand_env_vars(content: &str) -> Result<String> {
    let mut result = content.to_string();

    let re = regex::Regex::new(r"\$\(([A-Z_][A-Z0-9_]*)\)")
        .map_err(|e| AppError::Internal(e.to_string()))?;

    for cap in re.captures_iter(content) {
        let full_match = &cap[0];
        let var_name = &cap[1];

        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(full_match, &value);
        }
    }

    Ok(result)
}
