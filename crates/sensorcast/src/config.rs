//! Process-wide configuration.
//!
//! Values are layered: built-in defaults, then the TOML config file, then
//! `SENSORCAST__SECTION__KEY` environment variables. The result is loaded once
//! at startup and shared read-only afterwards.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const APP_NAME: &str = "sensorcast";

/// Legacy variable holding the provider credential.
const API_KEY_ENV: &str = "WEATHER_API_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to determine configuration directory")]
    NoConfigDir,

    #[error("expanding path {path}: {message}")]
    Expand { path: String, message: String },

    #[error("loading configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("serializing default config to TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("writing config file {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub server: ServerConfig,
    pub provider: ProviderConfig,
    pub polling: PollingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Seconds between WebSocket ping frames. 0 disables keepalive.
    pub ping_interval_secs: u64,
    /// Per-connection queue of outbound frames.
    pub outbound_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8765,
            ping_interval_secs: 30,
            outbound_buffer: 64,
        }
    }
}

impl ServerConfig {
    pub fn ping_interval(&self) -> Option<Duration> {
        (self.ping_interval_secs > 0).then(|| Duration::from_secs(self.ping_interval_secs))
    }
}

/// Sensor data provider (WeatherAPI compatible).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://api.weatherapi.com".to_string(),
            api_key: None,
            timeout_secs: 10,
        }
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_secs: u64,
    pub retry: RetryStrategy,
    /// Upper bound for the exponential retry delay.
    pub max_interval_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            retry: RetryStrategy::Fixed,
            max_interval_secs: 300,
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_secs(self.max_interval_secs)
    }
}

/// How a stream waits after a failed fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryStrategy {
    /// Retry forever at the polling interval.
    #[default]
    Fixed,
    /// Double the delay per consecutive failure, capped at `max_interval_secs`.
    Exponential,
}

impl AppConfig {
    /// Load configuration from `path` (optional) and the process environment.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::load_with_env(path, None)
    }

    /// Load configuration using `vars` in place of the process environment.
    pub fn load_with_env(
        path: &Path,
        vars: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let fallback_key = match &vars {
            Some(vars) => vars.get(API_KEY_ENV).cloned(),
            None => env::var(API_KEY_ENV).ok(),
        };

        let built = Config::builder()
            .add_source(
                File::from(path)
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                Environment::with_prefix(&env_prefix())
                    .separator("__")
                    .try_parsing(true)
                    .source(vars),
            )
            .build()?;

        let mut config: AppConfig = built.try_deserialize()?;
        if config.provider.api_key.is_none() {
            config.provider.api_key = fallback_key.filter(|key| !key.is_empty());
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.polling.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "polling.interval_secs must be greater than 0".into(),
            ));
        }
        if self.polling.max_interval_secs < self.polling.interval_secs {
            return Err(ConfigError::Invalid(
                "polling.max_interval_secs must not be below polling.interval_secs".into(),
            ));
        }
        if self.provider.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "provider.timeout_secs must be greater than 0".into(),
            ));
        }
        if self.server.outbound_buffer == 0 {
            return Err(ConfigError::Invalid(
                "server.outbound_buffer must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Write the default configuration to `path`, creating parent directories.
    pub fn write_default(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let toml = toml::to_string_pretty(&AppConfig::default())?;
        let mut body = String::new();
        body.push_str("# Configuration for ");
        body.push_str(APP_NAME);
        body.push('\n');
        body.push_str("# File: ");
        body.push_str(&path.display().to_string());
        body.push_str("\n\n");
        body.push_str(&toml);

        fs::write(path, body).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Resolve the config file, honouring an explicit override.
///
/// A directory override resolves to `config.toml` inside it.
pub fn config_file_path(override_path: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    match override_path {
        Some(path) => {
            let expanded = expand_path(&path)?;
            if expanded.is_dir() {
                Ok(expanded.join("config.toml"))
            } else {
                Ok(expanded)
            }
        }
        None => Ok(default_config_dir()?.join("config.toml")),
    }
}

fn expand_path(path: &Path) -> Result<PathBuf, ConfigError> {
    let Some(text) = path.to_str() else {
        return Ok(path.to_path_buf());
    };
    let expanded = shellexpand::full(text).map_err(|e| ConfigError::Expand {
        path: text.to_string(),
        message: e.to_string(),
    })?;
    Ok(PathBuf::from(expanded.to_string()))
}

fn default_config_dir() -> Result<PathBuf, ConfigError> {
    if let Some(dir) = env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir).join(APP_NAME));
    }

    if let Some(dir) = dirs::config_dir() {
        return Ok(dir.join(APP_NAME));
    }

    dirs::home_dir()
        .map(|home| home.join(".config").join(APP_NAME))
        .ok_or(ConfigError::NoConfigDir)
}

fn env_prefix() -> String {
    APP_NAME
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}
