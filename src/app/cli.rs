use super::config::{
    ClientConfig, DEFAULT_MAX_SIZE, DEFAULT_QUEUE_CAPACITY, DEFAULT_RETRIES, DEFAULT_VERBOSITY,
    ENV_AUTH_TOKEN, ENV_URL,
};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("File error: {0}")]
    FileError(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    ParseError(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Settings for the `o11y-emit` binary.
///
/// Every flag falls back to an environment variable. A TOML file given with
/// `--config` replaces the command line entirely; its durations are in
/// milliseconds.
#[derive(Parser, Debug, Clone, Serialize, Deserialize)]
#[command(author, version, about, long_about = None)]
#[serde(default)]
pub struct Config {
    /// Collector endpoint URL
    #[arg(long, env = ENV_URL, default_value = "")]
    pub url: String,

    /// Bearer token for the collector
    #[arg(long, env = ENV_AUTH_TOKEN, default_value = "", hide_env_values = true)]
    pub auth_token: String,

    /// Identifier attached to every observation (defaults to the program name)
    #[arg(long, env = "O11Y_IDENTIFIER")]
    pub identifier: Option<String>,

    /// Verbosity of each line read from stdin
    #[arg(long, env = "O11Y_LINE_VERBOSITY", default_value_t = 0)]
    pub line_verbosity: u32,

    /// Highest verbosity that is forwarded
    #[arg(long, env = "O11Y_VERBOSITY", default_value_t = DEFAULT_VERBOSITY)]
    pub verbosity: u32,

    /// Flush interval in milliseconds
    #[arg(long, env = "O11Y_INTERVAL_MS", default_value_t = 5000)]
    pub interval_ms: u64,

    /// Buffered bytes that trigger an early flush
    #[arg(long, env = "O11Y_MAX_SIZE", default_value_t = DEFAULT_MAX_SIZE)]
    pub max_size: usize,

    /// Attempts per batch
    #[arg(long, env = "O11Y_RETRIES", default_value_t = DEFAULT_RETRIES)]
    pub retries: u32,

    /// Events that may wait for the dispatcher before sends are shed
    #[arg(long, env = "O11Y_QUEUE_CAPACITY", default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// Skip the connectivity check at startup
    #[arg(long, env = "O11Y_NO_CHECK_CONNECT")]
    pub no_check_connect: bool,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    pub log_format: LogFormat,

    /// Configuration file path (optional)
    #[arg(long = "config", env = "O11Y_CONFIG")]
    #[serde(skip)]
    pub config_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: String::new(),
            auth_token: String::new(),
            identifier: None,
            line_verbosity: 0,
            verbosity: DEFAULT_VERBOSITY,
            interval_ms: 5000,
            max_size: DEFAULT_MAX_SIZE,
            retries: DEFAULT_RETRIES,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            no_check_connect: false,
            log_level: LogLevel::Info,
            log_format: LogFormat::Text,
            config_file: None,
        }
    }
}

impl Config {
    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let config = Config::try_parse_from(args)
            .map_err(|e| ConfigError::InvalidConfig(e.to_string()))?;
        config.resolve()
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the `--config` file when one was given, then validates.
    pub fn resolve(self) -> Result<Self, ConfigError> {
        match &self.config_file {
            Some(path) => {
                let mut loaded = Self::from_file(path)?;
                loaded.config_file = self.config_file;
                Ok(loaded)
            }
            None => {
                self.validate()?;
                Ok(self)
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::InvalidUrl(format!(
                "collector URL is required (--url or {ENV_URL})"
            )));
        }
        Url::parse(&self.url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid URL '{}': {}", self.url, e)))?;

        if self.interval_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "Flush interval must be greater than 0".to_string(),
            ));
        }

        if self.max_size == 0 {
            return Err(ConfigError::InvalidConfig(
                "Max size must be greater than 0".to_string(),
            ));
        }

        if self.retries == 0 {
            return Err(ConfigError::InvalidConfig(
                "Retries must be greater than 0".to_string(),
            ));
        }

        if self.queue_capacity == 0 {
            return Err(ConfigError::InvalidConfig(
                "Queue capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn into_client_config(self) -> ClientConfig {
        let mut config = ClientConfig::new(self.url)
            .with_auth_token(self.auth_token)
            .with_verbosity(self.verbosity)
            .with_interval(Duration::from_millis(self.interval_ms))
            .with_max_size(self.max_size)
            .with_retries(self.retries)
            .with_queue_capacity(self.queue_capacity);

        if let Some(identifier) = self.identifier {
            config = config.with_identifier(identifier);
        }
        if self.no_check_connect {
            config = config.without_check_connect();
        }
        config
    }
}
