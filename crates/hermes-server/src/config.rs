//! Server configuration loading from file and environment variables.

use hermes_query::{ElasticConfig, Limits};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Search backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Paging limits for the query endpoints.
    #[serde(default)]
    pub api: ApiConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Connection settings for the Elasticsearch cluster holding audit events.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Base URL of the cluster.
    #[serde(default = "default_storage_url")]
    pub url: String,

    /// Basic auth user name, if the cluster requires one.
    #[serde(default)]
    pub username: Option<String>,

    /// Basic auth password.
    #[serde(default)]
    pub password: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// The cluster's `index.max_result_window`.
    #[serde(default = "default_max_result_window")]
    pub max_result_window: usize,
}

/// Paging defaults and bounds.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    #[serde(default = "default_attribute_limit")]
    pub attribute_default_limit: usize,

    #[serde(default = "default_attribute_max_limit")]
    pub attribute_max_limit: usize,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "hermes_query=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    8788
}

fn default_storage_url() -> String {
    "http://localhost:9200".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_result_window() -> usize {
    10_000
}

fn default_limit() -> usize {
    10
}

fn default_attribute_limit() -> usize {
    50
}

fn default_attribute_max_limit() -> usize {
    5_000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            url: default_storage_url(),
            username: None,
            password: None,
            timeout_secs: default_timeout_secs(),
            max_result_window: default_max_result_window(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            attribute_default_limit: default_attribute_limit(),
            attribute_max_limit: default_attribute_max_limit(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl StorageConfig {
    /// Connection settings for [`hermes_query::ElasticBackend`].
    pub fn elastic(&self) -> ElasticConfig {
        ElasticConfig {
            url: self.url.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

impl Config {
    /// Paging limits handed to the query engine.
    pub fn limits(&self) -> Limits {
        Limits {
            max_result_window: self.storage.max_result_window,
            default_limit: self.api.default_limit,
            attribute_default_limit: self.api.attribute_default_limit,
            attribute_max_limit: self.api.attribute_max_limit,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A limit is zero or the defaults exceed their bounds.
    #[error("invalid api limits: {0}")]
    InvalidLimits(String),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `HERMES_HOST` overrides `server.host`
/// - `HERMES_PORT` overrides `server.port`
/// - `HERMES_STORAGE_URL` overrides `storage.url`
/// - `HERMES_STORAGE_USERNAME` overrides `storage.username`
/// - `HERMES_STORAGE_PASSWORD` overrides `storage.password`
/// - `HERMES_LOG_LEVEL` overrides `logging.level`
/// - `HERMES_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed, or
/// if the resulting limits are inconsistent.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate(&config)?;
    Ok(config)
}

fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(host) = var("HERMES_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = var("HERMES_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(url) = var("HERMES_STORAGE_URL") {
        config.storage.url = url;
    }
    if let Some(username) = var("HERMES_STORAGE_USERNAME") {
        config.storage.username = Some(username);
    }
    if let Some(password) = var("HERMES_STORAGE_PASSWORD") {
        config.storage.password = Some(password);
    }
    if let Some(level) = var("HERMES_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("HERMES_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    let api = &config.api;
    if api.default_limit == 0 || api.default_limit > config.storage.max_result_window {
        return Err(ConfigError::InvalidLimits(format!(
            "default_limit must be between 1 and {}",
            config.storage.max_result_window
        )));
    }
    if api.attribute_default_limit == 0 || api.attribute_default_limit > api.attribute_max_limit {
        return Err(ConfigError::InvalidLimits(format!(
            "attribute_default_limit must be between 1 and {}",
            api.attribute_max_limit
        )));
    }
    Ok(())
}
