//! Server settings
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! TOML file, then `AIRQ_*` environment variables, then `DATABASE_URL`.

use config::{Config, ConfigError, Environment, File};
use reading_validator::ValidationConfig;
use serde::Deserialize;
use std::path::PathBuf;

use crate::rate_limit::RateLimitConfig;

/// Names the settings file; the extension is optional
pub const CONFIG_PATH_ENV: &str = "AIRQ_CONFIG";
/// Connection string for the readings database
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";
/// Settings file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "air-quality-lab";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://air_quality.db";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

const ENV_PREFIX: &str = "AIRQ";

/// Top-level settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Listen address
    pub bind_addr: String,
    /// SQLite connection string
    pub database_url: String,
    /// Directory served for paths no route matches
    pub static_dir: Option<PathBuf>,
    /// Install the Prometheus recorder and expose /metrics
    pub metrics_enabled: bool,
    pub logging: LoggingConfig,
    pub rate_limit: RateLimitConfig,
    pub validation: ValidationConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            static_dir: None,
            metrics_enabled: true,
            logging: LoggingConfig::default(),
            rate_limit: RateLimitConfig::default(),
            validation: ValidationConfig::default(),
        }
    }
}

/// Log output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Maximum level: trace, debug, info, warn or error
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl Settings {
    /// Load settings from the process environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_env(std::env::vars().collect())
    }

    /// Load settings with `vars` standing in for the process environment
    pub fn load_from_env(vars: config::Map<String, String>) -> Result<Self, ConfigError> {
        let path = vars
            .get(CONFIG_PATH_ENV)
            .cloned()
            .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());
        let database_url = vars.get(DATABASE_URL_ENV).cloned();

        Config::builder()
            .add_source(File::with_name(&path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(Some(vars)),
            )
            .set_override_option("database_url", database_url)?
            .build()?
            .try_deserialize()
    }
}
