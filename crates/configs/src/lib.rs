//! # configs
//!
//! Layered settings for the thread-pulse worker.
//!
//! Precedence, lowest first: built-in defaults, `config/default.toml`,
//! `config/local.toml`, then `PULSE__SECTION__KEY` environment variables.
//! A `.env` file is read into the environment before anything else.
//!
//! Connection strings are `SecretString` so they never reach the logs.

use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub redis: RedisSettings,
    /// Only needed when threads are stored in Postgres.
    #[serde(default)]
    pub database: Option<DatabaseSettings>,
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    #[serde(default)]
    pub log: LogSettings,
}

#[derive(Debug, Deserialize)]
pub struct RedisSettings {
    #[serde(default = "default_redis_url")]
    pub url: SecretString,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            pool_size: default_pool_size(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    pub url: SecretString,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

/// Cadences of the two aggregation runs. The windows themselves are fixed.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSettings {
    /// How often `hot:daily` is rebuilt.
    #[serde(default = "default_daily_every")]
    pub daily_every_secs: u64,
    /// How often `hot:weekly` is rebuilt.
    #[serde(default = "default_weekly_every")]
    pub weekly_every_secs: u64,
    #[serde(default = "default_true")]
    pub run_on_start: bool,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            daily_every_secs: default_daily_every(),
            weekly_every_secs: default_weekly_every(),
            run_on_start: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    /// Filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_redis_url() -> SecretString {
    SecretString::from("redis://127.0.0.1:6379".to_string())
}

fn default_pool_size() -> usize {
    16
}

fn default_max_connections() -> u32 {
    5
}

fn default_daily_every() -> u64 {
    60 * 60
}

fn default_weekly_every() -> u64 {
    24 * 60 * 60
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Settings {
    /// Loads `.env`, the config files under `config/` and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        Self::load_from("config")
    }

    /// Same as [`Settings::load`] without `.env`, reading files from `dir`.
    pub fn load_from(dir: &str) -> Result<Self, ConfigError> {
        let settings: Settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("{dir}/default")).required(false))
            .add_source(config::File::with_name(&format!("{dir}/local")).required(false))
            .add_source(
                config::Environment::with_prefix("PULSE")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.redis.pool_size == 0 {
            return Err(ConfigError::Invalid("redis.pool_size must be positive".into()));
        }
        if self.scheduler.daily_every_secs == 0 || self.scheduler.weekly_every_secs == 0 {
            return Err(ConfigError::Invalid("scheduler intervals must be positive".into()));
        }
        if let Some(db) = &self.database {
            if db.max_connections == 0 {
                return Err(ConfigError::Invalid("database.max_connections must be positive".into()));
            }
        }
        Ok(())
    }
}
