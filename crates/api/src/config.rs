//! Application configuration loaded from environment variables.

use common::UserId;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Server configuration.
///
/// - `HOST`, `PORT`: bind address (default `0.0.0.0:3000`)
/// - `LOG_LEVEL`: tracing filter when `RUST_LOG` is unset (default `info`)
/// - `LOG_FORMAT`: `pretty` or `json`
/// - `DATABASE_URL`: Postgres store when set, in-memory otherwise
/// - `MAX_COMMIT_ATTEMPTS`: optimistic-concurrency retries per operation
/// - `OPERATION_MEMBERS`, `ADMIN_MEMBERS`: comma-separated user ids that
///   role-targeted notifications fan out to
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub max_commit_attempts: u32,
    pub operation_members: Vec<UserId>,
    pub admin_members: Vec<UserId>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; unset keys fall back
    /// to defaults, malformed ones are errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match get("PORT") {
            Some(value) => parse("PORT", value)?,
            None => defaults.port,
        };
        let max_commit_attempts = match get("MAX_COMMIT_ATTEMPTS") {
            Some(value) => match value.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => return Err(invalid("MAX_COMMIT_ATTEMPTS", value)),
            },
            None => defaults.max_commit_attempts,
        };
        let log_format = match get("LOG_FORMAT").as_deref().map(str::trim) {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => return Err(invalid("LOG_FORMAT", other.to_string())),
        };

        Ok(Self {
            host: get("HOST").unwrap_or(defaults.host),
            port,
            log_level: get("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format,
            database_url: get("DATABASE_URL"),
            max_commit_attempts,
            operation_members: members("OPERATION_MEMBERS", get("OPERATION_MEMBERS"))?,
            admin_members: members("ADMIN_MEMBERS", get("ADMIN_MEMBERS"))?,
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            database_url: None,
            max_commit_attempts: domain::DEFAULT_MAX_ATTEMPTS,
            operation_members: Vec::new(),
            admin_members: Vec::new(),
        }
    }
}

fn invalid(key: &'static str, value: String) -> ConfigError {
    ConfigError::InvalidValue { key, value }
}

fn parse<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| invalid(key, value))
}

fn members(key: &'static str, value: Option<String>) -> Result<Vec<UserId>, ConfigError> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };
    value
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| parse(key, id.to_string()))
        .collect()
}
