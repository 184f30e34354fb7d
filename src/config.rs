use std::{env, time::Duration};
use thiserror::Error;

pub static CACHE_DURATION: Duration = Duration::from_secs(15 * 60); // 15 minutes
pub const RATE_LIMIT: u32 = 10;
pub const RESET_PERIOD: Duration = Duration::from_secs(60);
pub const MAX_ATTEMPTS: u32 = 3;
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub base_url: String,
    pub rate_limit: u32,
    pub cache_ttl: Duration,
    pub fetch_timeout: Duration,
}

impl Config {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };
        let optional_u64 = |name: &'static str, default: u64| match lookup(name) {
            Some(value) => value
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::Invalid { name, value }),
            None => Ok(default),
        };
        let optional_secs = |name: &'static str, default: Duration| {
            match optional_u64(name, default.as_secs())? {
                0 => Err(ConfigError::Invalid {
                    name,
                    value: "0".to_string(),
                }),
                secs => Ok(Duration::from_secs(secs)),
            }
        };

        let rate_limit = optional_u64("RATE_LIMIT", u64::from(RATE_LIMIT))?;
        let rate_limit = u32::try_from(rate_limit).map_err(|_| ConfigError::Invalid {
            name: "RATE_LIMIT",
            value: rate_limit.to_string(),
        })?;

        Ok(Config {
            api_key: required("API_KEY")?,
            base_url: required("BASE_URL")?,
            rate_limit,
            cache_ttl: optional_secs("CACHE_TTL_SECS", CACHE_DURATION)?,
            fetch_timeout: optional_secs("FETCH_TIMEOUT_SECS", FETCH_TIMEOUT)?,
        })
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}/latest?access_key={}",
            self.base_url.trim_end_matches('/'),
            self.api_key
        )
    }
}
