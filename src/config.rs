use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Construction parameters for the acquisition engine. Fixed for its lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub port: String,
    pub baud_rate: u32,
    pub read_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            port: "COM5".to_string(),
            baud_rate: 9600,
            read_timeout: Duration::from_secs(1),
        }
    }
}

/// Delays applied by the reader loop between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    /// Wait after a failed connect before the next attempt.
    pub reconnect_delay: Duration,
    /// Wait after a read error before reconnecting.
    pub read_error_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy {
            reconnect_delay: Duration::from_secs(2),
            read_error_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Empty means any origin is allowed.
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub backoff: BackoffPolicy,
    pub server: ServerConfig,
}

impl AppConfig {
    /// Load configuration from the process environment (and `.env` if present)
    ///
    /// | Env Var                  | Default   |
    /// |--------------------------|-----------|
    /// | `SCALE_PORT`             | `COM5`    |
    /// | `SCALE_BAUDRATE`         | `9600`    |
    /// | `SCALE_TIMEOUT`          | `1`       |
    /// | `SCALE_RECONNECT_DELAY`  | `2`       |
    /// | `SCALE_READ_ERROR_DELAY` | `1`       |
    /// | `CORS_ORIGINS`           | `*`       |
    /// | `HOST`                   | `0.0.0.0` |
    /// | `PORT`                   | `8000`    |
    pub fn new() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let engine = EngineConfig {
            port: lookup("SCALE_PORT").unwrap_or_else(|| "COM5".to_string()),
            baud_rate: parse_var(&lookup, "SCALE_BAUDRATE", 9600)?,
            read_timeout: seconds_var(&lookup, "SCALE_TIMEOUT", 1.0)?,
        };

        let backoff = BackoffPolicy {
            reconnect_delay: seconds_var(&lookup, "SCALE_RECONNECT_DELAY", 2.0)?,
            read_error_delay: seconds_var(&lookup, "SCALE_READ_ERROR_DELAY", 1.0)?,
        };

        let server = ServerConfig {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_var(&lookup, "PORT", 8000)?,
            cors_origins: parse_origins(&lookup("CORS_ORIGINS").unwrap_or_else(|| "*".to_string())),
        };

        Ok(AppConfig {
            engine,
            backoff,
            server,
        })
    }
}

/// Split a comma-separated origin list. `*` or an empty list means any origin.
pub fn parse_origins(value: &str) -> Vec<String> {
    let origins: Vec<String> = value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if origins.iter().any(|o| o == "*") {
        return Vec::new();
    }
    origins
}

fn parse_var<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(value) = lookup(var) else {
        return Ok(default);
    };
    match value.trim().parse::<T>() {
        Ok(parsed) => Ok(parsed),
        Err(e) => Err(ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value,
        }),
    }
}

fn seconds_var<F>(lookup: &F, var: &'static str, default: f64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let secs: f64 = parse_var(lookup, var, default)?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(ConfigError::Invalid {
            var,
            value: secs.to_string(),
            reason: "must be a positive number of seconds".to_string(),
        });
    }
    Duration::try_from_secs_f64(secs).map_err(|e| ConfigError::Invalid {
        var,
        value: secs.to_string(),
        reason: e.to_string(),
    })
}
