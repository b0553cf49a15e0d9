/// Environment-driven settings for the maintenance binary
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DATABASE_PATH_VAR: &str = "HEIMDALL_DATABASE_PATH";
pub const SWEEP_INTERVAL_VAR: &str = "HEIMDALL_SWEEP_INTERVAL_SECS";
pub const OPERATION_TIMEOUT_VAR: &str = "HEIMDALL_OPERATION_TIMEOUT_MS";
pub const LOG_FORMAT_VAR: &str = "HEIMDALL_LOG_FORMAT";
pub const RUN_ONCE_VAR: &str = "HEIMDALL_RUN_ONCE";

const DEFAULT_DATABASE_PATH: &str = "heimdall.db";
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err("expected text or json".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// SQLite file, or `:memory:`
    pub database_path: PathBuf,
    pub sweep_interval: Duration,
    /// Deadline applied to each sweep
    pub operation_timeout: Option<Duration>,
    pub log_format: LogFormat,
    /// Run a single sweep and exit
    pub run_once: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            operation_timeout: None,
            log_format: LogFormat::Text,
            run_once: false,
        }
    }
}

impl Config {
    /// Load `.env` when present, then read the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is fine; real variables still apply.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source; unset and blank values take defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|value| !value.trim().is_empty());
        let mut config = Config::default();

        if let Some(path) = get(DATABASE_PATH_VAR) {
            config.database_path = PathBuf::from(path.trim());
        }
        if let Some(value) = get(SWEEP_INTERVAL_VAR) {
            let secs: u64 = parse(SWEEP_INTERVAL_VAR, &value)?;
            if secs == 0 {
                return Err(invalid(SWEEP_INTERVAL_VAR, &value, "must be at least 1"));
            }
            config.sweep_interval = Duration::from_secs(secs);
        }
        if let Some(value) = get(OPERATION_TIMEOUT_VAR) {
            let millis: u64 = parse(OPERATION_TIMEOUT_VAR, &value)?;
            if millis == 0 {
                return Err(invalid(OPERATION_TIMEOUT_VAR, &value, "must be at least 1"));
            }
            config.operation_timeout = Some(Duration::from_millis(millis));
        }
        if let Some(value) = get(LOG_FORMAT_VAR) {
            config.log_format = value
                .parse()
                .map_err(|reason: String| invalid(LOG_FORMAT_VAR, &value, &reason))?;
        }
        if let Some(value) = get(RUN_ONCE_VAR) {
            config.run_once = parse_bool(RUN_ONCE_VAR, &value)?;
        }
        Ok(config)
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == ":memory:"
    }
}

fn invalid(var: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| invalid(var, value, &e.to_string()))
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(var, value, "expected a boolean")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.database_path, PathBuf::from("heimdall.db"));
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
        assert!(!config.is_in_memory());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            (DATABASE_PATH_VAR, ":memory:"),
            (SWEEP_INTERVAL_VAR, "5"),
            (OPERATION_TIMEOUT_VAR, "1500"),
            (LOG_FORMAT_VAR, "JSON"),
            (RUN_ONCE_VAR, "yes"),
        ])
        .unwrap();
        assert!(config.is_in_memory());
        assert_eq!(config.sweep_interval, Duration::from_secs(5));
        assert_eq!(config.operation_timeout, Some(Duration::from_millis(1500)));
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(config.run_once);
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let config = load(&[(SWEEP_INTERVAL_VAR, "  "), (LOG_FORMAT_VAR, "")]).unwrap();
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            load(&[(SWEEP_INTERVAL_VAR, "soon")]),
            Err(ConfigError::Invalid { var: SWEEP_INTERVAL_VAR, .. })
        ));
        assert!(load(&[(SWEEP_INTERVAL_VAR, "0")]).is_err());
        assert!(load(&[(OPERATION_TIMEOUT_VAR, "-3")]).is_err());
        assert!(load(&[(LOG_FORMAT_VAR, "xml")]).is_err());
        assert!(load(&[(RUN_ONCE_VAR, "maybe")]).is_err());
    }
}
