//! Process configuration loaded from environment variables.

use chrono::Duration;
use secrecy::SecretString;
use std::env;

use crate::domain::ConfigError;

/// Everything the process needs at startup. Loaded once in `main` and
/// handed down by value; no global configuration state.
#[derive(Debug, Clone)]
pub struct Config {
    /// "development" switches logging to human-readable output.
    pub environment: String,
    pub database_url: String,
    pub http_server_address: String,
    pub token_symmetric_key: SecretString,
    pub access_token_duration: Duration,
    pub refresh_token_duration: Duration,
}

impl Config {
    /// Reads configuration from the environment. `DATABASE_URL` and
    /// `TOKEN_SYMMETRIC_KEY` are required; everything else has defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment =
            env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        let database_url = required("DATABASE_URL")?;
        let http_server_address =
            env::var("HTTP_SERVER_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let token_symmetric_key = SecretString::from(required("TOKEN_SYMMETRIC_KEY")?);

        let access_token_duration = parse_minutes(
            env::var("ACCESS_TOKEN_DURATION_MINUTES").ok(),
            "ACCESS_TOKEN_DURATION_MINUTES",
            15,
        )?;
        let refresh_token_duration = parse_minutes(
            env::var("REFRESH_TOKEN_DURATION_MINUTES").ok(),
            "REFRESH_TOKEN_DURATION_MINUTES",
            24 * 60,
        )?;

        Ok(Self {
            environment,
            database_url,
            http_server_address,
            token_symmetric_key,
            access_token_duration,
            refresh_token_duration,
        })
    }
}

fn required(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

fn parse_minutes(
    value: Option<String>,
    key: &str,
    default_minutes: i64,
) -> Result<Duration, ConfigError> {
    match value {
        None => Ok(Duration::minutes(default_minutes)),
        Some(raw) => {
            let minutes: i64 = raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("'{raw}' is not a number of minutes"),
            })?;
            if minutes <= 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: "must be positive".to_string(),
                });
            }
            Ok(Duration::minutes(minutes))
        }
    }
}

// Note: Config::from_env tests are skipped because std::env::set_var and
// remove_var are unsafe in Rust 2024 edition; the parsing helper is tested
// directly instead.
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minutes_default() {
        let d = parse_minutes(None, "X", 15).unwrap();
        assert_eq!(d, Duration::minutes(15));
    }

    #[test]
    fn test_parse_minutes_value() {
        let d = parse_minutes(Some("45".to_string()), "X", 15).unwrap();
        assert_eq!(d, Duration::minutes(45));
    }

    #[test]
    fn test_parse_minutes_rejects_garbage() {
        let err = parse_minutes(Some("soon".to_string()), "X", 15).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_parse_minutes_rejects_non_positive() {
        let err = parse_minutes(Some("0".to_string()), "X", 15).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let err = parse_minutes(Some("-10".to_string()), "X", 15).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
