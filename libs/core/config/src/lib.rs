pub mod engine;
pub mod janitor;
pub mod server;
pub mod store;
pub mod task;
pub mod tracing;
pub mod worker;

use std::env;
use thiserror::Error;

/// Configuration error type
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable '{0}' is required but not set")]
    MissingEnvVar(String),

    #[error("Failed to parse environment variable '{key}': {details}")]
    ParseError { key: String, details: String },
}

/// Application environment (dev = local, prod = full deployment)
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn from_env() -> Self {
        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        if app_env.eq_ignore_ascii_case("production") {
            Environment::Production
        } else {
            Environment::Development
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

/// Trait for configuration that can be loaded from environment variables
pub trait FromEnv: Sized {
    fn from_env() -> Result<Self, ConfigError>;
}

/// Helper to load and parse environment variable with a default value
pub fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Helper to load a required environment variable, or return an error
pub fn env_required(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Parse an env-or-default string into `T`, mapping failures to `ConfigError`.
pub fn env_parsed<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    env_or_default(key, default)
        .parse()
        .map_err(|e| ConfigError::ParseError {
            key: key.to_string(),
            details: format!("{}", e),
        })
}

/// Parse a comma-separated env var into a `Vec<String>`, trimming entries.
pub fn env_list(key: &str, default: &[&str]) -> Vec<String> {
    match env::var(key) {
        Ok(raw) => raw
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Err(_) => default.iter().map(|s| s.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_defaults_to_development() {
        temp_env::with_var_unset("APP_ENV", || {
            let env = Environment::from_env();
            assert_eq!(env, Environment::Development);
        });
    }

    #[test]
    fn test_environment_production_case_insensitive() {
        temp_env::with_var("APP_ENV", Some("PRODUCTION"), || {
            assert_eq!(Environment::from_env(), Environment::Production);
        });
    }

    #[test]
    fn test_env_list_default() {
        temp_env::with_var_unset("SUPPORTED_LANGUAGES", || {
            let langs = env_list("SUPPORTED_LANGUAGES", &["en", "zh"]);
            assert_eq!(langs, vec!["en".to_string(), "zh".to_string()]);
        });
    }

    #[test]
    fn test_env_list_custom() {
        temp_env::with_var("SUPPORTED_LANGUAGES", Some("en, fr ,de"), || {
            let langs = env_list("SUPPORTED_LANGUAGES", &["en"]);
            assert_eq!(langs, vec!["en", "fr", "de"]);
        });
    }

    #[test]
    fn test_env_parsed_default() {
        temp_env::with_var_unset("TASK_RETRY_LIMIT", || {
            let limit: u32 = env_parsed("TASK_RETRY_LIMIT", "3").unwrap();
            assert_eq!(limit, 3);
        });
    }

    #[test]
    fn test_env_parsed_invalid() {
        temp_env::with_var("TASK_RETRY_LIMIT", Some("not_a_number"), || {
            let result: Result<u32, ConfigError> = env_parsed("TASK_RETRY_LIMIT", "3");
            assert!(result.is_err());
        });
    }
}
