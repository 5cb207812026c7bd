use crate::{env_or_default, ConfigError, FromEnv};
use std::net::Ipv4Addr;

/// Control API bind configuration (`API_HOST` / `API_PORT` / `API_WORKERS`).
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Number of API processes; purely informational here (a single async
    /// runtime handles concurrency), kept for parity with the deployment knob.
    pub workers: usize,
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl FromEnv for ServerConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let host = env_or_default("API_HOST", &Ipv4Addr::UNSPECIFIED.to_string());
        let port = env_or_default("API_PORT", "8080")
            .parse()
            .map_err(|e| ConfigError::ParseError {
                key: "API_PORT".to_string(),
                details: format!("{}", e),
            })?;
        let workers = env_or_default("API_WORKERS", "1")
            .parse()
            .map_err(|e| ConfigError::ParseError {
                key: "API_WORKERS".to_string(),
                details: format!("{}", e),
            })?;

        Ok(Self {
            host,
            port,
            workers,
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Ipv4Addr::UNSPECIFIED.to_string(),
            port: 8080,
            workers: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_defaults() {
        temp_env::with_vars(
            [
                ("API_HOST", None::<&str>),
                ("API_PORT", None::<&str>),
                ("API_WORKERS", None::<&str>),
            ],
            || {
                let config = ServerConfig::from_env().unwrap();
                assert_eq!(config.port, 8080);
                assert_eq!(config.workers, 1);
                assert_eq!(config.address(), "0.0.0.0:8080");
            },
        );
    }

    #[test]
    fn test_server_config_overrides() {
        temp_env::with_vars([("API_PORT", Some("9000")), ("API_HOST", Some("127.0.0.1"))], || {
            let config = ServerConfig::from_env().unwrap();
            assert_eq!(config.address(), "127.0.0.1:9000");
        });
    }
}
