use crate::{env_or_default, ConfigError, FromEnv};

/// Connection settings for the key-value + stream store (`STORE_*`).
#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub db: i64,
    pub password: Option<String>,
}

impl StoreConfig {
    /// Build a `redis://` connection URL from the discrete fields.
    pub fn url(&self) -> String {
        match &self.password {
            Some(password) if !password.is_empty() => {
                format!(
                    "redis://:{password}@{host}:{port}/{db}",
                    password = password,
                    host = self.host,
                    port = self.port,
                    db = self.db
                )
            }
            _ => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }
}

impl FromEnv for StoreConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let host = env_or_default("STORE_HOST", "127.0.0.1");
        let port = env_or_default("STORE_PORT", "6379")
            .parse()
            .map_err(|e| ConfigError::ParseError {
                key: "STORE_PORT".to_string(),
                details: format!("{}", e),
            })?;
        let db = env_or_default("STORE_DB", "0")
            .parse()
            .map_err(|e| ConfigError::ParseError {
                key: "STORE_DB".to_string(),
                details: format!("{}", e),
            })?;
        let password = std::env::var("STORE_PASSWORD").ok();

        Ok(Self {
            host,
            port,
            db,
            password,
        })
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            db: 0,
            password: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_url_has_no_credentials() {
        let config = StoreConfig::default();
        assert_eq!(config.url(), "redis://127.0.0.1:6379/0");
    }

    #[test]
    fn test_url_with_password() {
        let config = StoreConfig {
            host: "store.internal".to_string(),
            port: 6380,
            db: 2,
            password: Some("s3cret".to_string()),
        };
        assert_eq!(config.url(), "redis://:s3cret@store.internal:6380/2");
    }

    #[test]
    fn test_from_env_overrides() {
        temp_env::with_vars(
            [
                ("STORE_HOST", Some("redis-0")),
                ("STORE_PORT", Some("6390")),
                ("STORE_DB", Some("3")),
            ],
            || {
                let config = StoreConfig::from_env().unwrap();
                assert_eq!(config.host, "redis-0");
                assert_eq!(config.port, 6390);
                assert_eq!(config.db, 3);
            },
        );
    }
}
