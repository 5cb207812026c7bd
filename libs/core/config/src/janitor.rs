use crate::{env_parsed, ConfigError, FromEnv};

/// Periodic garbage-collection cadence (`JANITOR_*`).
#[derive(Clone, Debug)]
pub struct JanitorSettings {
    /// How often the sweep loop runs, in seconds.
    pub interval_secs: u64,
    /// How long a terminal task is kept before its keys are purged, in seconds.
    pub task_retention_secs: u64,
    /// Idle time, in milliseconds, after which a pending consumer entry is
    /// eligible for reclaim.
    pub consumer_idle_threshold_ms: u64,
}

impl FromEnv for JanitorSettings {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            interval_secs: env_parsed("JANITOR_INTERVAL", "3600")?,
            task_retention_secs: env_parsed("JANITOR_TASK_RETENTION", "86400")?,
            consumer_idle_threshold_ms: env_parsed("JANITOR_CONSUMER_IDLE_THRESHOLD", "3600000")?,
        })
    }
}

impl Default for JanitorSettings {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
            task_retention_secs: 86_400,
            consumer_idle_threshold_ms: 3_600_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        temp_env::with_vars(
            [
                ("JANITOR_INTERVAL", None::<&str>),
                ("JANITOR_TASK_RETENTION", None::<&str>),
                ("JANITOR_CONSUMER_IDLE_THRESHOLD", None::<&str>),
            ],
            || {
                let settings = JanitorSettings::from_env().unwrap();
                assert_eq!(settings.interval_secs, 3600);
                assert_eq!(settings.task_retention_secs, 86_400);
            },
        );
    }
}
