use crate::{env_parsed, ConfigError, FromEnv};

/// Worker runtime tuning (`WORKER_*`).
#[derive(Clone, Debug)]
pub struct WorkerSettings {
    /// Percent memory utilization above which the worker refuses new claims.
    pub memory_limit_percent: f32,
    /// Number of entries claimed per poll loop iteration.
    pub batch_size: usize,
    /// Size of the per-worker thread pool.
    pub max_threads: usize,
    /// Heartbeat cadence, in seconds.
    pub heartbeat_interval_secs: u64,
    /// Idle threshold, in seconds, after which a claim is considered orphaned.
    pub timeout_secs: u64,
}

impl FromEnv for WorkerSettings {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            memory_limit_percent: env_parsed("WORKER_MEMORY_LIMIT", "90")?,
            batch_size: env_parsed("WORKER_BATCH_SIZE", "10")?,
            max_threads: env_parsed("WORKER_MAX_THREADS", "10")?,
            heartbeat_interval_secs: env_parsed("WORKER_HEARTBEAT_INTERVAL", "30")?,
            timeout_secs: env_parsed("WORKER_TIMEOUT", "300")?,
        })
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            memory_limit_percent: 90.0,
            batch_size: 10,
            max_threads: 10,
            heartbeat_interval_secs: 30,
            timeout_secs: 300,
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
                ("WORKER_MEMORY_LIMIT", None::<&str>),
                ("WORKER_BATCH_SIZE", None::<&str>),
                ("WORKER_MAX_THREADS", None::<&str>),
                ("WORKER_HEARTBEAT_INTERVAL", None::<&str>),
                ("WORKER_TIMEOUT", None::<&str>),
            ],
            || {
                let settings = WorkerSettings::from_env().unwrap();
                assert_eq!(settings.max_threads, 10);
                assert_eq!(settings.timeout_secs, 300);
            },
        );
    }
}
