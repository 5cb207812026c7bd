//! Shared response shapes for the health aggregator (`GET /health`).
//! The aggregation logic itself (pinging the store, enumerating workers)
//! lives with the API handlers, which have the domain context; this module
//! only fixes the wire shape so every caller agrees on field names.

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub memory_usage: f32,
    pub store_connected: bool,
    pub storage_available: bool,
    pub timestamp: DateTime<Utc>,
    pub version: &'static str,
}

impl HealthResponse {
    pub fn new(memory_usage: f32, store_connected: bool, storage_available: bool) -> Self {
        Self {
            status: if store_connected && storage_available {
                "healthy"
            } else {
                "degraded"
            },
            memory_usage,
            store_connected,
            storage_available,
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkerStatusView {
    pub worker_id: String,
    pub status: String,
    pub last_heartbeat: DateTime<Utc>,
    pub active_tasks: u32,
    pub completed_tasks: u32,
    pub failed_tasks: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_healthy_requires_both_checks() {
        assert_eq!(HealthResponse::new(10.0, true, true).status, "healthy");
        assert_eq!(HealthResponse::new(10.0, false, true).status, "degraded");
        assert_eq!(HealthResponse::new(10.0, true, false).status, "degraded");
    }
}
