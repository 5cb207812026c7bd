use std::path::Path;

use sysinfo::{Disks, System};

/// Host resource checks backing the health aggregator and the worker's
/// memory-pressure gate.
pub trait SystemMetrics: Send + Sync {
    fn memory_usage_percent(&self) -> f32;
    fn storage_available(&self, path: &Path) -> bool;
}

pub struct SysinfoMetrics;

impl SystemMetrics for SysinfoMetrics {
    fn memory_usage_percent(&self) -> f32 {
        let mut system = System::new();
        system.refresh_memory();
        let total = system.total_memory();
        if total == 0 {
            return 0.0;
        }
        (system.used_memory() as f64 / total as f64 * 100.0) as f32
    }

    fn storage_available(&self, path: &Path) -> bool {
        let disks = Disks::new_with_refreshed_list();
        disks
            .iter()
            .filter(|disk| path.starts_with(disk.mount_point()))
            .max_by_key(|disk| disk.mount_point().as_os_str().len())
            .map(|disk| disk.available_space() > 0)
            .unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_usage_percent_is_bounded() {
        let usage = SysinfoMetrics.memory_usage_percent();
        assert!((0.0..=100.0).contains(&usage));
    }
}
