//! Metrics for the running process.

use sysinfo::{Pid, ProcessesToUpdate, System};

use crate::diagnostics::{CountingAlloc, DiagnosticsError, MemorySnapshot, MetricsProvider};

/// Reads allocator counters, `sysinfo` process data and tokio task counts.
pub struct ProcessMetrics {
    system: System,
    pid: Option<Pid>,
}

impl ProcessMetrics {
    pub fn new() -> Self {
        Self {
            system: System::new(),
            pid: sysinfo::get_current_pid().ok(),
        }
    }
}

impl Default for ProcessMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsProvider for ProcessMetrics {
    fn snapshot(&mut self) -> Result<MemorySnapshot, DiagnosticsError> {
        let pid = self.pid.ok_or(DiagnosticsError::Unavailable {
            reason: "current pid unknown".to_string(),
        })?;
        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        let process = self
            .system
            .process(pid)
            .ok_or(DiagnosticsError::Unavailable {
                reason: format!("process {pid} not found"),
            })?;

        let threads = process.tasks().map_or(1, |tasks| tasks.len().max(1));
        let tasks = tokio::runtime::Handle::try_current()
            .map(|handle| handle.metrics().num_alive_tasks())
            .unwrap_or(threads);

        Ok(MemorySnapshot {
            total_alloc: CountingAlloc::total_allocated(),
            sys: process.memory(),
            heap_alloc: CountingAlloc::live(),
            heap_sys: process.virtual_memory(),
            tasks,
        })
    }

    fn reclaim(&mut self) {
        #[cfg(all(target_os = "linux", target_env = "gnu"))]
        unsafe {
            libc::malloc_trim(0);
        }
    }
}
