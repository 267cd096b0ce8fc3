//! On-demand memory report.
//!
//! Bound to a key in the pager. The report goes to the session's debug
//! sink and is never allowed to fail: a provider error is logged and the
//! report is skipped.

mod alloc;
mod process;

pub use alloc::CountingAlloc;
pub use process::ProcessMetrics;

use thiserror::Error;

use crate::logging::LogSink;

/// Errors from a metrics provider.
#[derive(Debug, Error)]
pub enum DiagnosticsError {
    /// The metric could not be read.
    #[error("Metrics unavailable: {reason}")]
    Unavailable {
        /// Reason why.
        reason: String,
    },
}

/// A point-in-time view of process memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemorySnapshot {
    /// Bytes allocated over the life of the process.
    pub total_alloc: u64,
    /// Bytes the OS holds for the process (resident set).
    pub sys: u64,
    /// Bytes currently allocated on the heap.
    pub heap_alloc: u64,
    /// Bytes of address space reserved by the process.
    pub heap_sys: u64,
    /// Concurrently running tasks (or threads outside a runtime).
    pub tasks: usize,
}

/// Source of [`MemorySnapshot`]s. Injected so tests can use fixed numbers.
pub trait MetricsProvider: Send {
    fn snapshot(&mut self) -> Result<MemorySnapshot, DiagnosticsError>;

    /// Ask the allocator to give unused memory back to the OS.
    fn reclaim(&mut self);
}

/// Log a memory report to `sink`, then reclaim.
pub fn system_report(provider: &mut dyn MetricsProvider, sink: &LogSink) {
    match provider.snapshot() {
        Ok(snapshot) => {
            sink.debug("systemReport -->");
            sink.debug(format_args!("Total alloc {}", format_bytes(snapshot.total_alloc)));
            sink.debug(format_args!("Sys {}", format_bytes(snapshot.sys)));
            sink.debug(format_args!("Heap alloc {}", format_bytes(snapshot.heap_alloc)));
            sink.debug(format_args!("Heap sys {}", format_bytes(snapshot.heap_sys)));
            sink.debug(format_args!("Tasks num {}", snapshot.tasks));
            sink.debug("systemReport <--");
        }
        Err(e) => tracing::debug!("System report skipped: {}", e),
    }
    provider.reclaim();
}

/// Human-readable byte size.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [(u64, &str); 4] = [
        (1 << 40, "T"),
        (1 << 30, "G"),
        (1 << 20, "M"),
        (1 << 10, "K"),
    ];
    for (size, unit) in UNITS {
        if bytes >= size {
            let value = bytes as f64 / size as f64;
            let text = format!("{value:.1}");
            let text = text.strip_suffix(".0").unwrap_or(&text);
            return format!("{text}{unit}");
        }
    }
    format!("{bytes}B")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    struct FixedMetrics {
        snapshot: Option<MemorySnapshot>,
        reclaimed: usize,
    }

    impl MetricsProvider for FixedMetrics {
        fn snapshot(&mut self) -> Result<MemorySnapshot, DiagnosticsError> {
            self.snapshot.ok_or(DiagnosticsError::Unavailable {
                reason: "test".to_string(),
            })
        }

        fn reclaim(&mut self) {
            self.reclaimed += 1;
        }
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0B");
        assert_eq!(format_bytes(1023), "1023B");
        assert_eq!(format_bytes(1024), "1K");
        assert_eq!(format_bytes(1536), "1.5K");
        assert_eq!(format_bytes(10 * 1024 * 1024), "10M");
        assert_eq!(format_bytes(3 * (1 << 30) + (1 << 29)), "3.5G");
        assert_eq!(format_bytes(2 << 40), "2T");
    }

    #[test]
    fn test_report_is_bracketed_and_reclaims() {
        let mut metrics = FixedMetrics {
            snapshot: Some(MemorySnapshot {
                total_alloc: 2048,
                sys: 10 * 1024 * 1024,
                heap_alloc: 512,
                heap_sys: 1 << 30,
                tasks: 7,
            }),
            reclaimed: 0,
        };
        let (sink, lines) = LogSink::memory();

        system_report(&mut metrics, &sink);

        assert_eq!(
            *lines.lock().unwrap(),
            vec![
                "systemReport -->",
                "Total alloc 2K",
                "Sys 10M",
                "Heap alloc 512B",
                "Heap sys 1G",
                "Tasks num 7",
                "systemReport <--",
            ]
        );
        assert_eq!(metrics.reclaimed, 1);
    }

    #[test]
    fn test_report_swallows_provider_errors() {
        let mut metrics = FixedMetrics {
            snapshot: None,
            reclaimed: 0,
        };
        let (sink, lines) = LogSink::memory();

        system_report(&mut metrics, &sink);

        assert!(lines.lock().unwrap().is_empty());
        assert_eq!(metrics.reclaimed, 1);
    }

    #[test]
    fn test_process_metrics_reads_current_process() {
        let mut metrics = ProcessMetrics::new();
        let snapshot = metrics.snapshot().unwrap();
        assert!(snapshot.tasks >= 1);
        metrics.reclaim();
    }
}
