use anyhow::Result;
use metrics::{counter, histogram};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Metrics collection and management
///
/// Every event goes to the `metrics` facade (a no-op unless the binary
/// installs a recorder) and is also tallied locally so the CLI and tests can
/// inspect what happened in this process.
#[derive(Debug)]
pub struct MetricsCollector {
    // Database metrics
    pub db_operations_total: &'static str,
    pub db_operation_duration: &'static str,

    // Export / import metrics
    pub export_operations_total: &'static str,
    pub export_duration: &'static str,
    pub export_file_size_bytes: &'static str,
    pub rows_exported_total: &'static str,
    pub rows_imported_total: &'static str,

    // Insight metrics
    pub insight_reads_total: &'static str,

    // Error metrics
    pub errors_total: &'static str,

    tallies: Tallies,
}

#[derive(Debug, Default)]
struct Tallies {
    db_operations: AtomicU64,
    db_failures: AtomicU64,
    exports: AtomicU64,
    rows_exported: AtomicU64,
    rows_imported: AtomicU64,
    insight_reads: AtomicU64,
    errors: AtomicU64,
}

/// Point-in-time copy of the local tallies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub db_operations: u64,
    pub db_failures: u64,
    pub exports: u64,
    pub rows_exported: u64,
    pub rows_imported: u64,
    pub insight_reads: u64,
    pub errors: u64,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self {
            db_operations_total: "semi_atlas_db_operations_total",
            db_operation_duration: "semi_atlas_db_operation_duration_seconds",

            export_operations_total: "semi_atlas_export_operations_total",
            export_duration: "semi_atlas_export_duration_seconds",
            export_file_size_bytes: "semi_atlas_export_file_size_bytes",
            rows_exported_total: "semi_atlas_rows_exported_total",
            rows_imported_total: "semi_atlas_rows_imported_total",

            insight_reads_total: "semi_atlas_insight_reads_total",

            errors_total: "semi_atlas_errors_total",

            tallies: Tallies::default(),
        }
    }
}

fn to_u64(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

impl MetricsCollector {
    /// Initialize metrics collection
    pub fn init() -> Result<()> {
        metrics::set_global_recorder(metrics::NoopRecorder)
            .map_err(|e| anyhow::anyhow!("Failed to initialize metrics recorder: {}", e))?;

        Ok(())
    }

    /// Record database operation metrics
    pub fn record_db_operation(&self, operation: &str, duration: Duration, success: bool) {
        let status = if success { "success" } else { "error" };

        counter!(self.db_operations_total, "operation" => operation.to_string(), "status" => status)
            .increment(1);
        histogram!(self.db_operation_duration, "operation" => operation.to_string())
            .record(duration.as_secs_f64());

        self.tallies.db_operations.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.tallies.db_failures.fetch_add(1, Ordering::Relaxed);
            self.record_error("database", operation);
        }
    }

    /// Record export operation metrics
    pub fn record_export_operation(&self, format: &str, rows: usize, size_bytes: u64, duration: Duration) {
        counter!(self.export_operations_total, "format" => format.to_string()).increment(1);
        counter!(self.rows_exported_total, "format" => format.to_string()).increment(to_u64(rows));
        histogram!(self.export_duration).record(duration.as_secs_f64());
        #[allow(clippy::cast_precision_loss)]
        histogram!(self.export_file_size_bytes).record(size_bytes as f64);

        self.tallies.exports.fetch_add(1, Ordering::Relaxed);
        self.tallies
            .rows_exported
            .fetch_add(to_u64(rows), Ordering::Relaxed);
    }

    /// Record rows bulk-inserted from an import
    pub fn record_import(&self, entity: &str, rows: usize) {
        counter!(self.rows_imported_total, "entity" => entity.to_string()).increment(to_u64(rows));
        self.tallies
            .rows_imported
            .fetch_add(to_u64(rows), Ordering::Relaxed);
    }

    /// Record one read-count increment
    pub fn record_insight_read(&self) {
        counter!(self.insight_reads_total).increment(1);
        self.tallies.insight_reads.fetch_add(1, Ordering::Relaxed);
    }

    /// Record error metrics
    pub fn record_error(&self, error_type: &str, operation: &str) {
        counter!(
            self.errors_total,
            "type" => error_type.to_string(),
            "operation" => operation.to_string()
        )
        .increment(1);
        self.tallies.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy of the local tallies
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            db_operations: self.tallies.db_operations.load(Ordering::Relaxed),
            db_failures: self.tallies.db_failures.load(Ordering::Relaxed),
            exports: self.tallies.exports.load(Ordering::Relaxed),
            rows_exported: self.tallies.rows_exported.load(Ordering::Relaxed),
            rows_imported: self.tallies.rows_imported.load(Ordering::Relaxed),
            insight_reads: self.tallies.insight_reads.load(Ordering::Relaxed),
            errors: self.tallies.errors.load(Ordering::Relaxed),
        }
    }
}

/// Performance timing wrapper for metrics
pub struct MetricsTimer<'a> {
    collector: &'a MetricsCollector,
    operation: &'static str,
    start: std::time::Instant,
}

impl<'a> MetricsTimer<'a> {
    /// Start timing a database operation
    #[must_use]
    pub fn new(collector: &'a MetricsCollector, operation: &'static str) -> Self {
        Self {
            collector,
            operation,
            start: std::time::Instant::now(),
        }
    }

    /// Record the operation's duration and outcome
    pub fn finish(self, success: bool) {
        let duration = self.start.elapsed();
        self.collector
            .record_db_operation(self.operation, duration, success);
    }
}
