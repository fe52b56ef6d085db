//! Comprehensive unit tests for metrics.rs module

use std::sync::Arc;
use std::time::Duration;

use semi_atlas::metrics::{MetricsCollector, MetricsSnapshot, MetricsTimer};

#[test]
fn test_metrics_collector_default() {
    let collector = MetricsCollector::default();
    assert_eq!(collector.db_operations_total, "semi_atlas_db_operations_total");
    assert_eq!(collector.rows_imported_total, "semi_atlas_rows_imported_total");
    assert_eq!(collector.insight_reads_total, "semi_atlas_insight_reads_total");
    assert_eq!(collector.errors_total, "semi_atlas_errors_total");
    assert_eq!(collector.snapshot(), MetricsSnapshot::default());
}

#[test]
fn test_record_db_operation_success() {
    let collector = MetricsCollector::default();
    collector.record_db_operation("list_companies", Duration::from_millis(100), true);
    let snapshot = collector.snapshot();
    assert_eq!(snapshot.db_operations, 1);
    assert_eq!(snapshot.db_failures, 0);
    assert_eq!(snapshot.errors, 0);
}

#[test]
fn test_record_db_operation_failure() {
    let collector = MetricsCollector::default();
    collector.record_db_operation("create_company", Duration::from_millis(100), false);
    let snapshot = collector.snapshot();
    assert_eq!(snapshot.db_operations, 1);
    assert_eq!(snapshot.db_failures, 1);
    assert_eq!(snapshot.errors, 1);
}

#[test]
fn test_record_export_operation() {
    let collector = MetricsCollector::default();
    collector.record_export_operation("csv", 120, 4096, Duration::from_millis(15));
    collector.record_export_operation("json", 30, 2048, Duration::from_millis(5));
    let snapshot = collector.snapshot();
    assert_eq!(snapshot.exports, 2);
    assert_eq!(snapshot.rows_exported, 150);
}

#[test]
fn test_record_import_and_reads() {
    let collector = MetricsCollector::default();
    collector.record_import("companies", 7);
    collector.record_insight_read();
    collector.record_insight_read();
    let snapshot = collector.snapshot();
    assert_eq!(snapshot.rows_imported, 7);
    assert_eq!(snapshot.insight_reads, 2);
}

#[test]
fn test_record_error() {
    let collector = MetricsCollector::default();
    collector.record_error("validation", "create_company");
    assert_eq!(collector.snapshot().errors, 1);
    assert_eq!(collector.snapshot().db_failures, 0);
}

#[test]
fn test_metrics_timer() {
    let collector = MetricsCollector::default();
    let timer = MetricsTimer::new(&collector, "get_insight");
    std::thread::sleep(Duration::from_millis(5));
    timer.finish(true);
    assert_eq!(collector.snapshot().db_operations, 1);
}

#[test]
fn test_tallies_are_shared_across_threads() {
    let collector = Arc::new(MetricsCollector::default());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let collector = Arc::clone(&collector);
            std::thread::spawn(move || {
                for _ in 0..25 {
                    collector.record_insight_read();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(collector.snapshot().insight_reads, 100);
}
