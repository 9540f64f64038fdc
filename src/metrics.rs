use prometheus::{Histogram, HistogramVec, IntCounterVec, IntGauge};
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter_vec, register_int_gauge,
};
use std::sync::LazyLock;

/// Total cluster reconciliations by outcome (published/skipped/failed)
pub static RECONCILE_COUNT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "reconcile_total",
        "Total cluster reconciliations",
        &["outcome"]
    )
    .unwrap()
});

/// Duration of a single cluster reconciliation in seconds
pub static RECONCILE_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!(
        "reconcile_duration_seconds",
        "Reconcile duration in seconds",
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0] // buckets for histogram quantile
    )
    .unwrap()
});

/// Per-cluster errors by error type
pub static ERRORS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!("errors_total", "Total errors by type", &["error_type"]).unwrap()
});

/// Failure count of the most recent run
pub static RUN_FAILURES: LazyLock<IntGauge> = LazyLock::new(|| {
    register_int_gauge!("run_failures", "Cluster failures in the most recent run").unwrap()
});

/// Duration of external API calls in seconds
pub static API_CALL_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "api_call_duration_seconds",
        "Duration of external API calls",
        &["provider", "operation"],
        vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0] // buckets for histogram quantile
    )
    .unwrap()
});
