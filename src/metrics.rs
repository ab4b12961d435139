//! Prometheus metrics for the reporter.
//!
//! Registered lazily in the default registry and exposed by the `/metrics`
//! HTTP handler.

use once_cell::sync::Lazy;
use prometheus::{
    opts, register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec,
    IntCounterVec, TextEncoder,
};

static CACHE_LOOKUPS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!("reporter_cache_lookups_total", "Result cache lookups by outcome"),
        &["report", "result"]
    )
    .expect("failed to register reporter_cache_lookups_total")
});

static FETCH_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        prometheus::histogram_opts!(
            "reporter_fetch_duration_seconds",
            "Database round trip per report query",
            vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
        ),
        &["domain"]
    )
    .expect("failed to register reporter_fetch_duration_seconds")
});

static FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!("reporter_failures_total", "Reports that ended in an error"),
        &["report", "kind"]
    )
    .expect("failed to register reporter_failures_total")
});

pub fn record_cache_lookup(report: &str, hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    CACHE_LOOKUPS.with_label_values(&[report, result]).inc();
}

pub fn observe_fetch(domain: &str, seconds: f64) {
    FETCH_DURATION.with_label_values(&[domain]).observe(seconds);
}

pub fn record_failure(report: &str, kind: &str) {
    FAILURES.with_label_values(&[report, kind]).inc();
}

/// Encode all registered metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap_or_default();
    String::from_utf8(buffer).unwrap_or_default()
}
