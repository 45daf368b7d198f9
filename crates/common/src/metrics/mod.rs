//! Metrics and observability utilities
//!
//! Prometheus-style series recorded through the `metrics` facade. The
//! exporter itself is installed by the gateway binary.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all SourceFinder metrics
pub const METRICS_PREFIX: &str = "sourcefinder";

/// Histogram buckets for HTTP request latency (in seconds)
///
/// A search request spans two or three generative-text calls, so the tail
/// reaches into minutes.
pub const LATENCY_BUCKETS: &[f64] = &[
    0.005,  // 5ms
    0.025,  // 25ms
    0.100,  // 100ms
    0.250,  // 250ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
    60.00,  // 1m
    120.0,  // 2m
    180.0,  // 3m
    300.0,  // 5m
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Pipeline metrics
    describe_counter!(
        format!("{}_search_runs_total", METRICS_PREFIX),
        Unit::Count,
        "Search pipeline runs by terminal outcome"
    );

    describe_histogram!(
        format!("{}_search_run_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Search pipeline latency in seconds"
    );

    describe_counter!(
        format!("{}_sources_persisted_total", METRICS_PREFIX),
        Unit::Count,
        "Sources stored across all runs"
    );

    describe_counter!(
        format!("{}_sources_dropped_total", METRICS_PREFIX),
        Unit::Count,
        "Extracted items discarded, by reason"
    );

    // Generative-text service
    describe_counter!(
        format!("{}_llm_calls_total", METRICS_PREFIX),
        Unit::Count,
        "Generative-text calls by request shape and status"
    );

    describe_histogram!(
        format!("{}_llm_call_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Generative-text call latency in seconds"
    );

    // Probe
    describe_counter!(
        format!("{}_url_probes_total", METRICS_PREFIX),
        Unit::Count,
        "URL probes by reachability"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Record a finished pipeline run
pub fn record_search_run(outcome: &str, duration_secs: f64, persisted: usize) {
    counter!(
        format!("{}_search_runs_total", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_search_run_duration_seconds", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .record(duration_secs);

    counter!(format!("{}_sources_persisted_total", METRICS_PREFIX)).increment(persisted as u64);
}

/// Record extracted items that were discarded
pub fn record_sources_dropped(reason: &str, count: usize) {
    if count == 0 {
        return;
    }

    counter!(
        format!("{}_sources_dropped_total", METRICS_PREFIX),
        "reason" => reason.to_string()
    )
    .increment(count as u64);
}

/// Record one generative-text call
pub fn record_llm_call(shape: &str, duration_secs: f64, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_llm_calls_total", METRICS_PREFIX),
        "shape" => shape.to_string(),
        "status" => status
    )
    .increment(1);

    histogram!(
        format!("{}_llm_call_duration_seconds", METRICS_PREFIX),
        "shape" => shape.to_string()
    )
    .record(duration_secs);
}

/// Record one URL probe
pub fn record_probe(reachable: bool) {
    counter!(
        format!("{}_url_probes_total", METRICS_PREFIX),
        "reachable" => if reachable { "true" } else { "false" }
    )
    .increment(1);
}
