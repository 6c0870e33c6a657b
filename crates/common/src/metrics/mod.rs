//! Metrics and observability utilities
//!
//! Prometheus-style metrics for provider traffic, session lifecycle and
//! suggestion stages, with standardized naming.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all citenet metrics
pub const METRICS_PREFIX: &str = "citenet";

/// Buckets for provider round-trips (in seconds); bibliographic APIs are slow
pub const PROVIDER_BUCKETS: &[f64] = &[
    0.050,
    0.100,
    0.250,
    0.500,
    1.000,
    2.000,
    5.000,
    10.00,
    30.00,
];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_provider_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total batched provider requests"
    );

    describe_histogram!(
        format!("{}_provider_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Provider request latency in seconds"
    );

    describe_counter!(
        format!("{}_records_skipped_total", METRICS_PREFIX),
        Unit::Count,
        "Upstream records dropped during normalization"
    );

    describe_counter!(
        format!("{}_sessions_total", METRICS_PREFIX),
        Unit::Count,
        "Session lifecycle events (created, closed, evicted, restored)"
    );

    describe_gauge!(
        format!("{}_sessions_open", METRICS_PREFIX),
        Unit::Count,
        "Currently open sessions"
    );

    describe_histogram!(
        format!("{}_stage_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Build pipeline stage latency in seconds"
    );

    tracing::info!("Metrics registered");
}

/// Tracks one provider round-trip
pub struct ProviderMetrics {
    start: Instant,
    provider: &'static str,
}

impl ProviderMetrics {
    /// Start tracking a request
    pub fn start(provider: &'static str) -> Self {
        Self {
            start: Instant::now(),
            provider,
        }
    }

    /// Record request completion
    pub fn finish(self, success: bool) {
        let status = if success { "success" } else { "error" };

        counter!(
            format!("{}_provider_requests_total", METRICS_PREFIX),
            "provider" => self.provider,
            "status" => status
        )
        .increment(1);

        histogram!(
            format!("{}_provider_request_duration_seconds", METRICS_PREFIX),
            "provider" => self.provider
        )
        .record(self.start.elapsed().as_secs_f64());
    }
}

/// Helper to record records dropped by a normalizer
pub fn record_skipped(provider: &'static str, count: usize) {
    if count == 0 {
        return;
    }
    counter!(
        format!("{}_records_skipped_total", METRICS_PREFIX),
        "provider" => provider
    )
    .increment(count as u64);
}

/// Helper to record a session lifecycle event and the resulting open count
pub fn record_session_event(event: &'static str, open_sessions: usize) {
    counter!(
        format!("{}_sessions_total", METRICS_PREFIX),
        "event" => event
    )
    .increment(1);

    gauge!(format!("{}_sessions_open", METRICS_PREFIX)).set(open_sessions as f64);
}

/// Helper to record a pipeline stage
pub fn record_stage(stage: &'static str, duration_secs: f64, success: bool) {
    let outcome = if success { "success" } else { "error" };
    histogram!(
        format!("{}_stage_duration_seconds", METRICS_PREFIX),
        "stage" => stage,
        "outcome" => outcome
    )
    .record(duration_secs);
}
