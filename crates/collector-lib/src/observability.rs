//! Observability infrastructure for the collector
//!
//! Provides:
//! - Prometheus metrics (upstream calls, resolved and skipped metrics, cycle latency)
//! - Structured JSON logging with tracing

use crate::models::Family;
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter_vec, Histogram, HistogramVec,
    IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for upstream and cycle latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<CollectorMetricsInner> = OnceLock::new();

struct CollectorMetricsInner {
    upstream_requests: IntCounterVec,
    upstream_latency_seconds: HistogramVec,
    metrics_resolved: IntCounterVec,
    metrics_skipped: IntCounterVec,
    collection_errors: IntCounterVec,
    cycle_latency_seconds: Histogram,
}

impl CollectorMetricsInner {
    fn new() -> Self {
        Self {
            upstream_requests: register_int_counter_vec!(
                "newrelic_collector_upstream_requests_total",
                "Upstream API calls by endpoint and outcome",
                &["endpoint", "outcome"]
            )
            .expect("Failed to register upstream_requests_total"),

            upstream_latency_seconds: register_histogram_vec!(
                "newrelic_collector_upstream_latency_seconds",
                "Latency of upstream API calls",
                &["endpoint"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register upstream_latency_seconds"),

            metrics_resolved: register_int_counter_vec!(
                "newrelic_collector_metrics_resolved_total",
                "Metrics resolved to a value",
                &["family"]
            )
            .expect("Failed to register metrics_resolved_total"),

            metrics_skipped: register_int_counter_vec!(
                "newrelic_collector_metrics_skipped_total",
                "Requested metrics dropped because the field was absent",
                &["family"]
            )
            .expect("Failed to register metrics_skipped_total"),

            collection_errors: register_int_counter_vec!(
                "newrelic_collector_collection_errors_total",
                "Failed collection calls by error kind",
                &["kind"]
            )
            .expect("Failed to register collection_errors_total"),

            cycle_latency_seconds: register_histogram!(
                "newrelic_collector_cycle_latency_seconds",
                "Duration of a full collection call",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register cycle_latency_seconds"),
        }
    }
}

/// Collector metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share it.
#[derive(Clone)]
pub struct CollectorMetrics {
    _private: (),
}

impl Default for CollectorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl CollectorMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(CollectorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &CollectorMetricsInner {
        GLOBAL_METRICS.get_or_init(CollectorMetricsInner::new)
    }

    /// Record one upstream call
    pub fn observe_upstream(&self, endpoint: &str, outcome: &str, duration_secs: f64) {
        let inner = self.inner();
        inner
            .upstream_requests
            .with_label_values(&[endpoint, outcome])
            .inc();
        inner
            .upstream_latency_seconds
            .with_label_values(&[endpoint])
            .observe(duration_secs);
    }

    pub fn inc_resolved(&self, family: Family, count: u64) {
        self.inner()
            .metrics_resolved
            .with_label_values(&[family.literal()])
            .inc_by(count);
    }

    pub fn inc_skipped(&self, family: Family) {
        self.inner()
            .metrics_skipped
            .with_label_values(&[family.literal()])
            .inc();
    }

    /// Increment the error counter for a failed collection call
    pub fn inc_collection_error(&self, kind: &str) {
        self.inner()
            .collection_errors
            .with_label_values(&[kind])
            .inc();
    }

    pub fn observe_cycle_latency(&self, duration_secs: f64) {
        self.inner().cycle_latency_seconds.observe(duration_secs);
    }
}

/// Structured logger for collector events
///
/// Consistent JSON-formatted records for lifecycle and collection cycles.
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    /// Log collector startup
    pub fn log_startup(&self, version: &str, namespaces: usize) {
        info!(
            event = "collector_started",
            instance = %self.instance,
            collector_version = %version,
            namespaces = namespaces,
            "Collector started"
        );
    }

    /// Log collector shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "collector_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Collector shutting down"
        );
    }

    /// Log a completed collection cycle
    pub fn log_cycle_complete(&self, requested: usize, resolved: usize, elapsed_ms: u128) {
        info!(
            event = "cycle_complete",
            instance = %self.instance,
            requested = requested,
            resolved = resolved,
            skipped = requested.saturating_sub(resolved),
            elapsed_ms = elapsed_ms,
            "Collection cycle complete"
        );
    }

    /// Log a failed collection cycle
    pub fn log_cycle_failed(&self, requested: usize, kind: &str, error: &str) {
        warn!(
            event = "cycle_failed",
            instance = %self.instance,
            requested = requested,
            error_kind = %kind,
            error = %error,
            "Collection cycle failed"
        );
    }
}
