//! Prometheus metrics for HTTP requests, store traffic and matrix commits.
//!
//! Access checks, cache lookups and unknown stored levels are counted at the
//! call site with the `metrics` macros; the helpers here cover the
//! multi-sample recordings.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Instant;

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,

    /// Histogram buckets for durations, in seconds
    #[serde(default = "default_duration_buckets")]
    pub duration_buckets: Vec<f64>,

    /// Labels added to every metric
    #[serde(default)]
    pub global_labels: HashMap<String, String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            duration_buckets: default_duration_buckets(),
            global_labels: HashMap::new(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_duration_buckets() -> Vec<f64> {
    vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
}

/// Install the Prometheus recorder.
///
/// Returns `None` when metrics are disabled; `/metrics` then renders nothing.
pub fn init_metrics(config: &MetricsConfig, service_name: &str) -> anyhow::Result<Option<PrometheusHandle>> {
    if !config.enabled {
        return Ok(None);
    }

    let mut builder = PrometheusBuilder::new().add_global_label("service", service_name);
    for (key, value) in &config.global_labels {
        builder = builder.add_global_label(key, value);
    }
    builder = builder.set_buckets(&config.duration_buckets)?;

    let handle = builder.install_recorder()?;
    register_metric_descriptions();

    tracing::info!(service_name = %service_name, "Metrics initialized");
    Ok(Some(handle))
}

fn register_metric_descriptions() {
    describe_histogram!("http_request_duration_seconds", "HTTP request duration in seconds");
    describe_counter!("http_requests_total", "Total number of HTTP requests");

    describe_counter!("accessgate_errors_total", "Errors by category and code");
    describe_counter!(
        "accessgate_permission_checks_total",
        "Resource-action permission checks by outcome"
    );
    describe_counter!(
        "accessgate_unknown_levels_total",
        "Stored access levels that were not recognized and read as none"
    );
    describe_counter!(
        "accessgate_guard_decisions_total",
        "Route guard decisions by outcome"
    );

    describe_counter!("accessgate_cache_hits_total", "Staleness cache hits");
    describe_counter!("accessgate_cache_misses_total", "Staleness cache misses");
    describe_counter!("accessgate_store_fetches_total", "Reads issued to the access store");

    describe_counter!("accessgate_commits_total", "Matrix bulk commits by outcome");
    describe_counter!("accessgate_commit_retries_total", "Bulk commit retries");
    describe_histogram!(
        "accessgate_commit_duration_seconds",
        "Bulk commit duration including retries"
    );
    describe_histogram!("accessgate_commit_changes", "Rule changes per committed batch");

    describe_gauge!("accessgate_db_pool_connections", "Open database connections");
    describe_gauge!("accessgate_db_pool_idle", "Idle database connections");
}

/// HTTP request timing.
pub struct RequestDurationHistogram;

impl RequestDurationHistogram {
    pub fn record(method: &str, path: &str, status_code: u16, duration_seconds: f64) {
        histogram!(
            "http_request_duration_seconds",
            "method" => method.to_string(),
            "path" => path.to_string(),
            "status_code" => status_code.to_string(),
        )
        .record(duration_seconds);

        counter!(
            "http_requests_total",
            "method" => method.to_string(),
            "path" => path.to_string(),
            "status_code" => status_code.to_string(),
        )
        .increment(1);
    }
}

/// Outcome of one bulk commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcomeLabel {
    Committed,
    Empty,
    Rejected,
    Failed,
}

impl CommitOutcomeLabel {
    fn as_str(self) -> &'static str {
        match self {
            Self::Committed => "committed",
            Self::Empty => "empty",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
        }
    }
}

pub struct CommitMetrics;

impl CommitMetrics {
    pub fn record(outcome: CommitOutcomeLabel, changes: usize, started: Instant) {
        counter!("accessgate_commits_total", "outcome" => outcome.as_str()).increment(1);
        histogram!("accessgate_commit_duration_seconds").record(started.elapsed().as_secs_f64());
        if outcome == CommitOutcomeLabel::Committed {
            histogram!("accessgate_commit_changes").record(changes as f64);
        }
    }

    pub fn retry() {
        counter!("accessgate_commit_retries_total").increment(1);
    }
}

pub struct StoreMetrics;

impl StoreMetrics {
    /// `kind` is one of `catalog`, `role`.
    pub fn fetch(kind: &'static str, backend: &'static str) {
        counter!("accessgate_store_fetches_total", "kind" => kind, "backend" => backend).increment(1);
    }
}
