//! Telemetry: structured logging and Prometheus metrics.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat, LoggingConfig, RedactionConfig, RedactionPattern, SensitiveFieldRedactor};
pub use metrics::{
    init_metrics, CommitMetrics, CommitOutcomeLabel, MetricsConfig, RequestDurationHistogram, StoreMetrics,
};

use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Environment (development, staging, production)
    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            environment: default_environment(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

fn default_service_name() -> String {
    "accessgate".to_string()
}

fn default_environment() -> String {
    std::env::var("ACCESSGATE_ENVIRONMENT").unwrap_or_else(|_| "development".to_string())
}

/// Initialize metrics, then logging. Call once at startup.
pub fn init_telemetry(config: &TelemetryConfig) -> anyhow::Result<TelemetryHandle> {
    let prometheus = init_metrics(&config.metrics, &config.service_name)?;
    init_logging(&config.logging, &config.environment)?;
    Ok(TelemetryHandle { prometheus })
}

pub struct TelemetryHandle {
    pub prometheus: Option<PrometheusHandle>,
}

impl TelemetryHandle {
    pub fn shutdown(self) {
        ::tracing::info!("Telemetry shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_config_defaults() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "accessgate");
        assert!(config.metrics.enabled);
    }
}
