//! Observability infrastructure for the prediction service
//!
//! Provides:
//! - Prometheus metrics (inference latency, served predictions, errors,
//!   unmapped model codes, loaded artifact info)
//! - Structured JSON logging with tracing

use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_counter_vec,
    GaugeVec, Histogram, IntCounter, IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for inference latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ServiceMetricsInner> = OnceLock::new();

struct ServiceMetricsInner {
    inference_latency_seconds: Histogram,
    predictions_served: IntCounter,
    batch_rows_served: IntCounter,
    request_errors: IntCounterVec,
    unmapped_codes: IntCounterVec,
    artifact_info: GaugeVec,
}

impl ServiceMetricsInner {
    fn new() -> Self {
        Self {
            inference_latency_seconds: register_histogram!(
                "ackvision_inference_latency_seconds",
                "Time spent running the four models for one record",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register inference_latency_seconds"),

            predictions_served: register_int_counter!(
                "ackvision_predictions_served_total",
                "Single-record predictions served"
            )
            .expect("Failed to register predictions_served"),

            batch_rows_served: register_int_counter!(
                "ackvision_batch_rows_served_total",
                "Rows predicted through batch uploads"
            )
            .expect("Failed to register batch_rows_served"),

            request_errors: register_int_counter_vec!(
                "ackvision_request_errors_total",
                "Requests rejected or failed, by error kind",
                &["kind"]
            )
            .expect("Failed to register request_errors"),

            unmapped_codes: register_int_counter_vec!(
                "ackvision_unmapped_codes_total",
                "Model outputs with no entry in their label table",
                &["table"]
            )
            .expect("Failed to register unmapped_codes"),

            artifact_info: register_gauge_vec!(
                "ackvision_artifact_info",
                "Information about the loaded training artifacts",
                &["models_dir"]
            )
            .expect("Failed to register artifact_info"),
        }
    }
}

/// Service metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct ServiceMetrics {
    _private: (),
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ServiceMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ServiceMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn observe_inference_latency(&self, duration_secs: f64) {
        self.inner().inference_latency_seconds.observe(duration_secs);
    }

    pub fn inc_predictions_served(&self) {
        self.inner().predictions_served.inc();
    }

    pub fn inc_batch_rows(&self, rows: u64) {
        self.inner().batch_rows_served.inc_by(rows);
    }

    pub fn inc_request_errors(&self, kind: &str) {
        self.inner().request_errors.with_label_values(&[kind]).inc();
    }

    pub fn inc_unmapped_codes(&self, table: &str) {
        self.inner().unmapped_codes.with_label_values(&[table]).inc();
    }

    pub fn set_artifact_info(&self, models_dir: &str) {
        self.inner().artifact_info.reset();
        self.inner()
            .artifact_info
            .with_label_values(&[models_dir])
            .set(1.0);
    }
}

/// Structured logger for service events
#[derive(Clone)]
pub struct StructuredLogger {
    service: String,
}

impl StructuredLogger {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn log_startup(&self, version: &str, port: u16) {
        info!(
            event = "service_started",
            service = %self.service,
            version = %version,
            port = port,
            "AckVision service started"
        );
    }

    pub fn log_artifacts_loaded(&self, models_dir: &str, risk_labels: &[String]) {
        info!(
            event = "artifacts_loaded",
            service = %self.service,
            models_dir = %models_dir,
            risk_labels = ?risk_labels,
            "Encoders, scaler and models loaded"
        );
    }

    pub fn log_prediction(
        &self,
        exam_score: f64,
        pass_fail: &str,
        performance: &str,
        risk_cluster: &str,
        advisory_count: usize,
    ) {
        info!(
            event = "prediction_served",
            service = %self.service,
            exam_score = exam_score,
            pass_fail = %pass_fail,
            performance = %performance,
            risk_cluster = %risk_cluster,
            advisory_count = advisory_count,
            "Served prediction"
        );
    }

    pub fn log_batch(&self, rows: usize, elapsed_ms: u64) {
        info!(
            event = "batch_served",
            service = %self.service,
            rows = rows,
            elapsed_ms = elapsed_ms,
            "Served batch prediction"
        );
    }

    pub fn log_risk_mapping_disagreement(&self, stored: &[String], recomputed: &[String]) {
        warn!(
            event = "risk_mapping_disagreement",
            service = %self.service,
            stored = ?stored,
            recomputed = ?recomputed,
            "Stored cluster-to-risk mapping disagrees with centroid ranking on reference data"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            service = %self.service,
            reason = %reason,
            "AckVision service shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_metrics_handles_share_registry() {
        let metrics = ServiceMetrics::new();
        let other = metrics.clone();

        metrics.observe_inference_latency(0.0002);
        metrics.inc_predictions_served();
        other.inc_batch_rows(3);
        other.inc_request_errors("missing_field");
        other.inc_unmapped_codes("risk_cluster");
        other.set_artifact_info("models");

        let families = prometheus::gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "ackvision_unmapped_codes_total"));
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("ackvision");
        assert_eq!(logger.service, "ackvision");
    }
}
