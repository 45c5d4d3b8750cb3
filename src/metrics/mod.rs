// src/metrics/mod.rs
// Prometheus metrics for the search orchestrator.

use axum::{http::StatusCode, response::IntoResponse};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::info;

/// Global Prometheus handle for metrics rendering
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics exporter
pub fn init_metrics() {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder");

    PROMETHEUS_HANDLE
        .set(handle)
        .expect("Prometheus handle already initialized");

    info!("Prometheus metrics initialized");
}

/// GET /metrics - Prometheus metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    match PROMETHEUS_HANDLE.get() {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Metrics not initialized".to_string(),
        ),
    }
}

/// Record an inbound turn (counter), tagged by the intent it resolved to.
pub fn record_turn(intent: &str) {
    counter!("orchestrator_turns_total", "intent" => intent.to_string()).increment(1);
}

/// Record end-to-end turn duration (histogram)
pub fn record_turn_duration(intent: &str, duration_seconds: f64) {
    histogram!("orchestrator_turn_duration_seconds", "intent" => intent.to_string())
        .record(duration_seconds);
}

/// Record an LLM API call
pub fn record_llm_call(model: &str, success: bool) {
    let status = if success { "success" } else { "error" };
    counter!("orchestrator_llm_calls_total", "model" => model.to_string(), "status" => status)
        .increment(1);
}

/// Record a vector store search attempt
pub fn record_vector_search(success: bool) {
    let status = if success { "success" } else { "error" };
    counter!("orchestrator_vector_searches_total", "status" => status).increment(1);
}

/// Record a strategy escalation (standard -> expanded -> custom)
pub fn record_strategy_escalation(strategy: &str) {
    counter!("orchestrator_strategy_escalations_total", "strategy" => strategy.to_string())
        .increment(1);
}

/// Helper for timing a turn end-to-end; records both the counter and the
/// histogram on drop so callers can't forget to record duration.
pub struct TurnTimer {
    start: Instant,
    intent: String,
}

impl TurnTimer {
    pub fn new(intent: &str) -> Self {
        record_turn(intent);
        Self {
            start: Instant::now(),
            intent: intent.to_string(),
        }
    }
}

impl Drop for TurnTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        record_turn_duration(&self.intent, duration);
    }
}
