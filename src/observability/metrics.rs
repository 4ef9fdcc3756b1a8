//! Metrics collection and exposition.
//!
//! # Metrics
//! - `provider_requests_total` (counter): outcomes by provider, outcome
//! - `provider_request_duration_seconds` (histogram): successful call latency
//! - `provider_circuit_state` (gauge): 0=closed, 1=open, 2=half-open
//! - `provider_in_flight` (gauge): tracked operations not yet released
//! - `provider_health_score` (gauge): last computed score
//! - `fallback_executions_total` (counter): executor results by outcome
//! - `fallback_attempts` (histogram): providers tried per execution
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, so library users opt in
//! - Prometheus exporter installed only by the binary / engine owner

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Duration;

use crate::resilience::circuit_breaker::CircuitState;

/// Install the Prometheus recorder and its HTTP scrape endpoint.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Prometheus metrics exporter listening");
    Ok(())
}

pub fn record_outcome(provider_id: &str, outcome: &'static str, elapsed: Option<Duration>) {
    counter!("provider_requests_total", "provider" => provider_id.to_string(), "outcome" => outcome)
        .increment(1);
    if let Some(elapsed) = elapsed {
        histogram!("provider_request_duration_seconds", "provider" => provider_id.to_string())
            .record(elapsed.as_secs_f64());
    }
}

pub fn record_circuit_state(provider_id: &str, state: CircuitState) {
    gauge!("provider_circuit_state", "provider" => provider_id.to_string()).set(state as u8 as f64);
}

pub fn record_in_flight(provider_id: &str, in_flight: usize) {
    gauge!("provider_in_flight", "provider" => provider_id.to_string()).set(in_flight as f64);
}

pub fn record_health_score(provider_id: &str, score: f64) {
    gauge!("provider_health_score", "provider" => provider_id.to_string()).set(score);
}

pub fn record_fallback(outcome: &'static str, attempts: usize) {
    counter!("fallback_executions_total", "outcome" => outcome).increment(1);
    histogram!("fallback_attempts", "outcome" => outcome).record(attempts as f64);
}
