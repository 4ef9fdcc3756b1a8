//! Read-only metric snapshots.

use serde::{Serialize, Serializer};
use std::time::{Duration, Instant};

use crate::resilience::circuit_breaker::CircuitState;

/// Point-in-time view of one provider's metrics.
///
/// Derived statistics (rates, averages, percentiles) are computed when the
/// snapshot is taken; nothing here is maintained incrementally.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderMetrics {
    pub provider_id: String,
    pub request_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    /// Fraction of successful requests; 1.0 when nothing was recorded.
    pub success_rate: f64,
    pub sample_count: usize,
    #[serde(serialize_with = "as_millis")]
    pub average_response_time: Option<Duration>,
    #[serde(serialize_with = "as_millis")]
    pub median_response_time: Option<Duration>,
    #[serde(serialize_with = "as_millis")]
    pub p95_response_time: Option<Duration>,
    pub last_error: Option<String>,
    #[serde(skip)]
    pub last_operation_at: Option<Instant>,
    #[serde(skip)]
    pub last_failure_at: Option<Instant>,
    pub last_outcome_failed: bool,
    pub circuit_state: CircuitState,
    #[serde(skip)]
    pub circuit_opened_at: Option<Instant>,
    pub half_open_attempts: u32,
    pub consecutive_failures: u32,
    pub in_flight: usize,
}

impl ProviderMetrics {
    /// Zero-valued record for a provider that has never been observed.
    pub fn empty(provider_id: &str) -> Self {
        Self {
            provider_id: provider_id.to_string(),
            request_count: 0,
            success_count: 0,
            failure_count: 0,
            success_rate: 1.0,
            sample_count: 0,
            average_response_time: None,
            median_response_time: None,
            p95_response_time: None,
            last_error: None,
            last_operation_at: None,
            last_failure_at: None,
            last_outcome_failed: false,
            circuit_state: CircuitState::Closed,
            circuit_opened_at: None,
            half_open_attempts: 0,
            consecutive_failures: 0,
            in_flight: 0,
        }
    }

    /// True when the latest completed operation failed within `window` of `now`.
    pub fn failed_recently(&self, now: Instant, window: Duration) -> bool {
        match (self.last_outcome_failed, self.last_failure_at) {
            (true, Some(at)) => now.saturating_duration_since(at) <= window,
            _ => false,
        }
    }
}

fn as_millis<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(d) => serializer.serialize_some(&(d.as_secs_f64() * 1000.0)),
        None => serializer.serialize_none(),
    }
}
