//! Health verdicts and scores derived from the metrics store.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::error::MetricsResult;
use crate::health::events::ProviderHealthChanged;
use crate::health::score::compute_score;
use crate::observability::metrics;
use crate::resilience::circuit_breaker::CircuitState;
use crate::store::MetricsStore;

/// Combined health view of a provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderHealth {
    pub provider_id: String,
    pub healthy: bool,
    pub score: f64,
    pub circuit_state: CircuitState,
}

/// Read-side view over provider health.
///
/// Holds no state of its own: circuit state lives in the metrics store and
/// every verdict is recomputed from the store and the current time.
#[derive(Debug, Clone)]
pub struct HealthEvaluator {
    store: MetricsStore,
}

impl HealthEvaluator {
    pub fn new(store: MetricsStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &MetricsStore {
        &self.store
    }

    /// True unless the provider's circuit is open.
    ///
    /// An open circuit whose cooldown has elapsed is promoted to half-open
    /// first, which reports healthy and emits a health change.
    pub fn is_healthy(&self, provider_id: &str) -> MetricsResult<bool> {
        Ok(self.circuit_state(provider_id)?.is_healthy())
    }

    pub fn circuit_state(&self, provider_id: &str) -> MetricsResult<CircuitState> {
        self.store.refresh_circuit(provider_id)
    }

    /// Continuous health score in `[0, 100]`.
    pub fn health_score(&self, provider_id: &str) -> MetricsResult<f64> {
        let snapshot = self.store.get_metrics(provider_id)?;
        let config = self.store.config().load();
        let score = compute_score(&snapshot, &config.scoring, self.store.clock().now());
        metrics::record_health_score(provider_id, score);
        Ok(score)
    }

    pub fn provider_health(&self, provider_id: &str) -> MetricsResult<ProviderHealth> {
        let circuit_state = self.circuit_state(provider_id)?;
        Ok(ProviderHealth {
            provider_id: provider_id.to_string(),
            healthy: circuit_state.is_healthy(),
            score: self.health_score(provider_id)?,
            circuit_state,
        })
    }

    /// Stream of healthy/unhealthy flips.
    pub fn subscribe(&self) -> broadcast::Receiver<ProviderHealthChanged> {
        self.store.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::{self, ResilienceConfig};
    use crate::error::{MetricsError, ProviderError};
    use crate::health::events::HealthEvents;
    use std::sync::Arc;
    use std::time::Duration;

    fn evaluator() -> (HealthEvaluator, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let store = MetricsStore::new(
            config::shared(ResilienceConfig::default()),
            clock.clone(),
            HealthEvents::new(),
        );
        (HealthEvaluator::new(store), clock)
    }

    fn fail(evaluator: &HealthEvaluator, id: &str, times: usize) {
        for _ in 0..times {
            evaluator
                .store()
                .record_failure(id, &ProviderError::Timeout(Duration::from_secs(1)))
                .unwrap();
        }
    }

    #[test]
    fn test_unknown_provider_is_healthy() {
        let (evaluator, _) = evaluator();
        assert!(evaluator.is_healthy("fresh").unwrap());
        assert_eq!(evaluator.health_score("fresh").unwrap(), 100.0);
    }

    #[test]
    fn test_rejects_empty_id() {
        let (evaluator, _) = evaluator();
        assert!(matches!(evaluator.is_healthy(""), Err(MetricsError::InvalidArgument(_))));
        assert!(evaluator.health_score(" ").is_err());
    }

    #[test]
    fn test_threshold_failures_make_unhealthy() {
        let (evaluator, _) = evaluator();
        fail(&evaluator, "primary", 3);
        assert!(!evaluator.is_healthy("primary").unwrap());
        assert_eq!(evaluator.circuit_state("primary").unwrap(), CircuitState::Open);
    }

    #[test]
    fn test_full_recovery_cycle() {
        let (evaluator, clock) = evaluator();
        let mut rx = evaluator.subscribe();
        fail(&evaluator, "primary", 3);

        clock.advance(Duration::from_secs(29));
        assert!(!evaluator.is_healthy("primary").unwrap());

        clock.advance(Duration::from_secs(1));
        assert!(evaluator.is_healthy("primary").unwrap());
        assert_eq!(evaluator.circuit_state("primary").unwrap(), CircuitState::HalfOpen);

        let store = evaluator.store();
        store.record_success("primary", Duration::from_millis(10)).unwrap();
        assert_eq!(evaluator.circuit_state("primary").unwrap(), CircuitState::HalfOpen);
        store.record_success("primary", Duration::from_millis(10)).unwrap();
        assert_eq!(evaluator.circuit_state("primary").unwrap(), CircuitState::Closed);
        assert_eq!(store.get_metrics("primary").unwrap().consecutive_failures, 0);

        // open, then half-open; closing keeps the healthy verdict so no third event
        let opened = rx.try_recv().unwrap();
        assert!(!opened.healthy);
        let half_open = rx.try_recv().unwrap();
        assert!(half_open.healthy);
        assert_eq!(half_open.circuit_state, CircuitState::HalfOpen);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let (evaluator, clock) = evaluator();
        fail(&evaluator, "primary", 3);
        clock.advance(Duration::from_secs(31));
        assert!(evaluator.is_healthy("primary").unwrap());

        fail(&evaluator, "primary", 1);
        assert_eq!(evaluator.circuit_state("primary").unwrap(), CircuitState::Open);
        assert!(!evaluator.is_healthy("primary").unwrap());
    }

    #[test]
    fn test_score_prefers_fast_provider() {
        let (evaluator, _) = evaluator();
        let store = evaluator.store();
        for _ in 0..5 {
            store.record_success("fast", Duration::from_millis(50)).unwrap();
            store.record_success("slow", Duration::from_millis(2000)).unwrap();
        }
        let fast = evaluator.health_score("fast").unwrap();
        let slow = evaluator.health_score("slow").unwrap();
        assert!(fast > slow, "fast={} slow={}", fast, slow);
    }

    #[test]
    fn test_provider_health_view() {
        let (evaluator, _) = evaluator();
        fail(&evaluator, "primary", 3);
        let health = evaluator.provider_health("primary").unwrap();
        assert!(!health.healthy);
        assert_eq!(health.score, 0.0);
        assert_eq!(health.circuit_state, CircuitState::Open);
    }
}
