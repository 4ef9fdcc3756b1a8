//! Per-provider outcome bookkeeping.
//!
//! # Responsibilities
//! - Count successes and failures per provider identity
//! - Keep a bounded window of latency samples
//! - Drive the provider's circuit breaker on every outcome
//! - Publish health changes caused by those transitions
//!
//! # Design Decisions
//! - Entries are created lazily on the first recorded outcome and never
//!   removed implicitly
//! - One mutex per provider; different providers never contend
//! - `in_flight` is an atomic outside the mutex so trackers never lock to count

use dashmap::DashMap;
use std::error::Error as StdError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::clock::{SharedClock, SystemClock};
use crate::config::{self, ResilienceConfig, SharedConfig};
use crate::error::{validate_provider_id, MetricsError, MetricsResult, ProviderError};
use crate::health::events::{HealthEvents, ProviderHealthChanged};
use crate::observability::metrics;
use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitState, Transition};
use crate::store::samples::LatencyWindow;
use crate::store::snapshot::ProviderMetrics;
use crate::store::tracker::OperationTracker;

/// Mutable state of one provider, guarded by its slot mutex.
#[derive(Debug)]
struct ProviderEntry {
    request_count: u64,
    success_count: u64,
    failure_count: u64,
    samples: LatencyWindow,
    last_error: Option<String>,
    last_operation_at: Option<Instant>,
    last_failure_at: Option<Instant>,
    last_outcome_failed: bool,
    breaker: CircuitBreaker,
}

impl ProviderEntry {
    fn new(sample_capacity: usize) -> Self {
        Self {
            request_count: 0,
            success_count: 0,
            failure_count: 0,
            samples: LatencyWindow::new(sample_capacity),
            last_error: None,
            last_operation_at: None,
            last_failure_at: None,
            last_outcome_failed: false,
            breaker: CircuitBreaker::new(),
        }
    }

    fn snapshot(&self, provider_id: &str, in_flight: usize) -> ProviderMetrics {
        let stats = self.samples.stats();
        let success_rate = if self.request_count == 0 {
            1.0
        } else {
            self.success_count as f64 / self.request_count as f64
        };
        ProviderMetrics {
            provider_id: provider_id.to_string(),
            request_count: self.request_count,
            success_count: self.success_count,
            failure_count: self.failure_count,
            success_rate,
            sample_count: self.samples.len(),
            average_response_time: stats.average,
            median_response_time: stats.median,
            p95_response_time: stats.p95,
            last_error: self.last_error.clone(),
            last_operation_at: self.last_operation_at,
            last_failure_at: self.last_failure_at,
            last_outcome_failed: self.last_outcome_failed,
            circuit_state: self.breaker.state(),
            circuit_opened_at: self.breaker.opened_at(),
            half_open_attempts: self.breaker.half_open_attempts(),
            consecutive_failures: self.breaker.consecutive_failures(),
            in_flight,
        }
    }
}

/// A provider's entry plus its lock-free in-flight counter.
#[derive(Debug)]
pub(crate) struct ProviderSlot {
    state: Mutex<ProviderEntry>,
    in_flight: AtomicUsize,
}

impl ProviderSlot {
    fn new(sample_capacity: usize) -> Self {
        Self {
            state: Mutex::new(ProviderEntry::new(sample_capacity)),
            in_flight: AtomicUsize::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ProviderEntry> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn inc_in_flight(&self) -> usize {
        self.in_flight.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn dec_in_flight(&self) -> usize {
        self.in_flight.fetch_sub(1, Ordering::Relaxed).saturating_sub(1)
    }

    fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }
}

struct StoreInner {
    providers: DashMap<String, Arc<ProviderSlot>>,
    config: SharedConfig,
    clock: SharedClock,
    events: HealthEvents,
}

/// Thread-safe store of per-provider outcomes.
///
/// Cloning is cheap and every clone shares the same entries.
#[derive(Clone)]
pub struct MetricsStore {
    inner: Arc<StoreInner>,
}

impl MetricsStore {
    pub fn new(config: SharedConfig, clock: SharedClock, events: HealthEvents) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                providers: DashMap::new(),
                config,
                clock,
                events,
            }),
        }
    }

    /// Store with its own static configuration, the wall clock and a fresh event stream.
    pub fn with_config(config: ResilienceConfig) -> Self {
        Self::new(config::shared(config), Arc::new(SystemClock), HealthEvents::new())
    }

    pub fn clock(&self) -> &SharedClock {
        &self.inner.clock
    }

    pub fn config(&self) -> &SharedConfig {
        &self.inner.config
    }

    pub fn events(&self) -> &HealthEvents {
        &self.inner.events
    }

    /// Subscribe to health changes caused by recorded outcomes or cooldowns.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<ProviderHealthChanged> {
        self.inner.events.subscribe()
    }

    /// Record a successful call and its latency.
    pub fn record_success(&self, provider_id: &str, elapsed: Duration) -> MetricsResult<()> {
        validate_provider_id(provider_id)?;
        let slot = self.slot(provider_id);
        self.apply_success(provider_id, &slot, elapsed);
        Ok(())
    }

    /// Record a failed call.
    pub fn record_failure(&self, provider_id: &str, error: &ProviderError) -> MetricsResult<()> {
        validate_provider_id(provider_id)?;
        let slot = self.slot(provider_id);
        self.apply_failure(provider_id, &slot, error.to_string(), error.kind());
        Ok(())
    }

    /// Record a failure whose cause comes from foreign code and may be missing.
    pub fn record_failure_dyn(
        &self,
        provider_id: &str,
        error: Option<&(dyn StdError + 'static)>,
    ) -> MetricsResult<()> {
        validate_provider_id(provider_id)?;
        let error = error.ok_or_else(|| {
            MetricsError::MissingError(format!("failure for provider '{}' has no cause", provider_id))
        })?;
        let slot = self.slot(provider_id);
        self.apply_failure(provider_id, &slot, error.to_string(), "external");
        Ok(())
    }

    /// Snapshot one provider; unknown providers yield a zero-valued record.
    pub fn get_metrics(&self, provider_id: &str) -> MetricsResult<ProviderMetrics> {
        validate_provider_id(provider_id)?;
        Ok(match self.existing_slot(provider_id) {
            Some(slot) => slot.lock().snapshot(provider_id, slot.in_flight()),
            None => ProviderMetrics::empty(provider_id),
        })
    }

    /// Snapshot every observed provider, ordered by id.
    pub fn get_all_metrics(&self) -> Vec<ProviderMetrics> {
        let slots: Vec<(String, Arc<ProviderSlot>)> = self
            .inner
            .providers
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();

        let mut all: Vec<ProviderMetrics> = slots
            .iter()
            .map(|(id, slot)| slot.lock().snapshot(id, slot.in_flight()))
            .collect();
        all.sort_by(|a, b| a.provider_id.cmp(&b.provider_id));
        all
    }

    /// Ids of every observed provider.
    pub fn provider_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.providers.iter().map(|r| r.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Clear counts, samples and error, and close the circuit.
    pub fn reset_metrics(&self, provider_id: &str) -> MetricsResult<()> {
        validate_provider_id(provider_id)?;
        if let Some(slot) = self.existing_slot(provider_id) {
            self.reset_slot(provider_id, &slot);
        }
        Ok(())
    }

    pub fn reset_all(&self) {
        for (id, slot) in self
            .inner
            .providers
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect::<Vec<_>>()
        {
            self.reset_slot(&id, &slot);
        }
    }

    /// Begin tracking an operation; the outcome is recorded when the tracker is released.
    pub fn start_operation(&self, provider_id: &str) -> MetricsResult<OperationTracker> {
        validate_provider_id(provider_id)?;
        let slot = self.slot(provider_id);
        Ok(OperationTracker::start(self.clone(), provider_id.to_string(), slot))
    }

    /// Operations currently tracked for a provider.
    pub fn in_flight(&self, provider_id: &str) -> usize {
        self.existing_slot(provider_id)
            .map(|slot| slot.in_flight())
            .unwrap_or(0)
    }

    /// Current circuit state, promoting Open → Half-Open if the cooldown elapsed.
    pub(crate) fn refresh_circuit(&self, provider_id: &str) -> MetricsResult<CircuitState> {
        validate_provider_id(provider_id)?;
        let Some(slot) = self.existing_slot(provider_id) else {
            return Ok(CircuitState::Closed);
        };

        let now = self.inner.clock.now();
        let config = self.inner.config.load();
        let mut entry = slot.lock();
        let transition = entry.breaker.poll(now, &config.circuit);
        self.publish(provider_id, transition);
        Ok(entry.breaker.state())
    }

    pub(crate) fn apply_success(&self, provider_id: &str, slot: &ProviderSlot, elapsed: Duration) {
        let now = self.inner.clock.now();
        let config = self.inner.config.load();
        {
            let mut entry = slot.lock();
            entry.request_count += 1;
            entry.success_count += 1;
            entry.samples.set_capacity(config.metrics.sample_capacity);
            entry.samples.push(elapsed);
            entry.last_operation_at = Some(now);
            entry.last_outcome_failed = false;
            let transition = entry.breaker.on_success(&config.circuit);
            self.publish(provider_id, transition);
        }

        metrics::record_outcome(provider_id, "success", Some(elapsed));
    }

    pub(crate) fn apply_failure(&self, provider_id: &str, slot: &ProviderSlot, message: String, kind: &'static str) {
        let now = self.inner.clock.now();
        let config = self.inner.config.load();
        let consecutive = {
            let mut entry = slot.lock();
            entry.request_count += 1;
            entry.failure_count += 1;
            entry.last_error = Some(message);
            entry.last_operation_at = Some(now);
            entry.last_failure_at = Some(now);
            entry.last_outcome_failed = true;
            let transition = entry.breaker.on_failure(now, &config.circuit);
            self.publish(provider_id, transition);
            entry.breaker.consecutive_failures()
        };

        tracing::debug!(
            provider_id = %provider_id,
            kind,
            consecutive_failures = consecutive,
            "Recorded provider failure"
        );
        metrics::record_outcome(provider_id, "failure", None);
    }

    fn reset_slot(&self, provider_id: &str, slot: &ProviderSlot) {
        let capacity = self.inner.config.load().metrics.sample_capacity;
        let mut entry = slot.lock();
        let transition = entry.breaker.reset();
        *entry = ProviderEntry::new(capacity);
        self.publish(provider_id, transition);
        drop(entry);
        tracing::info!(provider_id = %provider_id, "Provider metrics reset");
    }

    /// Report a breaker transition.
    ///
    /// Callers hold the provider's slot lock so subscribers observe each
    /// provider's transitions in the order they happened.
    fn publish(&self, provider_id: &str, transition: Option<Transition>) {
        let Some(transition) = transition else {
            return;
        };

        metrics::record_circuit_state(provider_id, transition.to);
        if transition.to == CircuitState::Open {
            tracing::warn!(provider_id = %provider_id, from = ?transition.from, "Circuit opened");
        } else {
            tracing::info!(provider_id = %provider_id, from = ?transition.from, to = ?transition.to, "Circuit transition");
        }

        if transition.health_changed() {
            self.inner.events.publish(ProviderHealthChanged {
                provider_id: provider_id.to_string(),
                previously_healthy: transition.from.is_healthy(),
                healthy: transition.to.is_healthy(),
                circuit_state: transition.to,
            });
        }
    }

    fn existing_slot(&self, provider_id: &str) -> Option<Arc<ProviderSlot>> {
        self.inner.providers.get(provider_id).map(|r| r.value().clone())
    }

    fn slot(&self, provider_id: &str) -> Arc<ProviderSlot> {
        if let Some(slot) = self.existing_slot(provider_id) {
            return slot;
        }
        let capacity = self.inner.config.load().metrics.sample_capacity;
        self.inner
            .providers
            .entry(provider_id.to_string())
            .or_insert_with(|| Arc::new(ProviderSlot::new(capacity)))
            .value()
            .clone()
    }
}

impl std::fmt::Debug for MetricsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsStore")
            .field("providers", &self.inner.providers.len())
            .field("clock", &self.inner.clock)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn store_with_clock() -> (MetricsStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let store = MetricsStore::new(
            config::shared(ResilienceConfig::default()),
            clock.clone(),
            HealthEvents::new(),
        );
        (store, clock)
    }

    fn transport() -> ProviderError {
        ProviderError::Transport("connection reset".into())
    }

    #[test]
    fn test_record_success_updates_counts() {
        let store = MetricsStore::with_config(ResilienceConfig::default());
        store.record_success("primary", Duration::from_millis(40)).unwrap();
        store.record_success("primary", Duration::from_millis(60)).unwrap();

        let m = store.get_metrics("primary").unwrap();
        assert_eq!(m.request_count, 2);
        assert_eq!(m.success_count, 2);
        assert_eq!(m.average_response_time, Some(Duration::from_millis(50)));
        assert_eq!(m.median_response_time, Some(Duration::from_millis(50)));
        assert!(m.last_operation_at.is_some());
    }

    #[test]
    fn test_record_failure_sets_last_error() {
        let store = MetricsStore::with_config(ResilienceConfig::default());
        store.record_failure("primary", &transport()).unwrap();

        let m = store.get_metrics("primary").unwrap();
        assert_eq!(m.failure_count, 1);
        assert_eq!(m.success_rate, 0.0);
        assert_eq!(m.last_error.as_deref(), Some("Transport error: connection reset"));
        assert!(m.last_outcome_failed);
    }

    #[test]
    fn test_rejects_empty_provider_id() {
        let store = MetricsStore::with_config(ResilienceConfig::default());
        assert!(matches!(
            store.record_success("  ", Duration::ZERO),
            Err(MetricsError::InvalidArgument(_))
        ));
        assert!(matches!(
            store.record_failure("", &transport()),
            Err(MetricsError::InvalidArgument(_))
        ));
        assert!(store.start_operation("").is_err());
        assert!(store.provider_ids().is_empty());
    }

    #[test]
    fn test_missing_cause_rejected() {
        let store = MetricsStore::with_config(ResilienceConfig::default());
        assert!(matches!(
            store.record_failure_dyn("primary", None),
            Err(MetricsError::MissingError(_))
        ));

        let io = std::io::Error::new(std::io::ErrorKind::Other, "socket closed");
        store.record_failure_dyn("primary", Some(&io)).unwrap();
        let m = store.get_metrics("primary").unwrap();
        assert_eq!(m.failure_count, 1);
        assert_eq!(m.last_error.as_deref(), Some("socket closed"));
    }

    #[test]
    fn test_unknown_provider_snapshot() {
        let store = MetricsStore::with_config(ResilienceConfig::default());
        let m = store.get_metrics("never-seen").unwrap();
        assert_eq!(m.success_count, 0);
        assert_eq!(m.success_rate, 1.0);
        // Reading does not create entries.
        assert!(store.get_all_metrics().is_empty());
    }

    #[test]
    fn test_request_count_invariant_over_random_sequences() {
        let store = MetricsStore::with_config(ResilienceConfig::default());
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let id = ["a", "b", "c"][rng.gen_range(0..3)];
            if rng.gen_bool(0.6) {
                store.record_success(id, Duration::from_millis(rng.gen_range(1..200))).unwrap();
            } else {
                store.record_failure(id, &transport()).unwrap();
            }
            let m = store.get_metrics(id).unwrap();
            assert_eq!(m.request_count, m.success_count + m.failure_count);
        }
    }

    #[test]
    fn test_sample_window_is_bounded() {
        let mut cfg = ResilienceConfig::default();
        cfg.metrics.sample_capacity = 10;
        let store = MetricsStore::with_config(cfg);
        for i in 0..25 {
            store.record_success("primary", Duration::from_millis(i)).unwrap();
        }
        let m = store.get_metrics("primary").unwrap();
        assert_eq!(m.sample_count, 10);
        assert_eq!(m.request_count, 25);
    }

    #[test]
    fn test_threshold_opens_circuit_and_emits_once() {
        let (store, _clock) = store_with_clock();
        let mut rx = store.subscribe();

        for _ in 0..5 {
            store.record_failure("primary", &transport()).unwrap();
        }

        let m = store.get_metrics("primary").unwrap();
        assert_eq!(m.circuit_state, CircuitState::Open);
        assert!(m.circuit_opened_at.is_some());

        let event = rx.try_recv().unwrap();
        assert_eq!(event.provider_id, "primary");
        assert!(event.previously_healthy);
        assert!(!event.healthy);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_refresh_promotes_after_cooldown() {
        let (store, clock) = store_with_clock();
        for _ in 0..3 {
            store.record_failure("primary", &transport()).unwrap();
        }
        assert_eq!(store.refresh_circuit("primary").unwrap(), CircuitState::Open);

        clock.advance(Duration::from_secs(30));
        assert_eq!(store.refresh_circuit("primary").unwrap(), CircuitState::HalfOpen);
        assert_eq!(store.get_metrics("primary").unwrap().half_open_attempts, 0);
    }

    #[test]
    fn test_reset_closes_circuit() {
        let (store, _clock) = store_with_clock();
        for _ in 0..3 {
            store.record_failure("primary", &transport()).unwrap();
        }
        let mut rx = store.subscribe();
        store.reset_metrics("primary").unwrap();

        let m = store.get_metrics("primary").unwrap();
        assert_eq!(m.request_count, 0);
        assert_eq!(m.last_error, None);
        assert_eq!(m.circuit_state, CircuitState::Closed);
        assert!(rx.try_recv().unwrap().healthy);
    }

    #[test]
    fn test_reset_all() {
        let store = MetricsStore::with_config(ResilienceConfig::default());
        store.record_success("a", Duration::from_millis(5)).unwrap();
        store.record_failure("b", &transport()).unwrap();
        store.reset_all();
        assert!(store.get_all_metrics().iter().all(|m| m.request_count == 0));
        assert_eq!(store.provider_ids(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_concurrent_recording() {
        let store = MetricsStore::with_config(ResilienceConfig::default());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    let id = if t % 2 == 0 { "even" } else { "odd" };
                    for _ in 0..250 {
                        store.record_success(id, Duration::from_millis(1)).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(store.get_metrics("even").unwrap().request_count, 1000);
        assert_eq!(store.get_metrics("odd").unwrap().request_count, 1000);
    }

    #[test]
    fn test_concurrent_transitions_arrive_in_order() {
        let (store, clock) = store_with_clock();
        let mut rx = store.subscribe();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                let clock = clock.clone();
                std::thread::spawn(move || {
                    for _ in 0..20 {
                        store.record_failure("primary", &transport()).unwrap();
                        clock.advance(Duration::from_secs(30));
                        store.refresh_circuit("primary").unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let mut healthy = true;
        let mut seen = 0;
        while let Ok(event) = rx.try_recv() {
            assert_eq!(event.previously_healthy, healthy, "event {} out of order", seen);
            assert_ne!(event.previously_healthy, event.healthy);
            healthy = event.healthy;
            seen += 1;
        }
        assert!(seen > 0);
    }

    #[test]
    fn test_extreme_latency_does_not_panic() {
        let (store, _clock) = store_with_clock();
        store.record_success("primary", Duration::MAX).unwrap();
        store.record_success("primary", Duration::from_secs(1)).unwrap();

        let m = store.get_metrics("primary").unwrap();
        assert_eq!(m.success_count, 2);
        assert!(m.average_response_time.unwrap() > Duration::from_secs(1));
        assert_eq!(store.get_all_metrics().len(), 1);
    }
}
