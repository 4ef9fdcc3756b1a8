//! Scoped operation tracking.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::ProviderError;
use crate::observability::metrics;
use crate::store::registry::{MetricsStore, ProviderSlot};

/// A RAII guard that measures one provider call and records its outcome.
///
/// Exactly one outcome is recorded per tracker: `complete` records success,
/// `fail` records failure, `abandon` records nothing. A tracker dropped
/// without any of these (early return, panic unwind) records success.
/// The provider's in-flight count is held for the tracker's lifetime.
#[must_use = "dropping the tracker immediately records a zero-latency success"]
pub struct OperationTracker {
    store: MetricsStore,
    slot: Arc<ProviderSlot>,
    provider_id: String,
    started: Instant,
    released: bool,
}

impl OperationTracker {
    pub(crate) fn start(store: MetricsStore, provider_id: String, slot: Arc<ProviderSlot>) -> Self {
        let in_flight = slot.inc_in_flight();
        metrics::record_in_flight(&provider_id, in_flight);
        let started = store.clock().now();
        Self {
            store,
            slot,
            provider_id,
            started,
            released: false,
        }
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    /// Time since the tracker was started.
    pub fn elapsed(&self) -> Duration {
        self.store.clock().now().saturating_duration_since(self.started)
    }

    /// Record success with the measured latency.
    pub fn complete(mut self) -> Duration {
        let elapsed = self.elapsed();
        self.released = true;
        self.store.apply_success(&self.provider_id, &self.slot, elapsed);
        elapsed
    }

    /// Record failure.
    pub fn fail(mut self, error: &ProviderError) -> Duration {
        let elapsed = self.elapsed();
        self.released = true;
        self.store
            .apply_failure(&self.provider_id, &self.slot, error.to_string(), error.kind());
        elapsed
    }

    /// Release without recording anything (e.g. the caller cancelled).
    pub fn abandon(mut self) {
        self.released = true;
    }
}

impl Drop for OperationTracker {
    fn drop(&mut self) {
        if !self.released {
            let elapsed = self.elapsed();
            self.store.apply_success(&self.provider_id, &self.slot, elapsed);
        }
        let in_flight = self.slot.dec_in_flight();
        metrics::record_in_flight(&self.provider_id, in_flight);
    }
}

impl std::fmt::Debug for OperationTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationTracker")
            .field("provider_id", &self.provider_id)
            .field("released", &self.released)
            .finish()
    }
}
