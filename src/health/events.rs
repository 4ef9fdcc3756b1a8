//! Health change notifications.
//!
//! Published on a broadcast channel so any number of observers (dashboards,
//! loggers, the simulation CLI) can follow provider health without polling.
//! Slow subscribers lag and miss events rather than blocking publishers.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::resilience::circuit_breaker::CircuitState;

const EVENT_BUFFER: usize = 256;

/// Emitted exactly once each time a provider's healthy verdict flips.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderHealthChanged {
    pub provider_id: String,
    pub previously_healthy: bool,
    pub healthy: bool,
    pub circuit_state: CircuitState,
}

/// Publisher side of the health event stream.
#[derive(Debug, Clone)]
pub struct HealthEvents {
    tx: broadcast::Sender<ProviderHealthChanged>,
}

impl HealthEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_BUFFER);
        Self { tx }
    }

    /// Subscribe to subsequent health changes.
    pub fn subscribe(&self) -> broadcast::Receiver<ProviderHealthChanged> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: ProviderHealthChanged) {
        // No subscribers is fine.
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for HealthEvents {
    fn default() -> Self {
        Self::new()
    }
}
