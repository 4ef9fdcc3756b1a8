//! Circuit breaker for provider protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: provider assumed down, excluded from selection
//! - Half-Open: trial calls allowed to test recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= failure_threshold
//! Open → Half-Open: cooldown elapsed (checked lazily on the next health query)
//! Half-Open → Closed: half_open_max_attempts consecutive successes
//! Half-Open → Open: any failure
//! ```
//!
//! # Design Decisions
//! - Per-provider breaker, owned by the metrics store entry
//! - No background timer; transitions are a function of (state, now)
//! - Every mutator reports the transition it caused so the caller can
//!   publish health changes after releasing its lock

use serde::Serialize;
use std::time::Instant;

use crate::config::CircuitBreakerConfig;

/// Circuit breaker state.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    #[default]
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl CircuitState {
    /// Healthy providers receive traffic: Closed and Half-Open.
    pub fn is_healthy(self) -> bool {
        self != CircuitState::Open
    }
}

impl From<u8> for CircuitState {
    fn from(val: u8) -> Self {
        match val {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

/// A state change caused by a single breaker update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: CircuitState,
    pub to: CircuitState,
}

impl Transition {
    /// True when the transition flips the healthy verdict.
    pub fn health_changed(&self) -> bool {
        self.from.is_healthy() != self.to.is_healthy()
    }
}

/// Per-provider circuit breaker state machine.
#[derive(Debug, Clone, Default)]
pub struct CircuitBreaker {
    state: CircuitState,
    opened_at: Option<Instant>,
    half_open_attempts: u32,
    consecutive_failures: u32,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn opened_at(&self) -> Option<Instant> {
        self.opened_at
    }

    pub fn half_open_attempts(&self) -> u32 {
        self.half_open_attempts
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Report a successful call.
    pub fn on_success(&mut self, config: &CircuitBreakerConfig) -> Option<Transition> {
        self.consecutive_failures = 0;

        if self.state != CircuitState::HalfOpen {
            return None;
        }

        self.half_open_attempts += 1;
        if self.half_open_attempts >= config.half_open_max_attempts {
            return self.transition(CircuitState::Closed);
        }
        None
    }

    /// Report a failed call.
    pub fn on_failure(&mut self, now: Instant, config: &CircuitBreakerConfig) -> Option<Transition> {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        match self.state {
            CircuitState::Closed if self.consecutive_failures >= config.failure_threshold => {
                self.opened_at = Some(now);
                self.transition(CircuitState::Open)
            }
            CircuitState::HalfOpen => {
                self.half_open_attempts += 1;
                self.opened_at = Some(now);
                self.transition(CircuitState::Open)
            }
            _ => None,
        }
    }

    /// Promote an open circuit to half-open once its cooldown has elapsed.
    pub fn poll(&mut self, now: Instant, config: &CircuitBreakerConfig) -> Option<Transition> {
        if self.state != CircuitState::Open {
            return None;
        }
        let opened_at = self.opened_at?;
        if now.saturating_duration_since(opened_at) < config.open_cooldown() {
            return None;
        }
        self.transition(CircuitState::HalfOpen)
    }

    /// Return to a pristine closed breaker.
    pub fn reset(&mut self) -> Option<Transition> {
        let transition = self.transition(CircuitState::Closed);
        *self = Self::default();
        transition
    }

    fn transition(&mut self, to: CircuitState) -> Option<Transition> {
        let from = self.state;
        if from == to {
            return None;
        }
        self.state = to;
        match to {
            CircuitState::HalfOpen => self.half_open_attempts = 0,
            CircuitState::Closed => {
                self.half_open_attempts = 0;
                self.consecutive_failures = 0;
                self.opened_at = None;
            }
            CircuitState::Open => {}
        }
        Some(Transition { from, to })
    }
}
