//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the engine.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::selection::SelectionStrategy;

/// Root configuration for the resilience engine.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Circuit breaker thresholds.
    pub circuit: CircuitBreakerConfig,

    /// Health score composition.
    pub scoring: ScoringConfig,

    /// Fallback retry and backoff settings.
    pub retry: RetryConfig,

    /// Metrics store settings.
    pub metrics: MetricsConfig,

    /// Default provider selection strategy.
    pub selection: SelectionConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures (without an intervening success) that open the circuit.
    pub failure_threshold: u32,

    /// Seconds an open circuit waits before allowing trial calls.
    pub open_cooldown_secs: u64,

    /// Consecutive half-open successes required to close the circuit.
    pub half_open_max_attempts: u32,
}

impl CircuitBreakerConfig {
    pub fn open_cooldown(&self) -> Duration {
        Duration::from_secs(self.open_cooldown_secs)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            open_cooldown_secs: 30,
            half_open_max_attempts: 2,
        }
    }
}

/// Health score weighting.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ScoringConfig {
    /// Latency at which the full response-time penalty applies, in milliseconds.
    pub target_response_time_ms: u64,

    /// Weight of the latency penalty (0.0 - 1.0).
    pub response_time_weight: f64,

    /// Request count that must be exceeded before the history bonus applies.
    pub min_operations_for_history_bonus: u64,

    /// Multiplier for providers with an established history.
    pub history_bonus: f64,

    /// Multiplier applied when the latest operation failed recently.
    pub recent_failure_penalty: f64,

    /// How long a failure counts as "recent", in seconds.
    pub recent_failure_window_secs: u64,
}

impl ScoringConfig {
    pub fn target_response_time(&self) -> Duration {
        Duration::from_millis(self.target_response_time_ms)
    }

    pub fn recent_failure_window(&self) -> Duration {
        Duration::from_secs(self.recent_failure_window_secs)
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            target_response_time_ms: 100,
            response_time_weight: 0.3,
            min_operations_for_history_bonus: 10,
            history_bonus: 1.1,
            recent_failure_penalty: 0.5,
            recent_failure_window_secs: 300, // 5 minutes
        }
    }
}

/// Retry configuration for the fallback executor.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Delay before the second attempt, in milliseconds.
    pub base_delay_ms: u64,

    /// Upper bound for the exponential delay, in milliseconds (0 = uncapped).
    pub max_delay_ms: u64,

    /// Maximum extra jitter as a fraction of the delay (0.2 = up to +20%).
    pub jitter_fraction: f64,

    /// Maximum providers tried per call (0 = every candidate).
    pub max_attempts: usize,

    /// Per-attempt deadline in milliseconds (0 = no deadline).
    pub attempt_timeout_ms: u64,
}

impl RetryConfig {
    pub fn attempt_timeout(&self) -> Option<Duration> {
        (self.attempt_timeout_ms > 0).then(|| Duration::from_millis(self.attempt_timeout_ms))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 100,
            max_delay_ms: 0,
            jitter_fraction: 0.2,
            max_attempts: 0,
            attempt_timeout_ms: 0,
        }
    }
}

/// Metrics store configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    /// Latency samples kept per provider; oldest are evicted first.
    pub sample_capacity: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            sample_capacity: 100,
        }
    }
}

/// Selection configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct SelectionConfig {
    /// Strategy used by the engine's default selector.
    pub strategy: SelectionStrategy,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ResilienceConfig::default();
        assert_eq!(config.circuit.failure_threshold, 3);
        assert_eq!(config.circuit.half_open_max_attempts, 2);
        assert_eq!(config.scoring.target_response_time(), Duration::from_millis(100));
        assert_eq!(config.retry.attempt_timeout(), None);
        assert_eq!(config.selection.strategy, SelectionStrategy::Performance);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: ResilienceConfig = toml::from_str(
            r#"
            [circuit]
            failure_threshold = 5

            [selection]
            strategy = "round_robin"
            "#,
        )
        .unwrap();

        assert_eq!(config.circuit.failure_threshold, 5);
        assert_eq!(config.circuit.open_cooldown_secs, 30);
        assert_eq!(config.selection.strategy, SelectionStrategy::RoundRobin);
        assert_eq!(config.retry.base_delay_ms, 100);
    }
}
