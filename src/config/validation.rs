//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds > 0, weights within 0..=1)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ResilienceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::ResilienceConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Dotted path of the offending field (e.g. `circuit.failure_threshold`).
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &ResilienceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.circuit.failure_threshold == 0 {
        errors.push(ValidationError::new("circuit.failure_threshold", "must be at least 1"));
    }
    if config.circuit.half_open_max_attempts == 0 {
        errors.push(ValidationError::new("circuit.half_open_max_attempts", "must be at least 1"));
    }

    let scoring = &config.scoring;
    if scoring.target_response_time_ms == 0 {
        errors.push(ValidationError::new("scoring.target_response_time_ms", "must be greater than 0"));
    }
    if !(0.0..=1.0).contains(&scoring.response_time_weight) {
        errors.push(ValidationError::new("scoring.response_time_weight", "must be within 0.0..=1.0"));
    }
    if !(scoring.history_bonus.is_finite() && scoring.history_bonus >= 1.0) {
        errors.push(ValidationError::new("scoring.history_bonus", "must be a finite value >= 1.0"));
    }
    if !(0.0..=1.0).contains(&scoring.recent_failure_penalty) {
        errors.push(ValidationError::new("scoring.recent_failure_penalty", "must be within 0.0..=1.0"));
    }

    let retry = &config.retry;
    if retry.max_delay_ms > 0 && retry.max_delay_ms < retry.base_delay_ms {
        errors.push(ValidationError::new("retry.max_delay_ms", "must be 0 (uncapped) or at least retry.base_delay_ms"));
    }
    if !(0.0..=1.0).contains(&retry.jitter_fraction) {
        errors.push(ValidationError::new("retry.jitter_fraction", "must be within 0.0..=1.0"));
    }

    if config.metrics.sample_capacity == 0 {
        errors.push(ValidationError::new("metrics.sample_capacity", "must be at least 1"));
    }

    let observability = &config.observability;
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a valid socket address", observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
