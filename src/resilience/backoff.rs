//! Exponential backoff with jitter.

use std::time::Duration;
use rand::Rng;

use crate::config::RetryConfig;

/// Calculate exponential backoff delay with jitter.
///
/// `attempt` is the 1-indexed attempt that just failed, so the delay before
/// the second attempt uses `attempt = 1`. The exponential part is
/// `base_ms * 2^(attempt-1)`, capped at `max_ms` when `max_ms` is non-zero;
/// jitter then adds up to `jitter_fraction` of that value.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64, jitter_fraction: f64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = if max_ms == 0 { delay_ms } else { delay_ms.min(max_ms) };

    let jitter = if jitter_fraction > 0.0 {
        rand::thread_rng().gen_range(0.0..=jitter_fraction)
    } else {
        0.0
    };

    let nanos = (capped_delay as f64 * 1_000_000.0 * (1.0 + jitter)).round();
    if nanos < u64::MAX as f64 {
        Duration::from_nanos(nanos as u64)
    } else {
        Duration::MAX
    }
}

/// Backoff for `attempt` using retry configuration.
pub fn backoff_for(attempt: u32, config: &RetryConfig) -> Duration {
    calculate_backoff(attempt, config.base_delay_ms, config.max_delay_ms, config.jitter_fraction)
}
