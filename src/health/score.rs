//! Health score composition.
//!
//! ```text
//! score = success_rate * 100
//!       * (1 - response_time_weight * min(avg_latency / target, 1))
//!       * history_bonus            if request_count > min_operations_for_history_bonus
//!       * recent_failure_penalty   if the last operation failed within the window
//! clamped to [0, 100]
//! ```

use std::time::Instant;

use crate::config::ScoringConfig;
use crate::store::ProviderMetrics;

pub const MAX_SCORE: f64 = 100.0;

/// Score a provider snapshot. Never-observed providers score 100.
pub fn compute_score(metrics: &ProviderMetrics, config: &ScoringConfig, now: Instant) -> f64 {
    let mut score = metrics.success_rate * MAX_SCORE;

    if let Some(avg) = metrics.average_response_time {
        let target = config.target_response_time().as_secs_f64();
        if target > 0.0 {
            let normalized = (avg.as_secs_f64() / target).min(1.0);
            score *= 1.0 - config.response_time_weight * normalized;
        }
    }

    if metrics.request_count > config.min_operations_for_history_bonus {
        score *= config.history_bonus;
    }

    if metrics.failed_recently(now, config.recent_failure_window()) {
        score *= config.recent_failure_penalty;
    }

    score.clamp(0.0, MAX_SCORE)
}
