//! Retry classification.
//!
//! # Design Decisions
//! - Never retry malformed input: every provider would reject it
//! - Never retry after cancellation: the caller no longer wants a result
//! - Explicit non-retryable markers are honoured
//! - Timeouts, transport and generic provider failures are retryable

use crate::error::ProviderError;

/// Whether a failed attempt should move on to the next candidate.
pub fn should_retry(error: &ProviderError) -> bool {
    match error {
        ProviderError::InvalidInput(_) | ProviderError::Cancelled | ProviderError::NonRetryable(_) => false,
        ProviderError::Timeout(_) | ProviderError::Transport(_) | ProviderError::Operation(_) => true,
    }
}
