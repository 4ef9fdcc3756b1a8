//! Error taxonomy for the engine.
//!
//! Two families of errors flow through the crate:
//! - [`MetricsError`]: programmer errors raised immediately by the metrics
//!   store and health evaluator (empty provider ids, missing causes).
//! - [`ProviderError`]: runtime failures of provider calls. These are
//!   captured by the fallback executor and never propagate out of it.

use std::time::Duration;
use thiserror::Error;

/// Errors raised by the metrics store and health evaluator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MetricsError {
    /// The provider id was empty or whitespace.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A failure was reported without a cause.
    #[error("Missing error: {0}")]
    MissingError(String),
}

/// Result type for metrics store operations.
pub type MetricsResult<T> = Result<T, MetricsError>;

/// Failure of a single provider call.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The call did not complete within the attempt deadline.
    #[error("Provider call timed out after {0:?}")]
    Timeout(Duration),

    /// Connectivity or transport failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The request itself was malformed; no provider can serve it.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The caller cancelled the operation.
    #[error("Operation cancelled")]
    Cancelled,

    /// Explicitly marked as not worth retrying elsewhere.
    #[error("Non-retryable failure: {0}")]
    NonRetryable(String),

    /// Any other failure raised by the provider.
    #[error("Provider operation failed: {0}")]
    Operation(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ProviderError {
    /// Wrap an arbitrary error as a retryable provider operation failure.
    pub fn operation<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        ProviderError::Operation(err.into())
    }

    /// Short, stable label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::Timeout(_) => "timeout",
            ProviderError::Transport(_) => "transport",
            ProviderError::InvalidInput(_) => "invalid_input",
            ProviderError::Cancelled => "cancelled",
            ProviderError::NonRetryable(_) => "non_retryable",
            ProviderError::Operation(_) => "operation",
        }
    }
}

/// A failed attempt recorded during fallback execution.
#[derive(Debug, Error)]
#[error("Attempt {attempt} on provider '{provider_id}' failed: {error}")]
pub struct AttemptError {
    /// 1-indexed attempt number within the call.
    pub attempt: usize,
    /// Identity of the provider that failed.
    pub provider_id: String,
    /// The underlying failure.
    #[source]
    pub error: ProviderError,
}

/// Validate a provider id, rejecting empty or whitespace-only keys.
pub(crate) fn validate_provider_id(provider_id: &str) -> MetricsResult<()> {
    if provider_id.trim().is_empty() {
        return Err(MetricsError::InvalidArgument(
            "provider id must not be empty".to_string(),
        ));
    }
    Ok(())
}
