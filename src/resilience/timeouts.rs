//! Deadline and cancellation enforcement.
//!
//! # Responsibilities
//! - Wrap provider calls with an optional per-attempt deadline
//! - Race calls and backoff waits against the caller's cancellation token
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeouts surface as retryable `ProviderError::Timeout`
//! - Cancellation surfaces as non-retryable `ProviderError::Cancelled`
//!   and wins over a simultaneously completed call

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;

/// Run `fut` under an optional deadline.
pub async fn with_deadline<F, T>(deadline: Option<Duration>, fut: F) -> Result<T, ProviderError>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    match deadline {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(limit)),
        },
        None => fut.await,
    }
}

/// Run `fut` unless `token` is cancelled first.
pub async fn cancellable<F, T>(token: &CancellationToken, fut: F) -> Result<T, ProviderError>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(ProviderError::Cancelled),
        result = fut => result,
    }
}

/// Sleep for `delay`, waking early with `Cancelled` if the token fires.
pub async fn sleep_or_cancel(token: &CancellationToken, delay: Duration) -> Result<(), ProviderError> {
    cancellable(token, async {
        tokio::time::sleep(delay).await;
        Ok(())
    })
    .await
}
