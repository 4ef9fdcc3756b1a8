//! Fallback execution across interchangeable providers.
//!
//! # Per-call state machine
//! ```text
//! NotStarted
//!     → no candidates: return failure (attempt_count = 0, no errors)
//!     → Attempting(0)
//! Attempting(i)
//!     → success: record success, return Succeeded
//!     → non-retryable failure: return Aborted
//!     → retryable failure, candidates left: record, back off, Attempting(i + 1)
//!     → retryable failure, none left: return Exhausted
//! ```
//!
//! # Design Decisions
//! - Provider failures never escape; they are collected in the result
//! - Each attempt is measured by an operation tracker
//! - Cancelled attempts are abandoned, not counted against the provider
//! - Backoff waits yield to the runtime and observe cancellation

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::error::{AttemptError, ProviderError};
use crate::observability::metrics;
use crate::provider::Provider;
use crate::resilience::backoff::backoff_for;
use crate::resilience::retries::should_retry;
use crate::resilience::timeouts::{cancellable, sleep_or_cancel, with_deadline};
use crate::selection::{ProviderSelector, SelectionContext};
use crate::store::MetricsStore;

/// Outcome of one fallback execution.
#[derive(Debug)]
pub struct FallbackResult<T> {
    pub is_success: bool,
    /// Present iff `is_success`.
    pub result: Option<T>,
    /// Providers tried; 0 when no candidate was available.
    pub attempt_count: usize,
    /// One entry per failed attempt, in order.
    pub errors: Vec<AttemptError>,
    /// Present iff `is_success`.
    pub successful_provider_id: Option<String>,
    /// Set when the caller's token stopped the execution, whether during a
    /// provider call or while backing off between providers.
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl<T> FallbackResult<T> {
    fn no_providers() -> Self {
        Self {
            is_success: false,
            result: None,
            attempt_count: 0,
            errors: Vec::new(),
            successful_provider_id: None,
            cancelled: false,
            elapsed: Duration::ZERO,
        }
    }

    fn succeeded(value: T, attempt_count: usize, errors: Vec<AttemptError>, provider_id: &str, elapsed: Duration) -> Self {
        Self {
            is_success: true,
            result: Some(value),
            attempt_count,
            errors,
            successful_provider_id: Some(provider_id.to_string()),
            cancelled: false,
            elapsed,
        }
    }

    fn failed(attempt_count: usize, errors: Vec<AttemptError>, elapsed: Duration) -> Self {
        Self {
            is_success: false,
            result: None,
            attempt_count,
            errors,
            successful_provider_id: None,
            cancelled: false,
            elapsed,
        }
    }

    fn interrupted(attempt_count: usize, errors: Vec<AttemptError>, elapsed: Duration) -> Self {
        Self {
            cancelled: true,
            ..Self::failed(attempt_count, errors, elapsed)
        }
    }

    /// The error that ended a failed execution.
    pub fn last_error(&self) -> Option<&AttemptError> {
        self.errors.last()
    }

    /// True when the execution stopped because the caller cancelled it.
    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Convert into a plain `Result`, keeping the attempt errors on failure.
    pub fn into_result(self) -> Result<T, Vec<AttemptError>> {
        match self.result {
            Some(value) if self.is_success => Ok(value),
            _ => Err(self.errors),
        }
    }
}

/// Executes operations against ordered candidates until one succeeds.
#[derive(Debug, Clone)]
pub struct FallbackExecutor {
    store: MetricsStore,
}

impl FallbackExecutor {
    pub fn new(store: MetricsStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &MetricsStore {
        &self.store
    }

    /// Try `operation` against `providers` in order.
    pub async fn execute_with_fallback<P, T, F, Fut>(
        &self,
        providers: &[Arc<P>],
        cancel: &CancellationToken,
        operation: F,
    ) -> FallbackResult<T>
    where
        P: Provider + ?Sized,
        F: FnMut(Arc<P>, CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let execution_id = Uuid::new_v4();
        let span = tracing::info_span!("fallback", %execution_id, candidates = providers.len());
        self.run(providers, cancel, operation).instrument(span).await
    }

    /// Same semantics as [`execute_with_fallback`](Self::execute_with_fallback)
    /// for operations that produce no value.
    pub async fn execute_void_with_fallback<P, F, Fut>(
        &self,
        providers: &[Arc<P>],
        cancel: &CancellationToken,
        operation: F,
    ) -> FallbackResult<()>
    where
        P: Provider + ?Sized,
        F: FnMut(Arc<P>, CancellationToken) -> Fut,
        Fut: Future<Output = Result<(), ProviderError>>,
    {
        self.execute_with_fallback(providers, cancel, operation).await
    }

    /// Order candidates with `selector`, then execute with fallback.
    pub async fn execute_selected<P, T, F, Fut>(
        &self,
        selector: &dyn ProviderSelector<P>,
        providers: &[Arc<P>],
        ctx: Option<&SelectionContext>,
        cancel: &CancellationToken,
        operation: F,
    ) -> FallbackResult<T>
    where
        P: Provider + ?Sized,
        F: FnMut(Arc<P>, CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let ordered = selector.select_many(providers, providers.len(), ctx);
        tracing::debug!(
            strategy = selector.name(),
            offered = providers.len(),
            selected = ordered.len(),
            "Candidates ordered for fallback"
        );
        self.execute_with_fallback(&ordered, cancel, operation).await
    }

    async fn run<P, T, F, Fut>(
        &self,
        providers: &[Arc<P>],
        cancel: &CancellationToken,
        mut operation: F,
    ) -> FallbackResult<T>
    where
        P: Provider + ?Sized,
        F: FnMut(Arc<P>, CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let clock = self.store.clock().clone();
        let started = clock.now();
        let elapsed = || clock.now().saturating_duration_since(started);

        if providers.is_empty() {
            tracing::debug!("No providers available");
            metrics::record_fallback("no_providers", 0);
            return FallbackResult::no_providers();
        }

        // One config snapshot for the whole call.
        let config = self.store.config().load_full();
        let retry = &config.retry;
        let limit = match retry.max_attempts {
            0 => providers.len(),
            n => n.min(providers.len()),
        };

        let mut errors: Vec<AttemptError> = Vec::new();
        let mut index = 0;

        while index < limit {
            let attempt = index + 1;
            let provider = &providers[index];
            let provider_id = provider.id();

            let error = match self.store.start_operation(provider_id) {
                Ok(tracker) => {
                    let call = operation(provider.clone(), cancel.child_token());
                    match cancellable(cancel, with_deadline(retry.attempt_timeout(), call)).await {
                        Ok(value) => {
                            let latency = tracker.complete();
                            tracing::info!(
                                provider_id = %provider_id,
                                attempt,
                                latency_ms = latency.as_millis() as u64,
                                "Provider call succeeded"
                            );
                            metrics::record_fallback("success", attempt);
                            return FallbackResult::succeeded(value, attempt, errors, provider_id, elapsed());
                        }
                        Err(ProviderError::Cancelled) => {
                            tracker.abandon();
                            ProviderError::Cancelled
                        }
                        Err(error) => {
                            tracker.fail(&error);
                            error
                        }
                    }
                }
                // Unusable id: nothing to record against, but other candidates may work.
                Err(e) => ProviderError::operation(e),
            };

            let retryable = should_retry(&error);
            tracing::warn!(
                provider_id = %provider_id,
                attempt,
                error = %error,
                retryable,
                "Provider call failed"
            );
            errors.push(AttemptError {
                attempt,
                provider_id: provider_id.to_string(),
                error,
            });

            if !retryable {
                if cancel.is_cancelled() {
                    metrics::record_fallback("cancelled", attempt);
                    return FallbackResult::interrupted(attempt, errors, elapsed());
                }
                metrics::record_fallback("aborted", attempt);
                return FallbackResult::failed(attempt, errors, elapsed());
            }

            index += 1;
            if index < limit {
                let delay = backoff_for(attempt as u32, retry);
                tracing::debug!(attempt, delay = ?delay, next_provider = %providers[index].id(), "Backing off before next provider");
                if sleep_or_cancel(cancel, delay).await.is_err() {
                    // The next provider is never invoked, so it is not an attempt.
                    tracing::info!(attempts = index, "Fallback cancelled during backoff");
                    metrics::record_fallback("cancelled", index);
                    return FallbackResult::interrupted(index, errors, elapsed());
                }
            }
        }

        tracing::error!(attempts = limit, "All providers failed");
        metrics::record_fallback("exhausted", limit);
        FallbackResult::failed(limit, errors, elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::config::{self, ResilienceConfig};
    use crate::health::HealthEvents;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Named(&'static str);

    impl Provider for Named {
        fn id(&self) -> &str {
            self.0
        }
    }

    fn providers(ids: &[&'static str]) -> Vec<Arc<Named>> {
        ids.iter().map(|id| Arc::new(Named(id))).collect()
    }

    fn executor_with(config: ResilienceConfig) -> FallbackExecutor {
        FallbackExecutor::new(MetricsStore::new(
            config::shared(config),
            Arc::new(SystemClock),
            HealthEvents::new(),
        ))
    }

    fn executor() -> FallbackExecutor {
        executor_with(ResilienceConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_falls_back_to_second_provider() {
        let exec = executor();
        let candidates = providers(&["failing", "healthy"]);

        let result = exec
            .execute_with_fallback(&candidates, &CancellationToken::new(), |p, _| async move {
                match p.id() {
                    "failing" => Err(ProviderError::Transport("connection refused".into())),
                    _ => Ok(42),
                }
            })
            .await;

        assert!(result.is_success);
        assert_eq!(result.result, Some(42));
        assert_eq!(result.attempt_count, 2);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].provider_id, "failing");
        assert_eq!(result.successful_provider_id.as_deref(), Some("healthy"));

        let store = exec.store();
        assert_eq!(store.get_metrics("failing").unwrap().failure_count, 1);
        assert_eq!(store.get_metrics("healthy").unwrap().success_count, 1);
    }

    #[tokio::test]
    async fn test_empty_candidates() {
        let exec = executor();
        let candidates: Vec<Arc<Named>> = Vec::new();
        let result = exec
            .execute_with_fallback(&candidates, &CancellationToken::new(), |_, _| async { Ok(()) })
            .await;

        assert!(!result.is_success);
        assert_eq!(result.attempt_count, 0);
        assert!(result.errors.is_empty());
        assert!(result.result.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_all_candidates() {
        let exec = executor();
        let candidates = providers(&["a", "b", "c"]);
        let result: FallbackResult<()> = exec
            .execute_with_fallback(&candidates, &CancellationToken::new(), |_, _| async {
                Err(ProviderError::Timeout(Duration::from_secs(1)))
            })
            .await;

        assert!(!result.is_success);
        assert_eq!(result.attempt_count, 3);
        let order: Vec<_> = result.errors.iter().map(|e| e.provider_id.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
        assert_eq!(result.errors[2].attempt, 3);
    }

    #[tokio::test]
    async fn test_non_retryable_aborts() {
        let exec = executor();
        let candidates = providers(&["a", "b"]);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let result: FallbackResult<()> = exec
            .execute_with_fallback(&candidates, &CancellationToken::new(), move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(ProviderError::InvalidInput("missing field".into())) }
            })
            .await;

        assert!(!result.is_success);
        assert_eq!(result.attempt_count, 1);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(exec.store().get_metrics("b").unwrap().request_count, 0);
        assert!(!result.was_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let mut cfg = ResilienceConfig::default();
        cfg.retry.base_delay_ms = 60_000;
        cfg.retry.max_delay_ms = 60_000;
        let exec = executor_with(cfg);
        let candidates = providers(&["a", "b"]);
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            trigger.cancel();
        });

        let result: FallbackResult<()> = exec
            .execute_with_fallback(&candidates, &token, |_, _| async {
                Err(ProviderError::Transport("reset".into()))
            })
            .await;

        assert!(result.cancelled);
        assert!(result.was_cancelled());
        assert_eq!(result.attempt_count, 1);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.last_error().unwrap().provider_id, "a");
        assert!(matches!(result.last_error().unwrap().error, ProviderError::Transport(_)));
        // "b" was never called
        assert_eq!(exec.store().get_metrics("b").unwrap().request_count, 0);
        assert_eq!(exec.store().get_metrics("a").unwrap().failure_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_call_is_not_counted() {
        let exec = executor();
        let candidates = providers(&["slow", "b"]);
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            trigger.cancel();
        });

        let result = exec
            .execute_with_fallback(&candidates, &token, |_, inner: CancellationToken| async move {
                inner.cancelled().await;
                Ok(())
            })
            .await;

        assert!(result.was_cancelled());
        assert_eq!(result.attempt_count, 1);
        assert_eq!(exec.store().get_metrics("slow").unwrap().request_count, 0);
        assert_eq!(exec.store().in_flight("slow"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_timeout_moves_on() {
        let mut cfg = ResilienceConfig::default();
        cfg.retry.attempt_timeout_ms = 100;
        let exec = executor_with(cfg);
        let candidates = providers(&["hangs", "fast"]);

        let result = exec
            .execute_with_fallback(&candidates, &CancellationToken::new(), |p, _| async move {
                if p.id() == "hangs" {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                }
                Ok(p.id().to_string())
            })
            .await;

        assert_eq!(result.result.as_deref(), Some("fast"));
        assert!(matches!(result.errors[0].error, ProviderError::Timeout(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_attempts_caps_candidates() {
        let mut cfg = ResilienceConfig::default();
        cfg.retry.max_attempts = 2;
        let exec = executor_with(cfg);
        let candidates = providers(&["a", "b", "c"]);

        let result: FallbackResult<()> = exec
            .execute_void_with_fallback(&candidates, &CancellationToken::new(), |_, _| async {
                Err(ProviderError::operation("boom"))
            })
            .await;

        assert_eq!(result.attempt_count, 2);
        assert_eq!(exec.store().get_metrics("c").unwrap().request_count, 0);
    }

    #[tokio::test]
    async fn test_void_success() {
        let exec = executor();
        let candidates = providers(&["a"]);
        let result = exec
            .execute_void_with_fallback(&candidates, &CancellationToken::new(), |_, _| async { Ok(()) })
            .await;
        assert!(result.is_success);
        assert_eq!(result.successful_provider_id.as_deref(), Some("a"));
        assert!(result.into_result().is_ok());
    }
}
