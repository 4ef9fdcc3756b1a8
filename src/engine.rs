//! Engine facade wiring the subsystems together.
//!
//! # Responsibilities
//! - Build store, evaluator, executor and reporter over one shared config
//! - Pick the default selector from `[selection] strategy`
//! - Apply validated configuration updates while calls are in flight

use arc_swap::ArcSwap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::clock::{SharedClock, SystemClock};
use crate::config::{self, validate_config, ConfigError, ResilienceConfig, SharedConfig};
use crate::error::{MetricsResult, ProviderError};
use crate::health::{HealthEvaluator, HealthEvents, ProviderHealth, ProviderHealthChanged};
use crate::provider::Provider;
use crate::report::{LoadDistribution, LoadDistributionReporter};
use crate::resilience::{FallbackExecutor, FallbackResult};
use crate::selection::{build_selector, ProviderSelector, SelectionContext, SelectionStrategy};
use crate::store::MetricsStore;

type SelectorSlot<P> = Arc<ArcSwap<Arc<dyn ProviderSelector<P>>>>;

/// Resilience engine for one logical service backed by providers of type `P`.
///
/// Cloning is cheap; clones share metrics, circuit state and configuration.
pub struct ResilienceEngine<P: Provider + ?Sized + 'static> {
    config: SharedConfig,
    store: MetricsStore,
    evaluator: HealthEvaluator,
    executor: FallbackExecutor,
    reporter: LoadDistributionReporter,
    selector: SelectorSlot<P>,
}

impl<P: Provider + ?Sized + 'static> ResilienceEngine<P> {
    /// Create an engine on the wall clock.
    pub fn new(config: ResilienceConfig) -> Result<Self, ConfigError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create an engine with an explicit time source.
    pub fn with_clock(config: ResilienceConfig, clock: SharedClock) -> Result<Self, ConfigError> {
        validate_config(&config).map_err(ConfigError::Validation)?;
        let strategy = config.selection.strategy;
        let shared = config::shared(config);

        let store = MetricsStore::new(shared.clone(), clock, HealthEvents::new());
        let evaluator = HealthEvaluator::new(store.clone());
        let executor = FallbackExecutor::new(store.clone());
        let reporter = LoadDistributionReporter::new(store.clone());
        let selector = Arc::new(ArcSwap::from_pointee(build_selector::<P>(strategy, evaluator.clone())));

        tracing::info!(strategy = %strategy, "Resilience engine initialized");

        Ok(Self {
            config: shared,
            store,
            evaluator,
            executor,
            reporter,
            selector,
        })
    }

    pub fn store(&self) -> &MetricsStore {
        &self.store
    }

    pub fn evaluator(&self) -> &HealthEvaluator {
        &self.evaluator
    }

    pub fn executor(&self) -> &FallbackExecutor {
        &self.executor
    }

    /// Current configuration snapshot.
    pub fn config(&self) -> Arc<ResilienceConfig> {
        self.config.load_full()
    }

    pub fn strategy(&self) -> SelectionStrategy {
        self.config.load().selection.strategy
    }

    /// The selector for the configured strategy.
    pub fn selector(&self) -> Arc<dyn ProviderSelector<P>> {
        self.selector.load_full().as_ref().clone()
    }

    pub fn select_one(&self, providers: &[Arc<P>], ctx: Option<&SelectionContext>) -> Option<Arc<P>> {
        self.selector().select_one(providers, ctx)
    }

    pub fn select_many(&self, providers: &[Arc<P>], count: usize, ctx: Option<&SelectionContext>) -> Vec<Arc<P>> {
        self.selector().select_many(providers, count, ctx)
    }

    /// Order healthy candidates with the configured strategy and run with fallback.
    pub async fn execute<T, F, Fut>(
        &self,
        providers: &[Arc<P>],
        ctx: Option<&SelectionContext>,
        cancel: &CancellationToken,
        operation: F,
    ) -> FallbackResult<T>
    where
        F: FnMut(Arc<P>, CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let selector = self.selector();
        self.executor
            .execute_selected(selector.as_ref(), providers, ctx, cancel, operation)
            .await
    }

    /// [`execute`](Self::execute) for operations without a result value.
    pub async fn execute_void<F, Fut>(
        &self,
        providers: &[Arc<P>],
        ctx: Option<&SelectionContext>,
        cancel: &CancellationToken,
        operation: F,
    ) -> FallbackResult<()>
    where
        F: FnMut(Arc<P>, CancellationToken) -> Fut,
        Fut: Future<Output = Result<(), ProviderError>>,
    {
        self.execute(providers, ctx, cancel, operation).await
    }

    /// Run with fallback over `providers` in the given order, unhealthy ones included.
    pub async fn execute_ordered<T, F, Fut>(
        &self,
        providers: &[Arc<P>],
        cancel: &CancellationToken,
        operation: F,
    ) -> FallbackResult<T>
    where
        F: FnMut(Arc<P>, CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        self.executor.execute_with_fallback(providers, cancel, operation).await
    }

    pub fn is_healthy(&self, provider_id: &str) -> MetricsResult<bool> {
        self.evaluator.is_healthy(provider_id)
    }

    pub fn health_score(&self, provider_id: &str) -> MetricsResult<f64> {
        self.evaluator.health_score(provider_id)
    }

    /// Health of every provider the engine has observed, ordered by id.
    pub fn health_report(&self) -> Vec<ProviderHealth> {
        self.store
            .provider_ids()
            .iter()
            .filter_map(|id| self.evaluator.provider_health(id).ok())
            .collect()
    }

    pub fn load_distribution(&self) -> LoadDistribution {
        self.reporter.distribution()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProviderHealthChanged> {
        self.store.subscribe()
    }

    /// Validate and publish a new configuration.
    ///
    /// Calls already running keep the snapshot they started with. A changed
    /// selection strategy replaces the selector, which restarts its rotation.
    pub fn apply_config(&self, new_config: ResilienceConfig) -> Result<(), ConfigError> {
        validate_config(&new_config).map_err(ConfigError::Validation)?;

        let previous = self.config.load_full();
        if previous.selection.strategy != new_config.selection.strategy {
            tracing::info!(
                from = %previous.selection.strategy,
                to = %new_config.selection.strategy,
                "Selection strategy changed"
            );
            self.selector.store(Arc::new(build_selector::<P>(
                new_config.selection.strategy,
                self.evaluator.clone(),
            )));
        }

        self.config.store(Arc::new(new_config));
        tracing::info!("Configuration applied");
        Ok(())
    }

    /// Apply configurations from `updates` until the sender is dropped.
    pub fn watch_config(&self, mut updates: mpsc::UnboundedReceiver<ResilienceConfig>) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            while let Some(new_config) = updates.recv().await {
                if let Err(e) = engine.apply_config(new_config) {
                    tracing::error!(error = %e, "Rejected configuration update, keeping current configuration");
                }
            }
            tracing::debug!("Configuration update channel closed");
        })
    }
}

impl<P: Provider + ?Sized + 'static> Clone for ResilienceEngine<P> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            store: self.store.clone(),
            evaluator: self.evaluator.clone(),
            executor: self.executor.clone(),
            reporter: self.reporter.clone(),
            selector: self.selector.clone(),
        }
    }
}

impl<P: Provider + ?Sized + 'static> fmt::Debug for ResilienceEngine<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilienceEngine")
            .field("strategy", &self.strategy())
            .field("providers", &self.store.provider_ids())
            .finish()
    }
}
