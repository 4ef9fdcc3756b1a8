//! Least-loaded selection strategy.

use std::sync::Arc;

use crate::health::HealthEvaluator;
use crate::provider::Provider;
use crate::selection::{healthy_candidates, ProviderSelector, SelectionContext};

/// Least-loaded selector.
/// Selects the healthy provider with the fewest in-flight operations.
#[derive(Debug, Clone)]
pub struct LeastLoaded {
    evaluator: HealthEvaluator,
}

impl LeastLoaded {
    pub fn new(evaluator: HealthEvaluator) -> Self {
        Self { evaluator }
    }

    fn load(&self, provider_id: &str) -> usize {
        self.evaluator.store().in_flight(provider_id)
    }
}

impl<P: Provider + ?Sized> ProviderSelector<P> for LeastLoaded {
    fn name(&self) -> &'static str {
        "least_loaded"
    }

    fn select_one(&self, providers: &[Arc<P>], ctx: Option<&SelectionContext>) -> Option<Arc<P>> {
        // In case of tie, the first one is selected (stability)
        healthy_candidates(&self.evaluator, providers, ctx)
            .into_iter()
            .min_by_key(|p| self.load(p.id()))
    }

    fn select_many(&self, providers: &[Arc<P>], count: usize, ctx: Option<&SelectionContext>) -> Vec<Arc<P>> {
        let mut healthy: Vec<(usize, Arc<P>)> = healthy_candidates(&self.evaluator, providers, ctx)
            .into_iter()
            .map(|p| (self.load(p.id()), p))
            .collect();
        healthy.sort_by_key(|(load, _)| *load);
        healthy.into_iter().take(count).map(|(_, p)| p).collect()
    }
}
