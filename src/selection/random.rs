//! Random selection strategy.

use rand::seq::SliceRandom;
use std::sync::Arc;

use crate::health::HealthEvaluator;
use crate::provider::Provider;
use crate::selection::{healthy_candidates, ProviderSelector, SelectionContext};

/// Uniform random pick among healthy providers, re-rolled every call.
#[derive(Debug, Clone)]
pub struct RandomSelector {
    evaluator: HealthEvaluator,
}

impl RandomSelector {
    pub fn new(evaluator: HealthEvaluator) -> Self {
        Self { evaluator }
    }
}

impl<P: Provider + ?Sized> ProviderSelector<P> for RandomSelector {
    fn name(&self) -> &'static str {
        "random"
    }

    fn select_one(&self, providers: &[Arc<P>], ctx: Option<&SelectionContext>) -> Option<Arc<P>> {
        let healthy = healthy_candidates(&self.evaluator, providers, ctx);
        healthy.choose(&mut rand::thread_rng()).cloned()
    }

    /// Sample without replacement; returns `min(count, healthy)` providers.
    fn select_many(&self, providers: &[Arc<P>], count: usize, ctx: Option<&SelectionContext>) -> Vec<Arc<P>> {
        let healthy = healthy_candidates(&self.evaluator, providers, ctx);
        healthy
            .choose_multiple(&mut rand::thread_rng(), count)
            .cloned()
            .collect()
    }
}
