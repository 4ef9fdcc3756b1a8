//! Performance-based selection strategy.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::health::HealthEvaluator;
use crate::provider::Provider;
use crate::selection::{healthy_candidates, ProviderSelector, SelectionContext};

/// Picks the healthy provider with the highest health score.
/// Ties go to the provider listed first.
#[derive(Debug, Clone)]
pub struct PerformanceBased {
    evaluator: HealthEvaluator,
}

impl PerformanceBased {
    pub fn new(evaluator: HealthEvaluator) -> Self {
        Self { evaluator }
    }

    fn scored<P: Provider + ?Sized>(
        &self,
        providers: &[Arc<P>],
        ctx: Option<&SelectionContext>,
    ) -> Vec<(f64, Arc<P>)> {
        healthy_candidates(&self.evaluator, providers, ctx)
            .into_iter()
            .map(|p| {
                let score = self.evaluator.health_score(p.id()).unwrap_or(0.0);
                (score, p)
            })
            .collect()
    }
}

impl<P: Provider + ?Sized> ProviderSelector<P> for PerformanceBased {
    fn name(&self) -> &'static str {
        "performance"
    }

    fn select_one(&self, providers: &[Arc<P>], ctx: Option<&SelectionContext>) -> Option<Arc<P>> {
        let mut best: Option<(f64, Arc<P>)> = None;
        for (score, provider) in self.scored(providers, ctx) {
            if best.as_ref().map_or(true, |(best_score, _)| score > *best_score) {
                best = Some((score, provider));
            }
        }
        best.map(|(_, p)| p)
    }

    fn select_many(&self, providers: &[Arc<P>], count: usize, ctx: Option<&SelectionContext>) -> Vec<Arc<P>> {
        let mut scored = self.scored(providers, ctx);
        // Stable sort keeps input order among equal scores.
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
        scored.into_iter().take(count).map(|(_, p)| p).collect()
    }
}
