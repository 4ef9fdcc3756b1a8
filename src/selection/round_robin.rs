//! Round-robin selection strategy.

use std::sync::{Arc, Mutex};

use crate::health::HealthEvaluator;
use crate::provider::Provider;
use crate::selection::{healthy_candidates, ProviderSelector, SelectionContext};

/// Round-robin selector.
/// Rotates a cursor over the currently healthy candidates.
///
/// The cursor is taken modulo the healthy list length on every call, so when
/// the healthy set changes size between calls the rotation may skip or repeat
/// a provider once.
#[derive(Debug)]
pub struct RoundRobin {
    evaluator: HealthEvaluator,
    cursor: Mutex<usize>,
}

impl RoundRobin {
    pub fn new(evaluator: HealthEvaluator) -> Self {
        Self {
            evaluator,
            cursor: Mutex::new(0),
        }
    }

    /// Claim the next start position for a list of `len` candidates.
    fn advance(&self, len: usize) -> usize {
        let mut cursor = self.cursor.lock().unwrap_or_else(|e| e.into_inner());
        let start = *cursor % len;
        *cursor = start + 1;
        start
    }
}

impl<P: Provider + ?Sized> ProviderSelector<P> for RoundRobin {
    fn name(&self) -> &'static str {
        "round_robin"
    }

    fn select_one(&self, providers: &[Arc<P>], ctx: Option<&SelectionContext>) -> Option<Arc<P>> {
        let healthy = healthy_candidates(&self.evaluator, providers, ctx);
        if healthy.is_empty() {
            return None;
        }
        let index = self.advance(healthy.len());
        Some(healthy[index].clone())
    }

    fn select_many(&self, providers: &[Arc<P>], count: usize, ctx: Option<&SelectionContext>) -> Vec<Arc<P>> {
        let healthy = healthy_candidates(&self.evaluator, providers, ctx);
        if healthy.is_empty() || count == 0 {
            return Vec::new();
        }
        let len = healthy.len();
        let start = self.advance(len);
        (0..count.min(len))
            .map(|i| healthy[(start + i) % len].clone())
            .collect()
    }
}
