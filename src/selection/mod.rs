//! Provider selection subsystem.
//!
//! # Data Flow
//! ```text
//! Caller passes candidate providers
//!     → filter: health evaluator reports healthy, not excluded by context
//!     → Apply selection algorithm:
//!         - performance.rs (highest health score)
//!         - round_robin.rs (rotate through healthy providers)
//!         - random.rs (uniform pick / sample without replacement)
//!         - least_loaded.rs (fewest in-flight operations)
//!     → Return one provider, or an ordered list for fallback
//! ```
//!
//! # Design Decisions
//! - Candidates are explicit arguments; selectors hold no provider registry
//! - Unhealthy providers are never returned, even if nothing else is left
//! - Algorithm chosen per selector instance

pub mod least_loaded;
pub mod performance;
pub mod random;
pub mod round_robin;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::health::HealthEvaluator;
use crate::provider::Provider;

pub use least_loaded::LeastLoaded;
pub use performance::PerformanceBased;
pub use random::RandomSelector;
pub use round_robin::RoundRobin;

/// Per-call selection hints.
#[derive(Debug, Clone, Default)]
pub struct SelectionContext {
    /// Provider ids that must not be selected for this call.
    pub exclude: HashSet<String>,
}

impl SelectionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn excluding(mut self, provider_id: impl Into<String>) -> Self {
        self.exclude.insert(provider_id.into());
        self
    }

    fn allows(&self, provider_id: &str) -> bool {
        !self.exclude.contains(provider_id)
    }
}

/// Strategy for choosing among interchangeable providers.
pub trait ProviderSelector<P: Provider + ?Sized>: Send + Sync {
    /// Strategy name for logs.
    fn name(&self) -> &'static str;

    /// Pick one healthy provider, or none if no candidate is healthy.
    fn select_one(&self, providers: &[Arc<P>], ctx: Option<&SelectionContext>) -> Option<Arc<P>>;

    /// Pick up to `count` distinct healthy providers, best first.
    fn select_many(&self, providers: &[Arc<P>], count: usize, ctx: Option<&SelectionContext>) -> Vec<Arc<P>>;
}

/// Candidates the evaluator reports healthy and the context allows, in input order.
pub(crate) fn healthy_candidates<P: Provider + ?Sized>(
    evaluator: &HealthEvaluator,
    providers: &[Arc<P>],
    ctx: Option<&SelectionContext>,
) -> Vec<Arc<P>> {
    providers
        .iter()
        .filter(|p| ctx.map_or(true, |c| c.allows(p.id())))
        .filter(|p| match evaluator.is_healthy(p.id()) {
            Ok(healthy) => healthy,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping provider with invalid id");
                false
            }
        })
        .cloned()
        .collect()
}

/// Selection algorithm names accepted in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    #[default]
    Performance,
    RoundRobin,
    Random,
    LeastLoaded,
}

impl SelectionStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            SelectionStrategy::Performance => "performance",
            SelectionStrategy::RoundRobin => "round_robin",
            SelectionStrategy::Random => "random",
            SelectionStrategy::LeastLoaded => "least_loaded",
        }
    }
}

impl fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SelectionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "performance" => Ok(SelectionStrategy::Performance),
            "round_robin" => Ok(SelectionStrategy::RoundRobin),
            "random" => Ok(SelectionStrategy::Random),
            "least_loaded" => Ok(SelectionStrategy::LeastLoaded),
            other => Err(format!("unknown selection strategy '{}'", other)),
        }
    }
}

/// Build a selector for the given strategy.
pub fn build_selector<P>(strategy: SelectionStrategy, evaluator: HealthEvaluator) -> Arc<dyn ProviderSelector<P>>
where
    P: Provider + ?Sized + 'static,
{
    match strategy {
        SelectionStrategy::Performance => Arc::new(PerformanceBased::new(evaluator)),
        SelectionStrategy::RoundRobin => Arc::new(RoundRobin::new(evaluator)),
        SelectionStrategy::Random => Arc::new(RandomSelector::new(evaluator)),
        SelectionStrategy::LeastLoaded => Arc::new(LeastLoaded::new(evaluator)),
    }
}
