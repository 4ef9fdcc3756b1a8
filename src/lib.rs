//! Client-side provider resilience and selection.
//!
//! A logical service is backed by several interchangeable providers. This
//! crate decides which provider handles each call, tracks the outcome of every
//! call, isolates failing providers with a circuit breaker and falls back to
//! the next candidate when an attempt fails.
//!
//! # Architecture Overview
//!
//! ```text
//!     caller ──▶ engine ──▶ selection ──▶ resilience::fallback ──▶ provider call
//!                  │            │                 │
//!                  │            ▼                 ▼
//!                  │         health ◀──────── store (metrics, circuit breakers)
//!                  │            │                 │
//!                  ▼            ▼                 ▼
//!               config     health events       report
//! ```

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod health;
pub mod observability;
pub mod provider;
pub mod report;
pub mod resilience;
pub mod selection;
pub mod store;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::ResilienceConfig;
pub use engine::ResilienceEngine;
pub use error::{AttemptError, MetricsError, ProviderError};
pub use health::{HealthEvaluator, ProviderHealth, ProviderHealthChanged};
pub use provider::Provider;
pub use report::{LoadDistribution, LoadDistributionReporter, ProviderLoad};
pub use resilience::{CircuitState, FallbackExecutor, FallbackResult};
pub use selection::{ProviderSelector, SelectionContext, SelectionStrategy};
pub use store::{MetricsStore, OperationTracker, ProviderMetrics};
