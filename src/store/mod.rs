//! Metrics store subsystem.
//!
//! # Data Flow
//! ```text
//! Fallback executor
//!     → registry.rs start_operation (tracker.rs holds in-flight count)
//!     → provider call
//!     → tracker completes / fails
//!     → registry.rs updates counters, samples.rs window, circuit breaker
//!     → health events published on transitions
//!
//! Readers (health evaluator, selectors, reporter):
//!     → registry.rs get_metrics
//!     → snapshot.rs ProviderMetrics (derived stats computed on read)
//! ```
//!
//! # Design Decisions
//! - The store is the only writer of provider metrics
//! - Locking is per provider, never store-wide
//! - Aggregates are computed on read to keep writes O(1)

pub mod registry;
pub mod samples;
pub mod snapshot;
pub mod tracker;

pub use registry::MetricsStore;
pub use samples::{LatencyStats, LatencyWindow};
pub use snapshot::ProviderMetrics;
pub use tracker::OperationTracker;
