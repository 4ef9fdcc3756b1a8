//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ResilienceConfig (validated)
//!     → published through SharedConfig (ArcSwap) to all components
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → engine swaps the Arc<ResilienceConfig>
//!     → components observe new config on their next read
//! ```
//!
//! # Design Decisions
//! - Readers never block: every component loads the current snapshot per call
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

use std::sync::Arc;
use arc_swap::ArcSwap;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    CircuitBreakerConfig, MetricsConfig, ObservabilityConfig, ResilienceConfig, RetryConfig,
    ScoringConfig, SelectionConfig,
};
pub use validation::{validate_config, ValidationError};

/// Live configuration shared by every component of one engine.
pub type SharedConfig = Arc<ArcSwap<ResilienceConfig>>;

/// Wrap a configuration for sharing.
pub fn shared(config: ResilienceConfig) -> SharedConfig {
    Arc::new(ArcSwap::from_pointee(config))
}
