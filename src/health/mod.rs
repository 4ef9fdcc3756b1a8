//! Health evaluation subsystem.
//!
//! # Data Flow
//! ```text
//! Outcome recorded (store):
//!     → circuit breaker updated synchronously
//!     → events.rs publishes a change if the healthy verdict flipped
//!
//! Health query (evaluator.rs):
//!     → lazy Open → Half-Open promotion once cooldown elapsed
//!     → healthy = circuit not Open
//!
//! Score query (score.rs):
//!     → success rate, latency penalty, history bonus, recent failure penalty
//! ```
//!
//! # Design Decisions
//! - No background probing; health is derived from real traffic
//! - Verdicts are a function of (stored state, now) so tests drive time
//! - Health state is per provider, not per candidate set

pub mod evaluator;
pub mod events;
pub mod score;

pub use evaluator::{HealthEvaluator, ProviderHealth};
pub use events::{HealthEvents, ProviderHealthChanged};
