//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call through the executor:
//!     → fallback.rs (walk candidates in order)
//!     → timeouts.rs (per-attempt deadline, caller cancellation)
//!     → On failure: retries.rs (retryable?), backoff.rs (delay before next provider)
//!     → circuit_breaker.rs (driven by the store on every recorded outcome)
//! ```
//!
//! # Design Decisions
//! - Every attempt is measured; cancelled attempts are not
//! - Retries move to the next provider, never the same one
//! - Circuit breaker prevents hammering failing providers

pub mod backoff;
pub mod circuit_breaker;
pub mod fallback;
pub mod retries;
pub mod timeouts;

pub use backoff::calculate_backoff;
pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use fallback::{FallbackExecutor, FallbackResult};
pub use retries::should_retry;
